//! Inbound-reply ingestion.
//!
//! A reply-capture service posts inbound messages here, either as JSON with an
//! explicit message identity or as a raw MIME message. For raw MIME the
//! identity is recovered from the threading headers: replies quote our
//! `Message-ID` (`<uuid@mailflow>`) in `In-Reply-To` / `References`, and some
//! capture services preserve the `X-Mailflow-Id` header verbatim.

use mail_parser::{HeaderValue, MessageParser};
use serde::Deserialize;
use uuid::Uuid;

use crate::dispatch::CORRELATION_HEADER;

/// JSON form of an inbound-reply notification.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundNotification {
    #[serde(default, rename = "messageId", alias = "message_id")]
    pub message_id: Option<String>,
    /// Raw MIME source, when the capture service forwards it.
    #[serde(default)]
    pub raw: Option<String>,
}

impl InboundNotification {
    /// Resolve the message identity, preferring the explicit field.
    pub fn message_identity(&self) -> Option<Uuid> {
        if let Some(id) = self.message_id.as_deref() {
            if let Ok(parsed) = Uuid::parse_str(id.trim()) {
                return Some(parsed);
            }
            if let Some(parsed) = parse_correlation_token(id) {
                return Some(parsed);
            }
        }
        self.raw.as_deref().and_then(extract_message_identity)
    }
}

/// Extract our message identity from a raw MIME reply, if present.
pub fn extract_message_identity(raw_mime: &str) -> Option<Uuid> {
    let parsed = MessageParser::default().parse(raw_mime.as_bytes())?;

    for header in parsed.headers() {
        let name = header.name();
        let interesting = name.eq_ignore_ascii_case("in-reply-to")
            || name.eq_ignore_ascii_case("references")
            || name.eq_ignore_ascii_case(CORRELATION_HEADER);
        if !interesting {
            continue;
        }
        for candidate in header_texts(header.value()) {
            if let Some(id) = parse_correlation_token(candidate) {
                return Some(id);
            }
        }
    }
    None
}

fn header_texts<'a>(value: &'a HeaderValue<'a>) -> Vec<&'a str> {
    match value {
        HeaderValue::Text(t) => vec![t.as_ref()],
        HeaderValue::TextList(list) => list.iter().map(|t| t.as_ref()).collect(),
        _ => Vec::new(),
    }
}

/// Parse a `<uuid@mailflow>` correlation token (angle brackets optional,
/// bare UUIDs accepted). `References` values may contain several tokens;
/// each whitespace-separated token is tried.
pub fn parse_correlation_token(text: &str) -> Option<Uuid> {
    for token in text.split_whitespace() {
        let token = token.trim_start_matches('<').trim_end_matches('>');
        let candidate = token.split('@').next().unwrap_or(token);
        if let Ok(id) = Uuid::parse_str(candidate) {
            return Some(id);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "6ba7b810-9dad-11d1-80b4-00c04fd430c8";

    #[test]
    fn token_with_angle_brackets_and_domain() {
        let id = parse_correlation_token(&format!("<{ID}@mailflow>")).unwrap();
        assert_eq!(id.to_string(), ID);
    }

    #[test]
    fn bare_uuid_token() {
        assert!(parse_correlation_token(ID).is_some());
    }

    #[test]
    fn foreign_message_ids_rejected() {
        assert!(parse_correlation_token("<CAF=abc123@mail.gmail.com>").is_none());
        assert!(parse_correlation_token("").is_none());
    }

    #[test]
    fn references_with_multiple_tokens() {
        let text = format!("<CAF=xyz@mail.gmail.com> <{ID}@mailflow>");
        assert!(parse_correlation_token(&text).is_some());
    }

    #[test]
    fn extracts_identity_from_in_reply_to() {
        let raw = format!(
            "From: replier@example.com\r\n\
             To: founder@startup.io\r\n\
             Subject: Re: Hi\r\n\
             In-Reply-To: <{ID}@mailflow>\r\n\
             \r\n\
             Sounds great, let's talk.\r\n"
        );
        let id = extract_message_identity(&raw).unwrap();
        assert_eq!(id.to_string(), ID);
    }

    #[test]
    fn extracts_identity_from_references_chain() {
        let raw = format!(
            "From: replier@example.com\r\n\
             Subject: Re: Hi\r\n\
             References: <CAF=first@mail.gmail.com> <{ID}@mailflow>\r\n\
             \r\n\
             body\r\n"
        );
        assert!(extract_message_identity(&raw).is_some());
    }

    #[test]
    fn no_correlation_headers_yields_none() {
        let raw = "From: someone@example.com\r\nSubject: Unrelated\r\n\r\nhello\r\n";
        assert!(extract_message_identity(raw).is_none());
    }

    #[test]
    fn notification_prefers_explicit_id() {
        let n = InboundNotification {
            message_id: Some(ID.to_string()),
            raw: None,
        };
        assert!(n.message_identity().is_some());
    }

    #[test]
    fn notification_falls_back_to_raw_mime() {
        let n = InboundNotification {
            message_id: None,
            raw: Some(format!(
                "From: a@b.c\r\nIn-Reply-To: <{ID}@mailflow>\r\n\r\nbody\r\n"
            )),
        };
        assert!(n.message_identity().is_some());
    }
}
