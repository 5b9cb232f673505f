//! Content instrumentation — click-link rewriting, open beacon, unsubscribe
//! footer.
//!
//! Pure string-to-string transformation; no I/O. The link rewriter is a
//! quote-aware attribute scanner rather than a regex so that single/double
//! quotes and attribute spacing are handled exactly.

use uuid::Uuid;

/// Instrument an HTML body for engagement tracking.
///
/// With no base URL configured, this is the identity function — tracking is
/// disabled gracefully rather than failing the send.
///
/// Link rewriting runs before beacon/footer injection so the injected links
/// are never themselves wrapped. Applying `instrument` to already-instrumented
/// HTML is a no-op: tracked links are excluded from rewriting and the beacon
/// and footer are only appended when absent.
pub fn instrument(
    html: &str,
    message_id: Uuid,
    recipient: &str,
    base_url: Option<&str>,
) -> String {
    let Some(base) = base_url else {
        return html.to_string();
    };

    let mut out = rewrite_links(html, message_id, base);

    let beacon_src = format!(
        "{base}/track?messageId={message_id}&email={}",
        urlencoding::encode(recipient)
    );
    if !out.contains(&beacon_src) {
        out.push_str(&format!(
            r#"<img src="{beacon_src}" width="1" height="1" style="display:none;" alt=""/>"#
        ));
    }

    let unsubscribe_href = format!(
        "{base}/unsubscribe?email={}",
        urlencoding::encode(recipient)
    );
    if !out.contains(&unsubscribe_href) {
        out.push_str(&format!(
            concat!(
                r#"<div style="margin-top:24px;font-size:12px;color:#888888;">"#,
                r#"<a href="{href}" style="color:#888888;">Unsubscribe</a></div>"#
            ),
            href = unsubscribe_href
        ));
    }

    out
}

/// Rewrite every quoted `href` attribute value to a click-tracking redirect,
/// excluding `mailto:` links and links already pointing at one of our own
/// tracking endpoints.
pub fn rewrite_links(html: &str, message_id: Uuid, base_url: &str) -> String {
    let click_base = format!("{base_url}/click");
    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len() + 128);
    let mut copied = 0;
    let mut i = 0;

    while i + 4 <= bytes.len() {
        let in_attr_position = i > 0 && bytes[i - 1].is_ascii_whitespace();
        if !in_attr_position || !bytes[i..i + 4].eq_ignore_ascii_case(b"href") {
            i += 1;
            continue;
        }

        // href [ws] = [ws] <quote> value <quote>
        let mut j = i + 4;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if j >= bytes.len() || bytes[j] != b'=' {
            i += 1;
            continue;
        }
        j += 1;
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if j >= bytes.len() || (bytes[j] != b'"' && bytes[j] != b'\'') {
            i += 1;
            continue;
        }
        let quote = bytes[j];
        let value_start = j + 1;
        let Some(rel_end) = bytes[value_start..].iter().position(|&c| c == quote) else {
            break; // unterminated attribute, leave the rest untouched
        };
        let value_end = value_start + rel_end;
        let value = &html[value_start..value_end];

        if should_rewrite(value, base_url, &click_base) {
            out.push_str(&html[copied..value_start]);
            out.push_str(&click_base);
            out.push_str("?messageId=");
            out.push_str(&message_id.to_string());
            out.push_str("&url=");
            out.push_str(&urlencoding::encode(value));
            copied = value_end;
        }
        i = value_end + 1;
    }

    out.push_str(&html[copied..]);
    out
}

fn should_rewrite(value: &str, base_url: &str, click_base: &str) -> bool {
    let v = value.trim();
    if v.is_empty() || v.starts_with('#') {
        return false;
    }
    if v.to_ascii_lowercase().starts_with("mailto:") {
        return false;
    }
    // Our own tracking endpoints must survive re-instrumentation unwrapped.
    if v.starts_with(click_base)
        || v.starts_with(&format!("{base_url}/track"))
        || v.starts_with(&format!("{base_url}/unsubscribe"))
    {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://mail.example.com";

    fn id() -> Uuid {
        Uuid::parse_str("6ba7b810-9dad-11d1-80b4-00c04fd430c8").unwrap()
    }

    #[test]
    fn rewrites_ordinary_link() {
        let html = r#"<a href="https://x.com">go</a>"#;
        let out = instrument(html, id(), "user@example.com", Some(BASE));
        assert!(out.contains("https://mail.example.com/click?messageId="));
        assert!(out.contains(&format!("url={}", urlencoding::encode("https://x.com"))));
        assert!(!out.contains(r#"href="https://x.com""#));
    }

    #[test]
    fn leaves_mailto_alone() {
        let html = r#"<a href="mailto:ceo@x.com">email us</a>"#;
        let out = instrument(html, id(), "user@example.com", Some(BASE));
        assert!(out.contains(r#"href="mailto:ceo@x.com""#));
    }

    #[test]
    fn mailto_case_insensitive() {
        let html = r#"<a href="MAILTO:ceo@x.com">email us</a>"#;
        let out = rewrite_links(html, id(), BASE);
        assert_eq!(out, html);
    }

    #[test]
    fn handles_single_quotes_and_spacing() {
        let html = "<a href = 'https://x.com'>go</a>";
        let out = rewrite_links(html, id(), BASE);
        assert!(out.contains("/click?messageId="));
    }

    #[test]
    fn handles_uppercase_attribute() {
        let html = r#"<a HREF="https://x.com">go</a>"#;
        let out = rewrite_links(html, id(), BASE);
        assert!(out.contains("/click?messageId="));
    }

    #[test]
    fn skips_fragment_and_empty_hrefs() {
        let html = r##"<a href="#top">top</a><a href="">x</a>"##;
        assert_eq!(rewrite_links(html, id(), BASE), html);
    }

    #[test]
    fn appends_beacon_and_footer_once() {
        let html = "<p>hello</p>";
        let out = instrument(html, id(), "user@example.com", Some(BASE));
        assert_eq!(out.matches("/track?messageId=").count(), 1);
        assert_eq!(out.matches("/unsubscribe?email=").count(), 1);
        assert!(out.contains(r#"width="1" height="1""#));
    }

    #[test]
    fn instrumentation_is_idempotent() {
        let html = concat!(
            r#"<a href="https://x.com">go</a>"#,
            r#"<a href="mailto:a@b.c">mail</a>"#,
            "<p>plain</p>",
        );
        let once = instrument(html, id(), "user@example.com", Some(BASE));
        let twice = instrument(&once, id(), "user@example.com", Some(BASE));
        assert_eq!(once, twice);
    }

    #[test]
    fn no_base_url_is_identity() {
        let html = r#"<a href="https://x.com">go</a>"#;
        assert_eq!(instrument(html, id(), "u@e.com", None), html);
    }

    #[test]
    fn already_tracked_link_not_double_wrapped() {
        let html = format!(
            r#"<a href="{BASE}/click?messageId={}&url=https%3A%2F%2Fx.com">go</a>"#,
            id()
        );
        assert_eq!(rewrite_links(&html, id(), BASE), html);
    }

    #[test]
    fn recipient_is_url_encoded_in_beacon() {
        let out = instrument("<p>x</p>", id(), "a+tag@example.com", Some(BASE));
        assert!(out.contains("email=a%2Btag%40example.com"));
    }

    #[test]
    fn multiple_links_all_rewritten() {
        let html = r#"<a href="https://a.com">a</a> <a href="https://b.com">b</a>"#;
        let out = rewrite_links(html, id(), BASE);
        assert_eq!(out.matches("/click?messageId=").count(), 2);
    }

    #[test]
    fn unterminated_attribute_left_untouched() {
        let html = r#"<a href="https://x.com"#;
        assert_eq!(rewrite_links(html, id(), BASE), html);
    }
}
