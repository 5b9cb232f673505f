//! Service configuration, built from environment variables.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

/// SMTP relay credentials. The authenticated username doubles as the enforced
/// sender address (SPF alignment — see the SMTP provider).
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// SendGrid API key, if configured with a real value.
    pub sendgrid_api_key: Option<SecretString>,
    /// SMTP relay settings, if configured.
    pub smtp: Option<SmtpConfig>,
    /// Explicit provider override (`sendgrid`, `smtp`, `mock`).
    pub provider_override: Option<String>,
    /// Default sender address when a request carries none.
    pub default_sender: String,
    /// Public base URL for tracking/redirect/unsubscribe links.
    /// `None` disables content instrumentation entirely.
    pub base_url: Option<String>,
    /// Scheduled-queue poll cadence.
    pub tick_interval: Duration,
    /// HTTP listen port.
    pub port: u16,
}

impl Config {
    /// Build config from environment variables. Every option has a usable
    /// default; an unconfigured process runs with the mock provider and
    /// tracking disabled.
    pub fn from_env() -> Self {
        let sendgrid_api_key = std::env::var("MAILFLOW_SENDGRID_API_KEY")
            .ok()
            .filter(|v| !is_placeholder(v))
            .map(SecretString::from);

        let smtp = std::env::var("MAILFLOW_SMTP_HOST")
            .ok()
            .filter(|v| !is_placeholder(v))
            .map(|host| SmtpConfig {
                host,
                port: std::env::var("MAILFLOW_SMTP_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(587),
                username: std::env::var("MAILFLOW_SMTP_USERNAME").unwrap_or_default(),
                password: SecretString::from(
                    std::env::var("MAILFLOW_SMTP_PASSWORD").unwrap_or_default(),
                ),
            });

        let provider_override = std::env::var("MAILFLOW_PROVIDER")
            .ok()
            .map(|v| v.trim().to_lowercase())
            .filter(|v| !v.is_empty());

        let default_sender = std::env::var("MAILFLOW_DEFAULT_SENDER")
            .ok()
            .filter(|v| !is_placeholder(v))
            .unwrap_or_else(|| "noreply@localhost".to_string());

        // Trailing slashes would double up when building tracking links.
        let base_url = std::env::var("MAILFLOW_BASE_URL")
            .ok()
            .filter(|v| !is_placeholder(v))
            .map(|v| v.trim_end_matches('/').to_string());

        let tick_secs: u64 = std::env::var("MAILFLOW_TICK_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&s| s > 0)
            .unwrap_or(60);

        let port: u16 = std::env::var("MAILFLOW_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        Self {
            sendgrid_api_key,
            smtp,
            provider_override,
            default_sender,
            base_url,
            tick_interval: Duration::from_secs(tick_secs),
            port,
        }
    }

    /// True when the configured SMTP credentials are usable.
    pub fn smtp_usable(&self) -> bool {
        self.smtp
            .as_ref()
            .is_some_and(|s| !is_placeholder(&s.username) && !is_placeholder(s.password.expose_secret()))
    }
}

/// Treat empty and obvious stand-in values as unconfigured, so a copied
/// sample env file falls through to the mock provider instead of failing
/// every send.
pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim();
    v.is_empty()
        || v.eq_ignore_ascii_case("changeme")
        || v.eq_ignore_ascii_case("placeholder")
        || v.to_lowercase().starts_with("your-")
        || v.to_lowercase().starts_with("your_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_detection() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("  "));
        assert!(is_placeholder("changeme"));
        assert!(is_placeholder("CHANGEME"));
        assert!(is_placeholder("your-api-key-here"));
        assert!(is_placeholder("YOUR_SENDGRID_KEY"));
        assert!(!is_placeholder("SG.real-looking-key"));
        assert!(!is_placeholder("smtp.gmail.com"));
    }

    #[test]
    fn smtp_usable_requires_real_credentials() {
        let mut config = Config {
            sendgrid_api_key: None,
            smtp: Some(SmtpConfig {
                host: "smtp.example.com".into(),
                port: 587,
                username: "sender@example.com".into(),
                password: SecretString::from("hunter2".to_string()),
            }),
            provider_override: None,
            default_sender: "noreply@localhost".into(),
            base_url: None,
            tick_interval: Duration::from_secs(60),
            port: 8080,
        };
        assert!(config.smtp_usable());

        config.smtp.as_mut().unwrap().username = "your-email".into();
        assert!(!config.smtp_usable());

        config.smtp = None;
        assert!(!config.smtp_usable());
    }
}
