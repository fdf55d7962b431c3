use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default Bot API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Connection settings for the Bot API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token issued by BotFather
    pub token: String,

    /// API base URL, without trailing slash
    pub api_base: String,

    /// Long-poll timeout passed to `getUpdates`, in seconds
    pub poll_timeout_secs: u64,

    /// Pause after a failed poll, in milliseconds
    pub retry_delay_ms: u64,

    /// Timeout of non-polling requests, in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            poll_timeout_secs: 30,
            retry_delay_ms: 3000,
            request_timeout_ms: 10_000,
        }
    }
}

impl TelegramConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            ..Default::default()
        }
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// URL of a Bot API method.
    pub fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base.trim_end_matches('/'),
            self.token,
            method
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_url() {
        let config = TelegramConfig {
            api_base: "http://localhost:8081/".to_string(),
            ..TelegramConfig::new("123:abc")
        };
        assert_eq!(
            config.method_url("getUpdates"),
            "http://localhost:8081/bot123:abc/getUpdates"
        );
    }

    #[test]
    fn test_defaults() {
        let config = TelegramConfig::default();
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.poll_timeout(), Duration::from_secs(30));
        assert_eq!(config.retry_delay(), Duration::from_secs(3));
    }
}
