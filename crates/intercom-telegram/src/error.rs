use thiserror::Error;

/// Errors raised while talking to the Bot API.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Transport failure or non-JSON response
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with `ok: false`
    #[error("Bot API error {code}: {description}")]
    Api { code: i64, description: String },

    /// `ok: true` without a result
    #[error("Bot API returned no result for {0}")]
    MissingResult(&'static str),

    /// Serializing a request field failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TelegramError>;
