use reqwest::StatusCode;
use thiserror::Error;

/// Failures surfaced by the search, auth, and bookmark layers.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("token grant failed: {0}")]
    Auth(String),

    #[error("request failed with status {status}")]
    Http { status: StatusCode },

    #[error("authentication failed after retry")]
    RetryExhausted,

    #[error("invalid search: {0}")]
    InvalidSearch(String),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Store(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
