use thiserror::Error;

#[derive(Error, Debug)]
pub enum BybitError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("key parse error: {0}")]
    KeyParse(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("connect error: {0}")]
    Connect(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("configuration error: {0}")]
    Config(#[from] crate::core::config::ConfigError),
}
