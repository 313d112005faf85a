use std::any::Any;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SpiderError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("URL parsing error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid selector: {0}")]
    SelectorError(String),

    #[error("Request error: {0}")]
    RequestError(String),

    #[error("Unexpected status code: {0}")]
    StatusError(u16),

    #[error("Handler error: {0}")]
    HandlerError(#[from] anyhow::Error),

    #[error("Handler panicked: {0}")]
    Panic(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl SpiderError {
    /// Converts a caught panic payload into an error value.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        SpiderError::Panic(message)
    }
}

pub type SpiderResult<T> = Result<T, SpiderError>;
