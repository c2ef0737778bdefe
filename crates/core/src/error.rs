use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Automation error: {0}")]
    Automation(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Expected lookup misses: the element is absent or never became ready.
    pub fn is_element_miss(&self) -> bool {
        matches!(self, Error::ElementNotFound(_) | Error::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
