use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Transport failure: connect, timeout, or a dropped response
    #[error("Engine unreachable: {0}")]
    Network(String),

    /// The engine answered with a non-success HTTP status
    #[error("Engine rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Failed to decode engine response: {0}")]
    Decode(String),

    #[error("Engine configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Whether the failure says nothing about the operation itself
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Network(_) => true,
            EngineError::Rejected { status, .. } => *status >= 500 || *status == 429,
            EngineError::Decode(_) | EngineError::Config(_) => false,
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            EngineError::Decode(e.to_string())
        } else if e.is_builder() {
            EngineError::Config(e.to_string())
        } else if let Some(status) = e.status() {
            EngineError::Rejected {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            EngineError::Network(e.to_string())
        }
    }
}
