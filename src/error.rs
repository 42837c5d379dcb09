use thiserror::Error;

/// Crate-wide error type. The variant names double as the stable kind tags
/// that tool callers see, so every Display string starts with its tag.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ValidationError: {0}")]
    Validation(String),

    #[error("NotFound: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Protected: {0}")]
    Protected(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Blocked: {0}")]
    Blocked(String),

    #[error("IOError: {0}")]
    Io(#[from] std::io::Error),

    #[error("IOError: serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IOError: csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl LedgerError {
    /// The caller-visible kind tag for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerError::Validation(_) => "ValidationError",
            LedgerError::NotFound(_) => "NotFound",
            LedgerError::Conflict(_) => "Conflict",
            LedgerError::Protected(_) => "Protected",
            LedgerError::Timeout(_) => "Timeout",
            LedgerError::Blocked(_) => "Blocked",
            LedgerError::Io(_) | LedgerError::Serialization(_) | LedgerError::Csv(_) => "IOError",
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
