use thiserror::Error;

use crate::lifecycle::ValidationError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("Config Error - {0}")]
    Config(String),

    /// Store-level failure that may go away on its own (store still initializing, leader
    /// election, overloaded node). The only kind of failure a retry loop re-attempts.
    #[error("Store Error - {0}")]
    Store(String),

    #[error("Connection Error - {0}")]
    Connection(String),

    #[error("Schema Error - {0}")]
    Schema(String),

    #[error("Encode Error - {0}")]
    Encode(String),

    #[error("Retry Error - {0}")]
    Retry(backoff::RetryError),

    #[error("Validation Error - {0}")]
    Validation(ValidationError),

    #[error("OneShot Receiver Error - {0}")]
    ActorPatternRecv(String),
}

impl Error {
    /// Whether the failed operation may succeed if attempted again.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Store(_))
    }
}

impl From<backoff::RetryError> for Error {
    fn from(value: backoff::RetryError) -> Self {
        Error::Retry(value)
    }
}

impl From<ValidationError> for Error {
    fn from(value: ValidationError) -> Self {
        Error::Validation(value)
    }
}
