use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngageError>;

#[derive(Debug, Error)]
pub enum EngageError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Relay error: {0}")]
    Relay(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Session already running for {0}")]
    AlreadyRunning(String),
}

impl From<serde_json::Error> for EngageError {
    fn from(err: serde_json::Error) -> Self {
        EngageError::Parse(err.to_string())
    }
}

impl From<std::io::Error> for EngageError {
    fn from(err: std::io::Error) -> Self {
        EngageError::Store(err.to_string())
    }
}
