use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Unknown alert type: {0}")]
    UnknownAlertType(String),

    #[error("Invalid escalation level: {0}")]
    InvalidLevel(u8),

    #[error("{0}")]
    Other(String),
}
