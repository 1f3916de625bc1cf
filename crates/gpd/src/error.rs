use thiserror::Error;

pub type Result<T> = std::result::Result<T, GpdError>;

#[derive(Error, Debug)]
pub enum GpdError {
    #[error("Corrupt collection: {0}")]
    Corrupt(String),

    #[error("Unsupported collection version {0}")]
    UnsupportedVersion(u16),

    #[error("Buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl GpdError {
    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}
