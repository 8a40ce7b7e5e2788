use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No snapshot has been published to the handle yet.
    #[error("index not ready")]
    NotReady,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to encode index snapshot: {0}")]
    Encode(String),

    /// Snapshot bytes could not be parsed, or a required field is missing.
    #[error("failed to decode index snapshot: {0}")]
    Decode(String),

    /// Snapshot parsed but its parts disagree with each other.
    #[error("corrupt index snapshot: {0}")]
    Corrupt(String),

    #[error("unsupported index version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
