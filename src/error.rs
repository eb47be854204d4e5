use thiserror::Error;

/// Error taxonomy: transport/disk failures are transparent wrappers, the
/// rest are the semantic categories from the design's error handling model.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    #[error("no such swarm")]
    NotFound,

    #[error("message of {size} bytes exceeds the {limit} byte buffer")]
    OversizedMessage { size: usize, limit: usize },

    #[error("a lock was poisoned by a panicking thread")]
    PoisonedLock,
}

pub type Result<T> = std::result::Result<T, Error>;

impl<T> From<std::sync::PoisonError<T>> for Error {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        Error::PoisonedLock
    }
}
