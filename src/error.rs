use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("unknown protocol {0:?}")]
    UnknownProtocol(String),

    #[error("invalid protocol profile {key:?}: {reason}")]
    InvalidProfile { key: String, reason: String },

    #[error("failed to open input {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create output {path:?}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// A decode job ended without reporting a result, e.g., its worker panicked.
    #[error("decode job {0} did not complete")]
    JobFailed(u64),
}

pub type Result<T> = std::result::Result<T, Error>;
