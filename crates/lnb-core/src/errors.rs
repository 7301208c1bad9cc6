/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so handlers and
/// workers can treat failures consistently (user-facing reply vs notification).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("connection setup failed: {0}")]
    Connect(String),

    #[error("remote call failed: {0}")]
    Rpc(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("external error: {0}")]
    External(String),
}

/// The two failure classes callers care about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// The node RPC layer reported a failure with a human-readable detail.
    RemoteCallFailed,
    Unexpected,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Rpc(_) => ErrorKind::RemoteCallFailed,
            _ => ErrorKind::Unexpected,
        }
    }

    /// Detail string without the variant prefix for remote failures.
    pub fn detail(&self) -> String {
        match self {
            Error::Rpc(detail) => detail.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
