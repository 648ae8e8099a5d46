use crate::engine::config::CookieEngineKind;

/// Errors returned by the cookie manager.
///
/// Every variant maps to a stable [`code`](CookieError::code) which is what the
/// scripting side receives when a bridge call is rejected.
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    #[error("{0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    NotFound(String),

    #[error("The {0} cookie engine is not available on this platform")]
    UnsupportedEngine(CookieEngineKind),

    #[error("Cookie engine worker has shut down")]
    ChannelClosed,

    #[error("Cookie jar lock is poisoned")]
    Poisoned,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CookieError {
    /// Stable error code, sent across the bridge together with the message.
    pub fn code(&self) -> &'static str {
        match self {
            CookieError::Validation(_) => "ValidationError",
            CookieError::Storage(_) => "StorageError",
            CookieError::NotFound(_) => "NotFoundError",
            CookieError::UnsupportedEngine(_) => "UnsupportedEngineError",
            CookieError::ChannelClosed => "ChannelClosedError",
            CookieError::Poisoned | CookieError::Internal(_) => "InternalError",
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        CookieError::Validation(msg.into())
    }

    pub(crate) fn storage(err: impl std::fmt::Display) -> Self {
        CookieError::Storage(err.to_string())
    }
}

/// Errors returned when a [`ManagerConfig`](crate::config::ManagerConfig) fails validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("channel_capacity must be at least 1")]
    ZeroChannelCapacity,
}
