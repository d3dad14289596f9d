use thiserror::Error;

pub type DriverResult<T> = Result<T, DriverError>;

/// Errors raised below the [`StorageDriver`](crate::driver::StorageDriver)
/// boundary.
///
/// Only construction and resolution errors reach callers; everything else is
/// logged and downgraded by the backend adapter.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("invalid driver parameter `{key}`: {reason}")]
    Construction { key: &'static str, reason: String },

    #[error("storage driver `{backend}` not supported, known backends: [{known}]")]
    BackendNotSupported { backend: String, known: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP GET {path} failure {status}")]
    RemoteStatus { status: u16, path: String },

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("malformed payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("paged read of {path} gave up after {pages} pages")]
    PageLimitExceeded { path: String, pages: usize },
}

impl DriverError {
    pub fn construction(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Construction {
            key,
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Short label used in log fields and metric keys
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Construction { .. } => "construction",
            Self::BackendNotSupported { .. } => "backend_not_supported",
            Self::Transport(_) => "transport",
            Self::RemoteStatus { .. } => "remote_status",
            Self::NotFound(_) => "not_found",
            Self::Serialization(_) => "serialization",
            Self::PageLimitExceeded { .. } => "page_limit",
        }
    }
}
