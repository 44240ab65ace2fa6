//! Unified error types for geofresh.
//!
//! Every variant renders with a stable code prefix so log consumers can
//! group refresh failures without parsing free-form text.

/// Unified error type for the refresh pipeline and database access.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configured origin URL is unusable.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Fetch did not complete within the configured timeout.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Response body exceeds the configured byte limit.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Network failure or unexpected HTTP status.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Local file could not be written, renamed or removed.
    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),

    /// Downloaded or cached file is not a loadable database.
    #[error("LOAD_FAILED: {0}")]
    LoadFailed(String),

    /// Database returned malformed data for an address.
    #[error("LOOKUP_FAILED: {0}")]
    LookupFailed(String),
}

impl Error {
    /// Whether the failure happened before any bytes reached the local disk.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::FetchTimeout(_) | Error::HttpError(_) | Error::FetchTooLarge(_))
    }
}

impl From<maxminddb::MaxMindDBError> for Error {
    fn from(err: maxminddb::MaxMindDBError) -> Self {
        Error::LoadFailed(err.to_string())
    }
}
