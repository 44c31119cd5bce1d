use thiserror::Error;

/// Outcomes of core portal operations that callers are expected to handle.
///
/// Corrupt persisted state is deliberately absent: stores log it and carry on
/// with an empty document instead of surfacing an error.
#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Not Found: {0}")]
    NotFound(String),

    /// Unknown username, wrong password, inactive and expired accounts all map here.
    #[error("Invalid username or password, or the account has expired")]
    InvalidCredentials,

    #[error("Quota exceeded: {requested_mb:.2} MB requested, {remaining_mb:.2} MB remaining")]
    QuotaExceeded { requested_mb: f64, remaining_mb: f64 },

    #[error("Invalid backup format: {0}")]
    InvalidFormat(String),

    #[error("Username already exists: {0}")]
    DuplicateUsername(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type PortalResult<T> = Result<T, PortalError>;
