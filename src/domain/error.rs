use thiserror::Error;

/// Failures surfaced to callers of the application layer. Adapters report
/// their own errors and get `change_context`-ed into one of these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("missing, invalid or expired credential")]
    Unauthenticated,
    #[error("{0} not found")]
    NotFound(String),
    #[error("you are not the author of this spreadsheet")]
    Forbidden,
    #[error("you are banned from this spreadsheet")]
    Banned,
    #[error("service account {email} does not have access to this spreadsheet; add it as an editor first")]
    ServiceAccountNoAccess { email: String },
    #[error("spreadsheet is already registered")]
    AlreadyRegistered,
    #[error("invalid email: {0}")]
    InvalidEmail(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("permission grant failed: {0}")]
    GrantFailed(String),
    #[error("identity service unavailable")]
    VerifierUnavailable,
    #[error("internal error: {0}")]
    Internal(String),
}

impl GuardError {
    pub fn not_found<S: Into<String>>(what: S) -> Self {
        GuardError::NotFound(what.into())
    }

    pub fn internal<S: Into<String>>(details: S) -> Self {
        GuardError::Internal(details.into())
    }
}

pub type GuardResult<T> = error_stack::Result<T, GuardError>;
