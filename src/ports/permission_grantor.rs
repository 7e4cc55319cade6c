use thiserror::Error;

use crate::domain::Role;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GrantorError {
    /// The permissions API answered with an error. `reason` is what the
    /// caller gets to see.
    #[error("Permission API rejected the request: {reason}")]
    Rejected { reason: String },
    #[error("Permission API request failed")]
    Transport,
}

impl GrantorError {
    pub fn rejected<S: Into<String>>(reason: S) -> Self {
        GrantorError::Rejected {
            reason: reason.into(),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait PermissionGrantor: Send + Sync {
    /// Shares the spreadsheet with `email` at `role` and returns the
    /// permission id. Granting an existing permission again succeeds.
    async fn grant(
        &self,
        spreadsheet_id: &str,
        email: &str,
        role: Role,
    ) -> error_stack::Result<Option<String>, GrantorError>;

    async fn revoke(
        &self,
        spreadsheet_id: &str,
        permission_id: &str,
    ) -> error_stack::Result<(), GrantorError>;

    /// Whether the service account itself is among the spreadsheet's
    /// permissions, i.e. whether it can share the file at all.
    async fn has_service_access(
        &self,
        spreadsheet_id: &str,
    ) -> error_stack::Result<bool, GrantorError>;

    fn service_account_email(&self) -> String;
}
