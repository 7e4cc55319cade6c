use thiserror::Error;

use crate::domain::Identity;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifierError {
    #[error("Credential rejected by identity service")]
    Unauthenticated,
    #[error("Identity service unavailable: {details}")]
    Unavailable { details: String },
    #[error("Identity service returned an unexpected response")]
    InvalidResponse,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Validates a bearer credential and returns who it belongs to.
    async fn verify(&self, credential: &str) -> error_stack::Result<Identity, VerifierError>;
}
