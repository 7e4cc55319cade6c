use std::time::Duration;

use error_stack::{report, ResultExt};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{event, instrument, Level};

use crate::adapters::config::accounts_config::AccountsConfig;
use crate::domain::Identity;
use crate::ports::identity_verifier::{IdentityVerifier, VerifierError};

/// What the accounts service answers for an authenticated bearer.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountsUser {
    pub id: String,
    #[serde(alias = "innomail")]
    pub email: String,
    #[serde(default = "default_true")]
    pub email_verified: bool,
}

fn default_true() -> bool {
    true
}

impl From<AccountsUser> for Identity {
    fn from(user: AccountsUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
            verified: user.email_verified,
        }
    }
}

/// Verifies bearer credentials by asking the accounts service who they
/// belong to.
#[derive(Debug)]
pub struct AccountsVerifier {
    client: Client,
    verify_url: String,
}

impl AccountsVerifier {
    pub fn new(config: &AccountsConfig) -> error_stack::Result<Self, VerifierError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .change_context(VerifierError::Unavailable {
                details: "could not build HTTP client".into(),
            })?;

        Ok(Self {
            client,
            verify_url: config.verify_url(),
        })
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for AccountsVerifier {
    #[instrument(skip_all, fields(url = %self.verify_url))]
    async fn verify(&self, credential: &str) -> error_stack::Result<Identity, VerifierError> {
        let credential = credential.trim();
        if credential.is_empty() {
            return Err(report!(VerifierError::Unauthenticated));
        }

        let response = self
            .client
            .get(&self.verify_url)
            .bearer_auth(credential)
            .send()
            .await
            .change_context_lazy(|| VerifierError::Unavailable {
                details: "request failed".into(),
            })?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                event!(Level::DEBUG, %status, "Credential rejected");
                return Err(report!(VerifierError::Unauthenticated));
            }
            s if !s.is_success() => {
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(report!(VerifierError::Unavailable {
                    details: format!("HTTP error {}", status),
                })
                .attach_printable(error_text));
            }
            _ => {}
        }

        let user: AccountsUser = response
            .json()
            .await
            .change_context(VerifierError::InvalidResponse)?;

        event!(Level::DEBUG, user_id = %user.id, "Credential verified");
        Ok(user.into())
    }
}
