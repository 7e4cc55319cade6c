use std::sync::Arc;

use chrono::Utc;
use error_stack::report;
use serde::Serialize;
use tracing::{event, instrument, Level};

use crate::domain::email::{domain_allowed, normalize_email};
use crate::domain::{GrantRecord, GuardError, GuardResult, Role};
use crate::ports::config_store::ConfigStore;
use crate::ports::identity_verifier::IdentityVerifier;
use crate::ports::permission_grantor::{GrantorError, PermissionGrantor};

use super::credentials::verify_credential;
use super::join_link_issuer::JoinLinkIssuer;
use super::join_settings::JoinSettings;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Granted {
    pub spreadsheet_id: String,
    pub email: String,
    pub role: Role,
    /// `false` when this email had already joined before.
    pub newly_joined: bool,
}

/// Turns a join link plus a credential into a Drive permission.
pub struct GrantOrchestrator {
    issuer: Arc<JoinLinkIssuer>,
    verifier: Arc<dyn IdentityVerifier>,
    grantor: Arc<dyn PermissionGrantor>,
    store: Arc<dyn ConfigStore>,
    settings: Arc<JoinSettings>,
}

impl GrantOrchestrator {
    pub fn new(
        issuer: Arc<JoinLinkIssuer>,
        verifier: Arc<dyn IdentityVerifier>,
        grantor: Arc<dyn PermissionGrantor>,
        store: Arc<dyn ConfigStore>,
        settings: Arc<JoinSettings>,
    ) -> Self {
        Self {
            issuer,
            verifier,
            grantor,
            store,
            settings,
        }
    }

    /// The link is resolved against the local store first, so a dead link
    /// costs no call to the accounts service. Nothing is granted before the
    /// credential is verified.
    #[instrument(skip(self, token, credential))]
    pub async fn grant_access(
        &self,
        token: &str,
        credential: &str,
        email: Option<&str>,
    ) -> GuardResult<Granted> {
        let config = self.issuer.resolve(token).await?;
        let identity = verify_credential(self.verifier.as_ref(), credential).await?;

        let requested = email
            .filter(|email| !email.trim().is_empty())
            .unwrap_or(&identity.email);
        let email = normalize_email(requested)
            .ok_or_else(|| report!(GuardError::InvalidEmail(requested.trim().to_string())))?;
        if !domain_allowed(&email, &self.settings.allowed_email_domains) {
            return Err(report!(GuardError::InvalidEmail(format!(
                "{email} is not in an allowed domain ({})",
                self.settings.allowed_email_domains.join(", ")
            ))));
        }

        let banned = self
            .store
            .is_banned(&config.spreadsheet_id, &identity.id)
            .await
            .map_err(|report| {
                report.change_context(GuardError::internal("failed to check bans"))
            })?;
        if banned {
            event!(
                Level::INFO,
                user_id = %identity.id,
                spreadsheet_id = %config.spreadsheet_id,
                "Banned user tried to join"
            );
            return Err(report!(GuardError::Banned));
        }

        // Single-use links are claimed before the grant so that concurrent
        // joins cannot both get through.
        self.issuer.claim(&config).await?;

        let permission_id = match self
            .grantor
            .grant(&config.spreadsheet_id, &email, config.role)
            .await
        {
            Ok(permission_id) => permission_id,
            Err(report) => {
                let reason = match report.current_context() {
                    GrantorError::Rejected { reason } => reason.clone(),
                    GrantorError::Transport => "permission API unreachable".to_string(),
                };
                event!(Level::WARN, error = ?report, "Grant failed");
                if let Err(release) = self.issuer.release(&config).await {
                    event!(Level::ERROR, error = ?release, "Failed to release join link");
                }
                return Err(report.change_context(GuardError::GrantFailed(reason)));
            }
        };

        let record = GrantRecord {
            spreadsheet_id: config.spreadsheet_id.clone(),
            user_id: identity.id.clone(),
            email: email.clone(),
            identity_email: identity.email.clone(),
            role: config.role,
            permission_id,
            joined_at: Utc::now(),
        };
        // The permission exists now; bookkeeping failures must not turn the
        // grant into an error the user would retry.
        let newly_joined = match self.store.record_join(&record).await {
            Ok(inserted) => inserted,
            Err(report) => {
                event!(Level::ERROR, error = ?report, "Failed to record join");
                false
            }
        };

        event!(
            Level::INFO,
            spreadsheet_id = %config.spreadsheet_id,
            %email,
            role = %config.role,
            newly_joined,
            "Access granted"
        );

        Ok(Granted {
            spreadsheet_id: config.spreadsheet_id,
            email,
            role: config.role,
            newly_joined,
        })
    }
}
