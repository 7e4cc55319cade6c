use std::sync::Arc;

use chrono::Utc;
use error_stack::{report, ResultExt};
use serde::Serialize;
use tracing::{event, instrument, Level};

use crate::domain::{
    BanRecord, GrantRecord, GuardError, GuardResult, Identity, Role, SpreadsheetConfig,
};
use crate::ports::config_store::ConfigStore;
use crate::ports::identity_verifier::IdentityVerifier;
use crate::ports::permission_grantor::PermissionGrantor;
use crate::ports::sheet_greeter::SheetGreeter;

use super::credentials::verify_credential;
use super::join_link_issuer::JoinLinkIssuer;

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    #[serde(flatten)]
    pub config: SpreadsheetConfig,
    pub join_url: String,
    /// Title of the instructions tab, `None` when it could not be written.
    pub sheet_title: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpreadsheetSummary {
    #[serde(flatten)]
    pub config: SpreadsheetConfig,
    pub join_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpreadsheetDetails {
    #[serde(flatten)]
    pub config: SpreadsheetConfig,
    pub join_url: String,
    pub joins: Vec<GrantRecord>,
    pub bans: Vec<BanRecord>,
}

/// Spreadsheet configuration management on behalf of authenticated admins.
/// Every admin owns the configurations they registered and nothing else.
pub struct AdminService {
    issuer: Arc<JoinLinkIssuer>,
    verifier: Arc<dyn IdentityVerifier>,
    grantor: Arc<dyn PermissionGrantor>,
    greeter: Arc<dyn SheetGreeter>,
    store: Arc<dyn ConfigStore>,
}

impl AdminService {
    pub fn new(
        issuer: Arc<JoinLinkIssuer>,
        verifier: Arc<dyn IdentityVerifier>,
        grantor: Arc<dyn PermissionGrantor>,
        greeter: Arc<dyn SheetGreeter>,
        store: Arc<dyn ConfigStore>,
    ) -> Self {
        Self {
            issuer,
            verifier,
            grantor,
            greeter,
            store,
        }
    }

    pub async fn authenticate(&self, credential: &str) -> GuardResult<Identity> {
        verify_credential(self.verifier.as_ref(), credential).await
    }

    pub fn service_account_email(&self) -> String {
        self.grantor.service_account_email()
    }

    /// Loads a configuration the admin owns.
    async fn owned(
        &self,
        admin: &Identity,
        spreadsheet_id: &str,
    ) -> GuardResult<SpreadsheetConfig> {
        let config = self
            .store
            .get_by_spreadsheet_id(spreadsheet_id)
            .await
            .change_context_lazy(|| GuardError::internal("failed to load spreadsheet"))?
            .ok_or_else(|| report!(GuardError::not_found("spreadsheet")))?;

        if !config.is_owned_by(&admin.id) {
            event!(
                Level::WARN,
                admin = %admin.id,
                spreadsheet_id,
                "Admin does not own spreadsheet"
            );
            return Err(report!(GuardError::Forbidden));
        }
        Ok(config)
    }

    #[instrument(skip(self, admin), fields(admin = %admin.id))]
    pub async fn register(
        &self,
        admin: &Identity,
        spreadsheet_id: &str,
        role: Role,
        title: Option<&str>,
    ) -> GuardResult<Registration> {
        let spreadsheet_id = spreadsheet_id.trim();
        if spreadsheet_id.is_empty() {
            return Err(report!(GuardError::InvalidRequest(
                "spreadsheet_id must not be empty".into()
            )));
        }

        let existing = self
            .store
            .get_by_spreadsheet_id(spreadsheet_id)
            .await
            .change_context_lazy(|| GuardError::internal("failed to load spreadsheet"))?;
        if existing.is_some() {
            return Err(report!(GuardError::AlreadyRegistered));
        }

        let has_access = self
            .grantor
            .has_service_access(spreadsheet_id)
            .await
            .change_context_lazy(|| {
                GuardError::internal("failed to check service account access")
            })?;
        if !has_access {
            return Err(report!(GuardError::ServiceAccountNoAccess {
                email: self.grantor.service_account_email(),
            }));
        }

        let config = self
            .issuer
            .issue(spreadsheet_id, role, title.unwrap_or_default().trim(), &admin.id)
            .await?;
        let join_url = self.issuer.join_url(&config.join_token);

        let sheet_title = match self
            .greeter
            .write_greeting(spreadsheet_id, &join_url, role)
            .await
        {
            Ok(title) => Some(title),
            Err(report) => {
                event!(Level::ERROR, error = ?report, "Failed to write greeting sheet");
                None
            }
        };

        Ok(Registration {
            config,
            join_url,
            sheet_title,
        })
    }

    #[instrument(skip(self, admin), fields(admin = %admin.id))]
    pub async fn get(
        &self,
        admin: &Identity,
        spreadsheet_id: &str,
    ) -> GuardResult<SpreadsheetDetails> {
        let config = self.owned(admin, spreadsheet_id).await?;
        let joins = self
            .store
            .list_joins(spreadsheet_id)
            .await
            .change_context_lazy(|| GuardError::internal("failed to list joins"))?;
        let bans = self
            .store
            .list_bans(spreadsheet_id)
            .await
            .change_context_lazy(|| GuardError::internal("failed to list bans"))?;

        Ok(SpreadsheetDetails {
            join_url: self.issuer.join_url(&config.join_token),
            config,
            joins,
            bans,
        })
    }

    #[instrument(skip(self, admin), fields(admin = %admin.id))]
    pub async fn list(&self, admin: &Identity) -> GuardResult<Vec<SpreadsheetSummary>> {
        let configs = self
            .store
            .list_by_author(&admin.id)
            .await
            .change_context_lazy(|| GuardError::internal("failed to list spreadsheets"))?;

        Ok(configs
            .into_iter()
            .map(|config| SpreadsheetSummary {
                join_url: self.issuer.join_url(&config.join_token),
                config,
            })
            .collect())
    }

    /// Changes role and/or title. The join token stays the same.
    #[instrument(skip(self, admin), fields(admin = %admin.id))]
    pub async fn update(
        &self,
        admin: &Identity,
        spreadsheet_id: &str,
        role: Option<Role>,
        title: Option<&str>,
    ) -> GuardResult<SpreadsheetConfig> {
        let current = self.owned(admin, spreadsheet_id).await?;
        let role = role.unwrap_or(current.role);
        let title = title.map(str::trim).unwrap_or(&current.title);

        self.store
            .update_config(spreadsheet_id, role, title)
            .await
            .change_context_lazy(|| GuardError::internal("failed to update spreadsheet"))?
            .ok_or_else(|| report!(GuardError::not_found("spreadsheet")))
    }

    /// Forgets the configuration. Permissions already granted on the
    /// spreadsheet stay in place.
    #[instrument(skip(self, admin), fields(admin = %admin.id))]
    pub async fn delete(&self, admin: &Identity, spreadsheet_id: &str) -> GuardResult<()> {
        self.owned(admin, spreadsheet_id).await?;
        let deleted = self
            .store
            .delete_config(spreadsheet_id)
            .await
            .change_context_lazy(|| GuardError::internal("failed to delete spreadsheet"))?;
        if !deleted {
            return Err(report!(GuardError::not_found("spreadsheet")));
        }
        event!(Level::INFO, spreadsheet_id, "Spreadsheet deleted");
        Ok(())
    }

    #[instrument(skip(self, admin), fields(admin = %admin.id))]
    pub async fn rotate(
        &self,
        admin: &Identity,
        spreadsheet_id: &str,
    ) -> GuardResult<SpreadsheetSummary> {
        self.owned(admin, spreadsheet_id).await?;
        let config = self.issuer.rotate(spreadsheet_id).await?;
        Ok(SpreadsheetSummary {
            join_url: self.issuer.join_url(&config.join_token),
            config,
        })
    }

    /// Drops every join of `user_id`, revokes their Drive permissions and
    /// keeps them from joining again.
    #[instrument(skip(self, admin), fields(admin = %admin.id))]
    pub async fn ban(
        &self,
        admin: &Identity,
        spreadsheet_id: &str,
        user_id: &str,
    ) -> GuardResult<BanRecord> {
        self.owned(admin, spreadsheet_id).await?;

        let removed = self
            .store
            .remove_joins_of_user(spreadsheet_id, user_id)
            .await
            .change_context_lazy(|| GuardError::internal("failed to remove joins"))?;
        let Some(first) = removed.first() else {
            return Err(report!(GuardError::not_found(format!(
                "user {user_id} in joins"
            ))));
        };

        for join in &removed {
            let Some(permission_id) = join.permission_id.as_deref() else {
                continue;
            };
            match self.grantor.revoke(spreadsheet_id, permission_id).await {
                Ok(()) => event!(Level::INFO, email = %join.email, "Drive permission removed"),
                Err(report) => {
                    event!(
                        Level::ERROR,
                        email = %join.email,
                        error = ?report,
                        "Failed to remove Drive permission"
                    )
                }
            }
        }

        let ban = BanRecord {
            spreadsheet_id: spreadsheet_id.to_string(),
            user_id: user_id.to_string(),
            email: first.email.clone(),
            identity_email: first.identity_email.clone(),
            banned_at: Utc::now(),
        };
        self.store
            .add_ban(&ban)
            .await
            .change_context_lazy(|| GuardError::internal("failed to store ban"))?;

        event!(Level::INFO, user_id, spreadsheet_id, "User banned");
        Ok(ban)
    }

    #[instrument(skip(self, admin), fields(admin = %admin.id))]
    pub async fn unban(
        &self,
        admin: &Identity,
        spreadsheet_id: &str,
        user_id: &str,
    ) -> GuardResult<()> {
        self.owned(admin, spreadsheet_id).await?;
        let removed = self
            .store
            .remove_ban(spreadsheet_id, user_id)
            .await
            .change_context_lazy(|| GuardError::internal("failed to remove ban"))?;
        if !removed {
            return Err(report!(GuardError::not_found(format!("ban of user {user_id}"))));
        }
        event!(Level::INFO, user_id, spreadsheet_id, "User unbanned");
        Ok(())
    }
}
