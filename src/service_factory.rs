use std::sync::Arc;

use error_stack::ResultExt;
use thiserror::Error;

use sheets_guard::adapters::accounts::accounts_verifier::AccountsVerifier;
use sheets_guard::adapters::config::app_config::AppConfig;
use sheets_guard::adapters::config::storage_config::StorageBackend;
use sheets_guard::adapters::google::auth::ServiceAccount;
use sheets_guard::adapters::google::drive_grantor::DriveGrantor;
use sheets_guard::adapters::google::greeting_sheet::GreetingSheet;
use sheets_guard::adapters::http::AppState;
use sheets_guard::adapters::storage::memory::MemoryStore;
use sheets_guard::adapters::storage::postgres::PostgresStore;
use sheets_guard::application::{AdminService, GrantOrchestrator, JoinLinkIssuer, JoinSettings};
use sheets_guard::ports::{ConfigStore, IdentityVerifier, PermissionGrantor, SheetGreeter};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Failed to open the configuration store")]
    Storage,
    #[error("Failed to set up the Google service account")]
    Google,
    #[error("Failed to set up the accounts client")]
    Accounts,
}

/// Wires the adapters chosen by the configuration into the application
/// services.
pub struct ApplicationServiceFactory;

impl ApplicationServiceFactory {
    pub async fn create(config: &AppConfig) -> error_stack::Result<AppState, StartupError> {
        let store = Self::create_store(config).await?;

        let account = ServiceAccount::load(&config.google)
            .await
            .change_context(StartupError::Google)?;
        let grantor: Arc<dyn PermissionGrantor> = Arc::new(DriveGrantor::new(&account));
        let greeter: Arc<dyn SheetGreeter> = Arc::new(GreetingSheet::new(&account));

        let verifier: Arc<dyn IdentityVerifier> = Arc::new(
            AccountsVerifier::new(&config.accounts).change_context(StartupError::Accounts)?,
        );

        let settings = Arc::new(JoinSettings::from_config(config));
        let issuer = Arc::new(JoinLinkIssuer::new(Arc::clone(&store), Arc::clone(&settings)));

        let admin = Arc::new(AdminService::new(
            Arc::clone(&issuer),
            Arc::clone(&verifier),
            Arc::clone(&grantor),
            greeter,
            Arc::clone(&store),
        ));
        let orchestrator = Arc::new(GrantOrchestrator::new(
            Arc::clone(&issuer),
            verifier,
            grantor,
            store,
            Arc::clone(&settings),
        ));

        Ok(AppState {
            admin,
            orchestrator,
            issuer,
            settings,
        })
    }

    async fn create_store(
        config: &AppConfig,
    ) -> error_stack::Result<Arc<dyn ConfigStore>, StartupError> {
        match config.storage.backend {
            StorageBackend::Postgres => {
                let store = PostgresStore::new(&config.storage)
                    .await
                    .change_context(StartupError::Storage)?;
                Ok(Arc::new(store))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using the in-memory store; registrations are lost on restart");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }
}
