use error_stack::{Report, ResultExt};
use google_sheets4::oauth2::{self, authenticator::Authenticator};
use thiserror::Error;
use tracing::{event, instrument, Level};

use crate::adapters::config::google_config::GoogleConfig;

use super::http_client::{self, HttpClient, HttpsConnector};

#[derive(Error, Debug)]
pub enum GoogleAuthError {
    #[error("Could not read service account key at '{0}'")]
    ReadKey(String),
    #[error("Service account key has no client_email")]
    MissingClientEmail,
    #[error("Could not create an authenticator")]
    BuildAuthenticator,
}

/// The process-wide Google credential. Built once at startup and handed to
/// the Drive and Sheets adapters; nothing mutates it afterwards.
#[derive(Clone)]
pub struct ServiceAccount {
    pub client: HttpClient,
    pub authenticator: Authenticator<HttpsConnector>,
    pub email: String,
}

impl std::fmt::Debug for ServiceAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ServiceAccount {{ email: {:?} }}", self.email)
    }
}

impl ServiceAccount {
    #[instrument(name = "ServiceAccount::load")]
    pub async fn load(config: &GoogleConfig) -> error_stack::Result<Self, GoogleAuthError> {
        let key_path = config.service_account_file.as_ref();
        let secret: oauth2::ServiceAccountKey = oauth2::read_service_account_key(key_path)
            .await
            .change_context_lazy(|| GoogleAuthError::ReadKey(key_path.to_string()))
            .attach_printable(
                "Download a JSON key for the service account from the Google Cloud console",
            )?;

        let email = secret.client_email.trim().to_string();
        if email.is_empty() {
            return Err(Report::new(GoogleAuthError::MissingClientEmail));
        }

        let client = http_client::http_client();
        let authenticator =
            oauth2::ServiceAccountAuthenticator::with_client(secret, client.clone())
                .build()
                .await
                .change_context(GoogleAuthError::BuildAuthenticator)?;

        event!(Level::INFO, %email, "Google service account loaded");
        Ok(Self {
            client,
            authenticator,
            email,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_file() {
        let config = GoogleConfig {
            service_account_file: "/definitely/not/here.json".into(),
        };

        let err = ServiceAccount::load(&config).await.unwrap_err();

        assert!(matches!(
            err.current_context(),
            GoogleAuthError::ReadKey(path) if path == "/definitely/not/here.json"
        ));
    }
}
