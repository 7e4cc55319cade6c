use error_stack::report;
use google_drive3::api::Permission;
use google_drive3::DriveHub;
use tracing::{event, instrument, Level};

use crate::domain::Role;
use crate::ports::permission_grantor::{GrantorError, PermissionGrantor};

use super::auth::ServiceAccount;
use super::http_client::HttpsConnector;

/// Shares spreadsheets through the Drive v3 permissions API, acting as the
/// service account.
pub struct DriveGrantor {
    hub: DriveHub<HttpsConnector>,
    service_account_email: String,
}

impl std::fmt::Debug for DriveGrantor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DriveGrantor {{ service_account_email: {:?} }}",
            self.service_account_email
        )
    }
}

impl DriveGrantor {
    pub fn new(account: &ServiceAccount) -> Self {
        Self {
            hub: DriveHub::new(account.client.clone(), account.authenticator.clone()),
            service_account_email: account.email.clone(),
        }
    }
}

/// Pulls the human readable part out of a Drive API failure.
fn grantor_error(err: &google_drive3::Error) -> GrantorError {
    match err {
        google_drive3::Error::HttpError(_) | google_drive3::Error::Io(_) => GrantorError::Transport,
        google_drive3::Error::BadRequest(body) => GrantorError::rejected(
            body.pointer("/error/message")
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| body.to_string()),
        ),
        google_drive3::Error::Failure(response) => {
            GrantorError::rejected(format!("Drive API answered {}", response.status()))
        }
        other => GrantorError::rejected(other.to_string()),
    }
}

#[async_trait::async_trait]
impl PermissionGrantor for DriveGrantor {
    #[instrument(skip(self))]
    async fn grant(
        &self,
        spreadsheet_id: &str,
        email: &str,
        role: Role,
    ) -> error_stack::Result<Option<String>, GrantorError> {
        let permission = Permission {
            type_: Some("user".to_string()),
            role: Some(role.as_ref().to_string()),
            email_address: Some(email.to_string()),
            ..Default::default()
        };

        let (_, created) = self
            .hub
            .permissions()
            .create(permission, spreadsheet_id)
            .send_notification_email(false)
            .supports_all_drives(true)
            .doit()
            .await
            .map_err(|err| report!(grantor_error(&err)).attach_printable(err.to_string()))?;

        event!(Level::INFO, permission_id = ?created.id, "Drive permission created");
        Ok(created.id)
    }

    #[instrument(skip(self))]
    async fn revoke(
        &self,
        spreadsheet_id: &str,
        permission_id: &str,
    ) -> error_stack::Result<(), GrantorError> {
        self.hub
            .permissions()
            .delete(spreadsheet_id, permission_id)
            .supports_all_drives(true)
            .doit()
            .await
            .map(|_| ())
            .map_err(|err| report!(grantor_error(&err)).attach_printable(err.to_string()))
    }

    #[instrument(skip(self))]
    async fn has_service_access(
        &self,
        spreadsheet_id: &str,
    ) -> error_stack::Result<bool, GrantorError> {
        let result = self
            .hub
            .permissions()
            .list(spreadsheet_id)
            .supports_all_drives(true)
            .param("fields", "permissions(emailAddress)")
            .doit()
            .await;

        let permissions = match result {
            Ok((_, list)) => list.permissions.unwrap_or_default(),
            Err(err) => {
                return match grantor_error(&err) {
                    GrantorError::Transport => {
                        Err(report!(GrantorError::Transport).attach_printable(err.to_string()))
                    }
                    // Drive answers 404 for files the account cannot see.
                    GrantorError::Rejected { reason } => {
                        event!(Level::DEBUG, %reason, "Spreadsheet not visible to service account");
                        Ok(false)
                    }
                };
            }
        };

        Ok(permissions.iter().any(|permission| {
            permission
                .email_address
                .as_deref()
                .is_some_and(|email| email.eq_ignore_ascii_case(&self.service_account_email))
        }))
    }

    fn service_account_email(&self) -> String {
        self.service_account_email.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_request_reason_is_the_api_message() {
        let err = google_drive3::Error::BadRequest(serde_json::json!({
            "error": {
                "code": 400,
                "message": "Bad Request. User message: \"You are trying to invite x@corp.example.\""
            }
        }));

        assert_eq!(
            grantor_error(&err),
            GrantorError::rejected(
                "Bad Request. User message: \"You are trying to invite x@corp.example.\""
            )
        );
    }

    #[test]
    fn test_bad_request_without_message_keeps_body() {
        let err = google_drive3::Error::BadRequest(serde_json::json!({ "oops": true }));

        assert_eq!(grantor_error(&err), GrantorError::rejected(r#"{"oops":true}"#));
    }

    #[test]
    fn test_io_error_is_transport() {
        let err = google_drive3::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        ));

        assert_eq!(grantor_error(&err), GrantorError::Transport);
    }
}
