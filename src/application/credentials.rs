use error_stack::{report, ResultExt};
use tracing::{event, Level};

use crate::domain::{GuardError, GuardResult, Identity};
use crate::ports::identity_verifier::{IdentityVerifier, VerifierError};

/// Runs `credential` through the verifier and folds its failures into the
/// two outcomes callers care about: the caller is not who they claim, or we
/// could not find out.
pub async fn verify_credential(
    verifier: &dyn IdentityVerifier,
    credential: &str,
) -> GuardResult<Identity> {
    let identity = match verifier.verify(credential).await {
        Ok(identity) => identity,
        Err(report) => {
            let context = match report.current_context() {
                VerifierError::Unauthenticated => GuardError::Unauthenticated,
                VerifierError::Unavailable { .. } | VerifierError::InvalidResponse => {
                    event!(Level::ERROR, error = ?report, "Identity verification failed");
                    GuardError::VerifierUnavailable
                }
            };
            return Err(report.change_context(context));
        }
    };

    if !identity.verified {
        event!(Level::DEBUG, user_id = %identity.id, "Identity email not verified");
        return Err(report!(GuardError::Unauthenticated))
            .attach_printable_lazy(|| format!("user {} has no verified email", identity.id));
    }

    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::identity_verifier::MockIdentityVerifier;

    #[tokio::test]
    async fn test_maps_verifier_errors() {
        let cases = [
            (VerifierError::Unauthenticated, GuardError::Unauthenticated),
            (
                VerifierError::Unavailable {
                    details: "timeout".into(),
                },
                GuardError::VerifierUnavailable,
            ),
            (VerifierError::InvalidResponse, GuardError::VerifierUnavailable),
        ];

        for (verifier_error, expected) in cases {
            let mut verifier = MockIdentityVerifier::new();
            verifier
                .expect_verify()
                .returning(move |_| Err(report!(verifier_error.clone())));

            let err = verify_credential(&verifier, "token").await.unwrap_err();
            assert_eq!(err.current_context(), &expected);
        }
    }

    #[tokio::test]
    async fn test_unverified_identity_is_rejected() {
        let mut verifier = MockIdentityVerifier::new();
        verifier.expect_verify().returning(|_| {
            Ok(Identity {
                id: "u1".into(),
                email: "u1@example.com".into(),
                verified: false,
            })
        });

        let err = verify_credential(&verifier, "token").await.unwrap_err();
        assert_eq!(err.current_context(), &GuardError::Unauthenticated);
    }
}
