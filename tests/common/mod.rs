#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use error_stack::report;

use sheets_guard::adapters::http::AppState;
use sheets_guard::adapters::storage::memory::MemoryStore;
use sheets_guard::application::{AdminService, GrantOrchestrator, JoinLinkIssuer, JoinSettings};
use sheets_guard::domain::{Identity, Role};
use sheets_guard::ports::{
    ConfigStore, GrantorError, IdentityVerifier, PermissionGrantor, SheetGreeter,
    SheetGreeterError, VerifierError,
};

pub const BASE_URL: &str = "https://guard.example.com";
pub const SERVICE_EMAIL: &str = "guard@project.iam.gserviceaccount.com";

pub const ADMIN_CREDENTIAL: &str = "admin-credential";
pub const OTHER_ADMIN_CREDENTIAL: &str = "other-admin-credential";
pub const ALICE_CREDENTIAL: &str = "alice-credential";
pub const BOB_CREDENTIAL: &str = "bob-credential";

/// Accounts service stand-in: a fixed credential to identity table.
#[derive(Default)]
pub struct FakeVerifier {
    identities: HashMap<String, Identity>,
    calls: AtomicUsize,
}

impl FakeVerifier {
    pub fn with_defaults() -> Self {
        let identities = [
            (ADMIN_CREDENTIAL, Identity::verified("admin-1", "owner@example.com")),
            (OTHER_ADMIN_CREDENTIAL, Identity::verified("admin-2", "other@example.com")),
            (ALICE_CREDENTIAL, Identity::verified("user-alice", "alice@gmail.com")),
            (BOB_CREDENTIAL, Identity::verified("user-bob", "bob@gmail.com")),
        ]
        .into_iter()
        .map(|(credential, identity)| (credential.to_string(), identity))
        .collect();
        Self {
            identities,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for FakeVerifier {
    async fn verify(&self, credential: &str) -> error_stack::Result<Identity, VerifierError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.identities
            .get(credential)
            .cloned()
            .ok_or_else(|| report!(VerifierError::Unauthenticated))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantCall {
    pub spreadsheet_id: String,
    pub email: String,
    pub role: Role,
}

/// Drive stand-in that remembers every permission it was asked to create.
pub struct RecordingGrantor {
    grants: Mutex<Vec<GrantCall>>,
    revoked: Mutex<Vec<String>>,
    has_access: bool,
    delay: Option<Duration>,
}

impl RecordingGrantor {
    pub fn new(has_access: bool) -> Self {
        Self {
            grants: Mutex::new(Vec::new()),
            revoked: Mutex::new(Vec::new()),
            has_access,
            delay: None,
        }
    }

    /// Makes every grant take `delay`, so concurrent joins overlap.
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(true)
        }
    }

    pub fn grants(&self) -> Vec<GrantCall> {
        self.grants.lock().unwrap().clone()
    }

    pub fn revoked(&self) -> Vec<String> {
        self.revoked.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl PermissionGrantor for RecordingGrantor {
    async fn grant(
        &self,
        spreadsheet_id: &str,
        email: &str,
        role: Role,
    ) -> error_stack::Result<Option<String>, GrantorError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut grants = self.grants.lock().unwrap();
        grants.push(GrantCall {
            spreadsheet_id: spreadsheet_id.to_string(),
            email: email.to_string(),
            role,
        });
        Ok(Some(format!("perm-{}", grants.len())))
    }

    async fn revoke(
        &self,
        _spreadsheet_id: &str,
        permission_id: &str,
    ) -> error_stack::Result<(), GrantorError> {
        self.revoked.lock().unwrap().push(permission_id.to_string());
        Ok(())
    }

    async fn has_service_access(
        &self,
        _spreadsheet_id: &str,
    ) -> error_stack::Result<bool, GrantorError> {
        Ok(self.has_access)
    }

    fn service_account_email(&self) -> String {
        SERVICE_EMAIL.to_string()
    }
}

pub struct NoopGreeter;

#[async_trait::async_trait]
impl SheetGreeter for NoopGreeter {
    async fn write_greeting(
        &self,
        _spreadsheet_id: &str,
        _join_link: &str,
        _role: Role,
    ) -> error_stack::Result<String, SheetGreeterError> {
        Ok("Hello from Sheets Guard".to_string())
    }
}

pub struct Harness {
    pub state: AppState,
    pub verifier: Arc<FakeVerifier>,
    pub grantor: Arc<RecordingGrantor>,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub fn new(settings: JoinSettings) -> Self {
        Self::with_grantor(settings, RecordingGrantor::new(true))
    }

    pub fn with_grantor(settings: JoinSettings, grantor: RecordingGrantor) -> Self {
        let settings = Arc::new(settings);
        let verifier = Arc::new(FakeVerifier::with_defaults());
        let grantor = Arc::new(grantor);
        let store = Arc::new(MemoryStore::new());

        let store_port: Arc<dyn ConfigStore> = store.clone();
        let verifier_port: Arc<dyn IdentityVerifier> = verifier.clone();
        let grantor_port: Arc<dyn PermissionGrantor> = grantor.clone();

        let issuer = Arc::new(JoinLinkIssuer::new(
            Arc::clone(&store_port),
            Arc::clone(&settings),
        ));
        let admin = Arc::new(AdminService::new(
            Arc::clone(&issuer),
            Arc::clone(&verifier_port),
            Arc::clone(&grantor_port),
            Arc::new(NoopGreeter),
            Arc::clone(&store_port),
        ));
        let orchestrator = Arc::new(GrantOrchestrator::new(
            Arc::clone(&issuer),
            verifier_port,
            grantor_port,
            store_port,
            Arc::clone(&settings),
        ));

        Self {
            state: AppState {
                admin,
                orchestrator,
                issuer,
                settings,
            },
            verifier,
            grantor,
            store,
        }
    }

    pub fn admin(&self) -> Identity {
        Identity::verified("admin-1", "owner@example.com")
    }
}

/// The token part of `https://host/join/<token>`.
pub fn token_of(join_url: &str) -> String {
    join_url
        .rsplit_once("/join/")
        .map(|(_, token)| token.to_string())
        .unwrap_or_default()
}
