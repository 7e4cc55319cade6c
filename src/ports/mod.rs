pub mod config_store;
pub mod identity_verifier;
pub mod permission_grantor;
pub mod sheet_greeter;

pub use config_store::{ConfigStore, ConflictKind, StoreError, StoreResult};
pub use identity_verifier::{IdentityVerifier, VerifierError};
pub use permission_grantor::{GrantorError, PermissionGrantor};
pub use sheet_greeter::{SheetGreeter, SheetGreeterError};
