pub mod email;
pub mod error;
pub mod identity;
pub mod join_token;
pub mod role;
pub mod spreadsheet;

// Re-export commonly used types
pub use error::{GuardError, GuardResult};
pub use identity::Identity;
pub use join_token::{JoinToken, RandomTokenGenerator, TokenGenerator};
pub use role::Role;
pub use spreadsheet::{BanRecord, GrantRecord, SpreadsheetConfig};
