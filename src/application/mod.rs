pub mod admin_service;
pub mod credentials;
pub mod grant_orchestrator;
pub mod join_link_issuer;
pub mod join_settings;

pub use admin_service::{AdminService, Registration, SpreadsheetDetails, SpreadsheetSummary};
pub use grant_orchestrator::{GrantOrchestrator, Granted};
pub use join_link_issuer::{JoinLinkIssuer, MAX_ISSUE_ATTEMPTS};
pub use join_settings::JoinSettings;
