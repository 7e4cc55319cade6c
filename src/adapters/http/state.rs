use std::sync::Arc;

use crate::application::{AdminService, GrantOrchestrator, JoinLinkIssuer, JoinSettings};

/// Everything the handlers need, cheap to clone per request.
#[derive(Clone)]
pub struct AppState {
    pub admin: Arc<AdminService>,
    pub orchestrator: Arc<GrantOrchestrator>,
    pub issuer: Arc<JoinLinkIssuer>,
    pub settings: Arc<JoinSettings>,
}
