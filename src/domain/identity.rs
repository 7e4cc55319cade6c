use serde::{Deserialize, Serialize};

/// A caller authenticated by the accounts service. Produced per request and
/// never stored as such; only `id` and `email` are copied into records for
/// attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub email: String,
    pub verified: bool,
}

impl Identity {
    pub fn verified(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            verified: true,
        }
    }
}
