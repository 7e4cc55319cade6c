use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::join_token::JoinToken;
use super::role::Role;

/// A registered spreadsheet and the join link that grants `role` on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpreadsheetConfig {
    pub spreadsheet_id: String,
    pub role: Role,
    pub title: String,
    pub join_token: JoinToken,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl SpreadsheetConfig {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.created_by == user_id
    }
}

/// One successful grant. `email` is the address that received the Drive
/// permission, `identity_email` the address the caller authenticated with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrantRecord {
    pub spreadsheet_id: String,
    pub user_id: String,
    pub email: String,
    pub identity_email: String,
    pub role: Role,
    pub permission_id: Option<String>,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BanRecord {
    pub spreadsheet_id: String,
    pub user_id: String,
    pub email: String,
    pub identity_email: String,
    pub banned_at: DateTime<Utc>,
}
