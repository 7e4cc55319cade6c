use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::{BanRecord, GrantRecord, JoinToken, Role, SpreadsheetConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Another configuration already holds this join token.
    JoinToken,
    /// The spreadsheet is already registered.
    Spreadsheet,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Uniqueness conflict on {0:?}")]
    Conflict(ConflictKind),
    #[error("Stored row could not be decoded: {0}")]
    Serialization(String),
}

pub type StoreResult<T> = error_stack::Result<T, StoreError>;

/// Persistence for spreadsheet configurations and their join/ban records.
///
/// Implementations must enforce uniqueness of both `join_token` and
/// `spreadsheet_id` atomically and report violations as
/// [`StoreError::Conflict`].
#[async_trait::async_trait]
pub trait ConfigStore: Send + Sync {
    async fn insert_config(&self, config: &SpreadsheetConfig) -> StoreResult<()>;

    async fn get_by_token(&self, token: &JoinToken) -> StoreResult<Option<SpreadsheetConfig>>;

    async fn get_by_spreadsheet_id(
        &self,
        spreadsheet_id: &str,
    ) -> StoreResult<Option<SpreadsheetConfig>>;

    async fn list_by_author(&self, author_id: &str) -> StoreResult<Vec<SpreadsheetConfig>>;

    /// Returns the updated configuration, `None` if it does not exist.
    async fn update_config(
        &self,
        spreadsheet_id: &str,
        role: Role,
        title: &str,
    ) -> StoreResult<Option<SpreadsheetConfig>>;

    async fn replace_token(
        &self,
        spreadsheet_id: &str,
        token: &JoinToken,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Option<SpreadsheetConfig>>;

    /// Claims the link behind `token`. Returns `false` when it was already
    /// claimed or no longer exists; concurrent callers get `true` at most once.
    async fn mark_consumed(&self, token: &JoinToken, at: DateTime<Utc>) -> StoreResult<bool>;

    /// Gives a claimed link back.
    async fn clear_consumed(&self, token: &JoinToken) -> StoreResult<()>;

    /// Drops the configuration with all its join and ban records.
    async fn delete_config(&self, spreadsheet_id: &str) -> StoreResult<bool>;

    /// Returns `false` when `record.email` already joined this spreadsheet.
    async fn record_join(&self, record: &GrantRecord) -> StoreResult<bool>;

    async fn list_joins(&self, spreadsheet_id: &str) -> StoreResult<Vec<GrantRecord>>;

    /// Removes and returns every join record of `user_id`.
    async fn remove_joins_of_user(
        &self,
        spreadsheet_id: &str,
        user_id: &str,
    ) -> StoreResult<Vec<GrantRecord>>;

    /// Returns `false` when the user was already banned.
    async fn add_ban(&self, ban: &BanRecord) -> StoreResult<bool>;

    async fn remove_ban(&self, spreadsheet_id: &str, user_id: &str) -> StoreResult<bool>;

    async fn is_banned(&self, spreadsheet_id: &str, user_id: &str) -> StoreResult<bool>;

    async fn list_bans(&self, spreadsheet_id: &str) -> StoreResult<Vec<BanRecord>>;
}
