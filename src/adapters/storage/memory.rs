use std::collections::HashMap;

use chrono::{DateTime, Utc};
use error_stack::report;
use tokio::sync::RwLock;

use crate::domain::{BanRecord, GrantRecord, JoinToken, Role, SpreadsheetConfig};
use crate::ports::config_store::{ConfigStore, ConflictKind, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Tables {
    configs: HashMap<String, SpreadsheetConfig>,
    tokens: HashMap<JoinToken, String>,
    joins: HashMap<String, Vec<GrantRecord>>,
    bans: HashMap<String, Vec<BanRecord>>,
}

/// Process-local store. Everything lives behind one lock so the uniqueness
/// checks and the inserts they guard happen atomically.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl ConfigStore for MemoryStore {
    async fn insert_config(&self, config: &SpreadsheetConfig) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if tables.tokens.contains_key(&config.join_token) {
            return Err(report!(StoreError::Conflict(ConflictKind::JoinToken)));
        }
        if tables.configs.contains_key(&config.spreadsheet_id) {
            return Err(report!(StoreError::Conflict(ConflictKind::Spreadsheet)));
        }
        tables
            .tokens
            .insert(config.join_token.clone(), config.spreadsheet_id.clone());
        tables
            .configs
            .insert(config.spreadsheet_id.clone(), config.clone());
        Ok(())
    }

    async fn get_by_token(&self, token: &JoinToken) -> StoreResult<Option<SpreadsheetConfig>> {
        let tables = self.tables.read().await;
        Ok(tables
            .tokens
            .get(token)
            .and_then(|spreadsheet_id| tables.configs.get(spreadsheet_id))
            .cloned())
    }

    async fn get_by_spreadsheet_id(
        &self,
        spreadsheet_id: &str,
    ) -> StoreResult<Option<SpreadsheetConfig>> {
        Ok(self.tables.read().await.configs.get(spreadsheet_id).cloned())
    }

    async fn list_by_author(&self, author_id: &str) -> StoreResult<Vec<SpreadsheetConfig>> {
        let tables = self.tables.read().await;
        let mut configs: Vec<_> = tables
            .configs
            .values()
            .filter(|config| config.is_owned_by(author_id))
            .cloned()
            .collect();
        configs.sort_by_key(|config| config.created_at);
        Ok(configs)
    }

    async fn update_config(
        &self,
        spreadsheet_id: &str,
        role: Role,
        title: &str,
    ) -> StoreResult<Option<SpreadsheetConfig>> {
        let mut tables = self.tables.write().await;
        Ok(tables.configs.get_mut(spreadsheet_id).map(|config| {
            config.role = role;
            config.title = title.to_string();
            config.clone()
        }))
    }

    async fn replace_token(
        &self,
        spreadsheet_id: &str,
        token: &JoinToken,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Option<SpreadsheetConfig>> {
        let mut tables = self.tables.write().await;
        if tables.tokens.contains_key(token) {
            return Err(report!(StoreError::Conflict(ConflictKind::JoinToken)));
        }
        let Some(config) = tables.configs.get_mut(spreadsheet_id) else {
            return Ok(None);
        };
        let old_token = std::mem::replace(&mut config.join_token, token.clone());
        config.expires_at = expires_at;
        config.consumed_at = None;
        let updated = config.clone();

        tables.tokens.remove(&old_token);
        tables
            .tokens
            .insert(token.clone(), spreadsheet_id.to_string());
        Ok(Some(updated))
    }

    async fn mark_consumed(&self, token: &JoinToken, at: DateTime<Utc>) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(spreadsheet_id) = tables.tokens.get(token).cloned() else {
            return Ok(false);
        };
        match tables.configs.get_mut(&spreadsheet_id) {
            Some(config) if config.consumed_at.is_none() => {
                config.consumed_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear_consumed(&self, token: &JoinToken) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let Some(spreadsheet_id) = tables.tokens.get(token).cloned() else {
            return Ok(());
        };
        if let Some(config) = tables.configs.get_mut(&spreadsheet_id) {
            config.consumed_at = None;
        }
        Ok(())
    }

    async fn delete_config(&self, spreadsheet_id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(config) = tables.configs.remove(spreadsheet_id) else {
            return Ok(false);
        };
        tables.tokens.remove(&config.join_token);
        tables.joins.remove(spreadsheet_id);
        tables.bans.remove(spreadsheet_id);
        Ok(true)
    }

    async fn record_join(&self, record: &GrantRecord) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let joins = tables
            .joins
            .entry(record.spreadsheet_id.clone())
            .or_default();
        if joins.iter().any(|join| join.email == record.email) {
            return Ok(false);
        }
        joins.push(record.clone());
        Ok(true)
    }

    async fn list_joins(&self, spreadsheet_id: &str) -> StoreResult<Vec<GrantRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .joins
            .get(spreadsheet_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn remove_joins_of_user(
        &self,
        spreadsheet_id: &str,
        user_id: &str,
    ) -> StoreResult<Vec<GrantRecord>> {
        let mut tables = self.tables.write().await;
        let Some(joins) = tables.joins.get_mut(spreadsheet_id) else {
            return Ok(Vec::new());
        };
        let (removed, kept): (Vec<GrantRecord>, Vec<GrantRecord>) = std::mem::take(joins)
            .into_iter()
            .partition(|join| join.user_id == user_id);
        *joins = kept;
        Ok(removed)
    }

    async fn add_ban(&self, ban: &BanRecord) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let bans = tables.bans.entry(ban.spreadsheet_id.clone()).or_default();
        if bans.iter().any(|existing| existing.user_id == ban.user_id) {
            return Ok(false);
        }
        bans.push(ban.clone());
        Ok(true)
    }

    async fn remove_ban(&self, spreadsheet_id: &str, user_id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        let Some(bans) = tables.bans.get_mut(spreadsheet_id) else {
            return Ok(false);
        };
        let before = bans.len();
        bans.retain(|ban| ban.user_id != user_id);
        Ok(bans.len() != before)
    }

    async fn is_banned(&self, spreadsheet_id: &str, user_id: &str) -> StoreResult<bool> {
        Ok(self
            .tables
            .read()
            .await
            .bans
            .get(spreadsheet_id)
            .is_some_and(|bans| bans.iter().any(|ban| ban.user_id == user_id)))
    }

    async fn list_bans(&self, spreadsheet_id: &str) -> StoreResult<Vec<BanRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .bans
            .get(spreadsheet_id)
            .cloned()
            .unwrap_or_default())
    }
}
