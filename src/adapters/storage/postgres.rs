use std::str::FromStr;

use chrono::{DateTime, Utc};
use deadpool_postgres::{Config, Pool, PoolConfig, Runtime};
use error_stack::{report, ResultExt};
use tokio_postgres::error::SqlState;
use tokio_postgres::{NoTls, Row};
use tracing::{debug, info, instrument};

use crate::adapters::config::storage_config::StorageConfig;
use crate::domain::{BanRecord, GrantRecord, JoinToken, Role, SpreadsheetConfig};
use crate::ports::config_store::{ConfigStore, ConflictKind, StoreError, StoreResult};

const TOKEN_CONSTRAINT: &str = "guard_spreadsheets_join_token_key";

const CONFIG_COLUMNS: &str =
    "spreadsheet_id, role, title, join_token, created_by, created_at, expires_at, consumed_at";

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS guard_spreadsheets (
    spreadsheet_id TEXT PRIMARY KEY,
    role TEXT NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    join_token TEXT NOT NULL,
    created_by TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    expires_at TIMESTAMPTZ,
    consumed_at TIMESTAMPTZ,
    CONSTRAINT guard_spreadsheets_join_token_key UNIQUE (join_token)
);

CREATE INDEX IF NOT EXISTS guard_spreadsheets_author_idx ON guard_spreadsheets(created_by);

CREATE TABLE IF NOT EXISTS guard_joins (
    spreadsheet_id TEXT NOT NULL REFERENCES guard_spreadsheets(spreadsheet_id) ON DELETE CASCADE,
    user_id TEXT NOT NULL,
    email TEXT NOT NULL,
    identity_email TEXT NOT NULL,
    role TEXT NOT NULL,
    permission_id TEXT,
    joined_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (spreadsheet_id, email)
);

CREATE TABLE IF NOT EXISTS guard_bans (
    spreadsheet_id TEXT NOT NULL REFERENCES guard_spreadsheets(spreadsheet_id) ON DELETE CASCADE,
    user_id TEXT NOT NULL,
    email TEXT NOT NULL,
    identity_email TEXT NOT NULL,
    banned_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    PRIMARY KEY (spreadsheet_id, user_id)
);
"#;

/// PostgreSQL storage for spreadsheet configurations, joins and bans
pub struct PostgresStore {
    pool: Pool,
}

impl std::fmt::Debug for PostgresStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresStore")
            .field("pool", &self.pool.status())
            .finish()
    }
}

fn database_error(e: impl std::fmt::Display) -> StoreError {
    StoreError::Database(e.to_string())
}

/// Maps unique violations to the conflict they represent.
fn write_error(e: tokio_postgres::Error) -> error_stack::Report<StoreError> {
    if e.code() == Some(&SqlState::UNIQUE_VIOLATION) {
        let constraint = e.as_db_error().and_then(|db| db.constraint());
        let kind = if constraint == Some(TOKEN_CONSTRAINT) {
            ConflictKind::JoinToken
        } else {
            ConflictKind::Spreadsheet
        };
        return report!(StoreError::Conflict(kind));
    }
    report!(database_error(e))
}

fn role_from_row(row: &Row, column: &str) -> StoreResult<Role> {
    let raw: String = row.get(column);
    Role::from_str(&raw)
        .map_err(|_| report!(StoreError::Serialization(format!("unknown role '{raw}'"))))
}

fn config_from_row(row: &Row) -> StoreResult<SpreadsheetConfig> {
    let raw_token: String = row.get("join_token");
    let join_token = JoinToken::parse(&raw_token)
        .ok_or_else(|| report!(StoreError::Serialization("malformed join token".into())))?;

    Ok(SpreadsheetConfig {
        spreadsheet_id: row.get("spreadsheet_id"),
        role: role_from_row(row, "role")?,
        title: row.get("title"),
        join_token,
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        consumed_at: row.get("consumed_at"),
    })
}

fn join_from_row(row: &Row) -> StoreResult<GrantRecord> {
    Ok(GrantRecord {
        spreadsheet_id: row.get("spreadsheet_id"),
        user_id: row.get("user_id"),
        email: row.get("email"),
        identity_email: row.get("identity_email"),
        role: role_from_row(row, "role")?,
        permission_id: row.get("permission_id"),
        joined_at: row.get("joined_at"),
    })
}

fn ban_from_row(row: &Row) -> BanRecord {
    BanRecord {
        spreadsheet_id: row.get("spreadsheet_id"),
        user_id: row.get("user_id"),
        email: row.get("email"),
        identity_email: row.get("identity_email"),
        banned_at: row.get("banned_at"),
    }
}

impl PostgresStore {
    /// Connects a pool and makes sure the schema exists.
    pub async fn new(config: &StorageConfig) -> StoreResult<Self> {
        let mut cfg = Config::new();
        cfg.url = config.url.clone();
        cfg.pool = Some(PoolConfig::new(config.max_connections));

        let pool = cfg
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| report!(database_error(e)))?;

        let store = Self { pool };
        store.ensure_schema().await?;

        Ok(store)
    }

    async fn client(&self) -> StoreResult<deadpool_postgres::Object> {
        self.pool
            .get()
            .await
            .map_err(|e| report!(database_error(e)))
    }

    async fn ensure_schema(&self) -> StoreResult<()> {
        self.client()
            .await?
            .batch_execute(SCHEMA)
            .await
            .map_err(|e| report!(database_error(e)))?;

        info!("Database schema initialized");
        Ok(())
    }

    async fn query_config(
        &self,
        filter: &str,
        param: &str,
    ) -> StoreResult<Option<SpreadsheetConfig>> {
        let sql = format!("SELECT {CONFIG_COLUMNS} FROM guard_spreadsheets WHERE {filter} = $1");
        let row = self
            .client()
            .await?
            .query_opt(sql.as_str(), &[&param])
            .await
            .map_err(|e| report!(database_error(e)))?;

        row.as_ref().map(config_from_row).transpose()
    }
}

#[async_trait::async_trait]
impl ConfigStore for PostgresStore {
    #[instrument(skip(self))]
    async fn insert_config(&self, config: &SpreadsheetConfig) -> StoreResult<()> {
        self.client()
            .await?
            .execute(
                "INSERT INTO guard_spreadsheets
                    (spreadsheet_id, role, title, join_token, created_by, created_at, expires_at, consumed_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                &[
                    &config.spreadsheet_id,
                    &config.role.as_ref(),
                    &config.title,
                    &config.join_token.as_str(),
                    &config.created_by,
                    &config.created_at,
                    &config.expires_at,
                    &config.consumed_at,
                ],
            )
            .await
            .map_err(write_error)?;

        debug!(spreadsheet_id = %config.spreadsheet_id, "Inserted spreadsheet config");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_by_token(&self, token: &JoinToken) -> StoreResult<Option<SpreadsheetConfig>> {
        self.query_config("join_token", token.as_str()).await
    }

    #[instrument(skip(self))]
    async fn get_by_spreadsheet_id(
        &self,
        spreadsheet_id: &str,
    ) -> StoreResult<Option<SpreadsheetConfig>> {
        self.query_config("spreadsheet_id", spreadsheet_id).await
    }

    #[instrument(skip(self))]
    async fn list_by_author(&self, author_id: &str) -> StoreResult<Vec<SpreadsheetConfig>> {
        let sql = format!(
            "SELECT {CONFIG_COLUMNS} FROM guard_spreadsheets WHERE created_by = $1 ORDER BY created_at"
        );
        let rows = self
            .client()
            .await?
            .query(sql.as_str(), &[&author_id])
            .await
            .map_err(|e| report!(database_error(e)))?;

        rows.iter().map(config_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn update_config(
        &self,
        spreadsheet_id: &str,
        role: Role,
        title: &str,
    ) -> StoreResult<Option<SpreadsheetConfig>> {
        let sql = format!(
            "UPDATE guard_spreadsheets SET role = $2, title = $3 WHERE spreadsheet_id = $1 RETURNING {CONFIG_COLUMNS}"
        );
        let row = self
            .client()
            .await?
            .query_opt(sql.as_str(), &[&spreadsheet_id, &role.as_ref(), &title])
            .await
            .map_err(|e| report!(database_error(e)))?;

        row.as_ref().map(config_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn replace_token(
        &self,
        spreadsheet_id: &str,
        token: &JoinToken,
        expires_at: Option<DateTime<Utc>>,
    ) -> StoreResult<Option<SpreadsheetConfig>> {
        let sql = format!(
            "UPDATE guard_spreadsheets SET join_token = $2, expires_at = $3, consumed_at = NULL
             WHERE spreadsheet_id = $1 RETURNING {CONFIG_COLUMNS}"
        );
        let row = self
            .client()
            .await?
            .query_opt(sql.as_str(), &[&spreadsheet_id, &token.as_str(), &expires_at])
            .await
            .map_err(write_error)?;

        row.as_ref().map(config_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn mark_consumed(&self, token: &JoinToken, at: DateTime<Utc>) -> StoreResult<bool> {
        let claimed = self
            .client()
            .await?
            .execute(
                "UPDATE guard_spreadsheets SET consumed_at = $2
                 WHERE join_token = $1 AND consumed_at IS NULL",
                &[&token.as_str(), &at],
            )
            .await
            .map_err(|e| report!(database_error(e)))?;
        Ok(claimed == 1)
    }

    #[instrument(skip(self))]
    async fn clear_consumed(&self, token: &JoinToken) -> StoreResult<()> {
        self.client()
            .await?
            .execute(
                "UPDATE guard_spreadsheets SET consumed_at = NULL WHERE join_token = $1",
                &[&token.as_str()],
            )
            .await
            .map_err(|e| report!(database_error(e)))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_config(&self, spreadsheet_id: &str) -> StoreResult<bool> {
        let deleted = self
            .client()
            .await?
            .execute(
                "DELETE FROM guard_spreadsheets WHERE spreadsheet_id = $1",
                &[&spreadsheet_id],
            )
            .await
            .map_err(|e| report!(database_error(e)))?;
        Ok(deleted > 0)
    }

    #[instrument(skip(self))]
    async fn record_join(&self, record: &GrantRecord) -> StoreResult<bool> {
        let inserted = self
            .client()
            .await?
            .execute(
                "INSERT INTO guard_joins
                    (spreadsheet_id, user_id, email, identity_email, role, permission_id, joined_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (spreadsheet_id, email) DO NOTHING",
                &[
                    &record.spreadsheet_id,
                    &record.user_id,
                    &record.email,
                    &record.identity_email,
                    &record.role.as_ref(),
                    &record.permission_id,
                    &record.joined_at,
                ],
            )
            .await
            .map_err(|e| report!(database_error(e)))?;
        Ok(inserted > 0)
    }

    #[instrument(skip(self))]
    async fn list_joins(&self, spreadsheet_id: &str) -> StoreResult<Vec<GrantRecord>> {
        let rows = self
            .client()
            .await?
            .query(
                "SELECT * FROM guard_joins WHERE spreadsheet_id = $1 ORDER BY joined_at",
                &[&spreadsheet_id],
            )
            .await
            .map_err(|e| report!(database_error(e)))?;

        rows.iter().map(join_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn remove_joins_of_user(
        &self,
        spreadsheet_id: &str,
        user_id: &str,
    ) -> StoreResult<Vec<GrantRecord>> {
        let rows = self
            .client()
            .await?
            .query(
                "DELETE FROM guard_joins WHERE spreadsheet_id = $1 AND user_id = $2 RETURNING *",
                &[&spreadsheet_id, &user_id],
            )
            .await
            .map_err(|e| report!(database_error(e)))?;

        rows.iter().map(join_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn add_ban(&self, ban: &BanRecord) -> StoreResult<bool> {
        let inserted = self
            .client()
            .await?
            .execute(
                "INSERT INTO guard_bans (spreadsheet_id, user_id, email, identity_email, banned_at)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (spreadsheet_id, user_id) DO NOTHING",
                &[
                    &ban.spreadsheet_id,
                    &ban.user_id,
                    &ban.email,
                    &ban.identity_email,
                    &ban.banned_at,
                ],
            )
            .await
            .map_err(|e| report!(database_error(e)))?;
        Ok(inserted > 0)
    }

    #[instrument(skip(self))]
    async fn remove_ban(&self, spreadsheet_id: &str, user_id: &str) -> StoreResult<bool> {
        let deleted = self
            .client()
            .await?
            .execute(
                "DELETE FROM guard_bans WHERE spreadsheet_id = $1 AND user_id = $2",
                &[&spreadsheet_id, &user_id],
            )
            .await
            .map_err(|e| report!(database_error(e)))?;
        Ok(deleted > 0)
    }

    #[instrument(skip(self))]
    async fn is_banned(&self, spreadsheet_id: &str, user_id: &str) -> StoreResult<bool> {
        let row = self
            .client()
            .await?
            .query_opt(
                "SELECT 1 FROM guard_bans WHERE spreadsheet_id = $1 AND user_id = $2",
                &[&spreadsheet_id, &user_id],
            )
            .await
            .map_err(|e| report!(database_error(e)))?;
        Ok(row.is_some())
    }

    #[instrument(skip(self))]
    async fn list_bans(&self, spreadsheet_id: &str) -> StoreResult<Vec<BanRecord>> {
        let rows = self
            .client()
            .await?
            .query(
                "SELECT * FROM guard_bans WHERE spreadsheet_id = $1 ORDER BY banned_at",
                &[&spreadsheet_id],
            )
            .await
            .map_err(|e| report!(database_error(e)))
            .attach_printable_lazy(|| format!("spreadsheet {spreadsheet_id}"))?;

        Ok(rows.iter().map(ban_from_row).collect())
    }
}
