use std::sync::Arc;

use chrono::{DateTime, Utc};
use error_stack::{report, ResultExt};
use tracing::{event, instrument, Level};

use crate::domain::{
    GuardError, GuardResult, JoinToken, RandomTokenGenerator, Role, SpreadsheetConfig,
    TokenGenerator,
};
use crate::ports::config_store::{ConfigStore, ConflictKind, StoreError};

use super::join_settings::JoinSettings;

/// How many fresh tokens are tried before a collision is treated as an
/// internal failure.
pub const MAX_ISSUE_ATTEMPTS: usize = 5;

/// Creates, resolves and rotates the join tokens bound to spreadsheet
/// configurations.
pub struct JoinLinkIssuer {
    store: Arc<dyn ConfigStore>,
    generator: Box<dyn TokenGenerator>,
    settings: Arc<JoinSettings>,
}

impl JoinLinkIssuer {
    pub fn new(store: Arc<dyn ConfigStore>, settings: Arc<JoinSettings>) -> Self {
        Self::with_generator(store, settings, Box::new(RandomTokenGenerator))
    }

    pub fn with_generator(
        store: Arc<dyn ConfigStore>,
        settings: Arc<JoinSettings>,
        generator: Box<dyn TokenGenerator>,
    ) -> Self {
        Self {
            store,
            generator,
            settings,
        }
    }

    pub fn join_url(&self, token: &JoinToken) -> String {
        format!(
            "{}/join/{}",
            self.settings.public_base_url.trim_end_matches('/'),
            token
        )
    }

    fn expires_at(&self, now: DateTime<Utc>) -> GuardResult<Option<DateTime<Utc>>> {
        let Some(ttl) = self.settings.link_ttl else {
            return Ok(None);
        };
        chrono::Duration::from_std(ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .map(Some)
            .ok_or_else(|| {
                report!(GuardError::internal(format!(
                    "join link ttl of {}s is out of range",
                    ttl.as_secs()
                )))
            })
    }

    #[instrument(skip(self))]
    pub async fn issue(
        &self,
        spreadsheet_id: &str,
        role: Role,
        title: &str,
        created_by: &str,
    ) -> GuardResult<SpreadsheetConfig> {
        let now = Utc::now();
        let expires_at = self.expires_at(now)?;
        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let config = SpreadsheetConfig {
                spreadsheet_id: spreadsheet_id.to_string(),
                role,
                title: title.to_string(),
                join_token: self.generator.generate(),
                created_by: created_by.to_string(),
                created_at: now,
                expires_at,
                consumed_at: None,
            };

            match self.store.insert_config(&config).await {
                Ok(()) => {
                    event!(Level::INFO, spreadsheet_id, %role, "Join link issued");
                    return Ok(config);
                }
                Err(report) => match report.current_context().clone() {
                    StoreError::Conflict(ConflictKind::JoinToken) => {
                        event!(Level::WARN, attempt, "Join token collision, retrying");
                    }
                    StoreError::Conflict(ConflictKind::Spreadsheet) => {
                        return Err(report.change_context(GuardError::AlreadyRegistered));
                    }
                    _ => {
                        return Err(report.change_context(GuardError::internal(
                            "failed to store spreadsheet configuration",
                        )));
                    }
                },
            }
        }

        Err(report!(GuardError::internal(format!(
            "could not generate a unique join token in {MAX_ISSUE_ATTEMPTS} attempts"
        ))))
    }

    /// Looks the token up. Malformed, unknown, expired and consumed links all
    /// resolve to [`GuardError::NotFound`]; malformed ones never reach the store.
    #[instrument(skip_all)]
    pub async fn resolve(&self, raw_token: &str) -> GuardResult<SpreadsheetConfig> {
        let token =
            JoinToken::parse(raw_token).ok_or_else(|| report!(GuardError::not_found("join link")))?;

        let config = self
            .store
            .get_by_token(&token)
            .await
            .change_context_lazy(|| GuardError::internal("failed to look up join link"))?
            .ok_or_else(|| report!(GuardError::not_found("join link")))?;

        if config.is_expired(Utc::now()) {
            event!(Level::DEBUG, spreadsheet_id = %config.spreadsheet_id, "Join link expired");
            return Err(report!(GuardError::not_found("join link")));
        }
        if self.settings.single_use && config.is_consumed() {
            event!(Level::DEBUG, spreadsheet_id = %config.spreadsheet_id, "Join link already used");
            return Err(report!(GuardError::not_found("join link")));
        }

        Ok(config)
    }

    #[instrument(skip(self))]
    pub async fn rotate(&self, spreadsheet_id: &str) -> GuardResult<SpreadsheetConfig> {
        let expires_at = self.expires_at(Utc::now())?;
        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let token = self.generator.generate();
            match self
                .store
                .replace_token(spreadsheet_id, &token, expires_at)
                .await
            {
                Ok(Some(config)) => {
                    event!(Level::INFO, spreadsheet_id, "Join link rotated");
                    return Ok(config);
                }
                Ok(None) => return Err(report!(GuardError::not_found("spreadsheet"))),
                Err(report)
                    if report.current_context()
                        == &StoreError::Conflict(ConflictKind::JoinToken) =>
                {
                    event!(Level::WARN, attempt, "Join token collision, retrying");
                }
                Err(report) => {
                    return Err(report
                        .change_context(GuardError::internal("failed to rotate join link")));
                }
            }
        }

        Err(report!(GuardError::internal(format!(
            "could not generate a unique join token in {MAX_ISSUE_ATTEMPTS} attempts"
        ))))
    }

    /// Takes a single-use link for one join attempt. A link someone else
    /// already claimed is [`GuardError::NotFound`], like any used link.
    /// Multi-use links are never claimed.
    pub async fn claim(&self, config: &SpreadsheetConfig) -> GuardResult<()> {
        if !self.settings.single_use {
            return Ok(());
        }
        let claimed = self
            .store
            .mark_consumed(&config.join_token, Utc::now())
            .await
            .change_context_lazy(|| GuardError::internal("failed to claim join link"))?;
        if !claimed {
            event!(
                Level::DEBUG,
                spreadsheet_id = %config.spreadsheet_id,
                "Join link already claimed"
            );
            return Err(report!(GuardError::not_found("join link")));
        }
        Ok(())
    }

    /// Undoes [`JoinLinkIssuer::claim`] after a join attempt failed.
    pub async fn release(&self, config: &SpreadsheetConfig) -> GuardResult<()> {
        if !self.settings.single_use {
            return Ok(());
        }
        self.store
            .clear_consumed(&config.join_token)
            .await
            .change_context_lazy(|| GuardError::internal("failed to release join link"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::memory::MemoryStore;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Hands out a fixed sequence of tokens, repeating the last one.
    struct SequenceGenerator {
        tokens: Mutex<Vec<JoinToken>>,
    }

    impl SequenceGenerator {
        fn new(tokens: &[&str]) -> Self {
            let mut tokens: Vec<_> = tokens
                .iter()
                .map(|token| JoinToken::parse(token).unwrap())
                .collect();
            tokens.reverse();
            Self {
                tokens: Mutex::new(tokens),
            }
        }
    }

    impl TokenGenerator for SequenceGenerator {
        fn generate(&self) -> JoinToken {
            let mut tokens = self.tokens.lock().unwrap();
            if tokens.len() > 1 {
                tokens.pop().unwrap()
            } else {
                tokens[0].clone()
            }
        }
    }

    const TOKEN_A: &str = "AAAAAAAAAAAAAAAAAAAAAA";
    const TOKEN_B: &str = "BBBBBBBBBBBBBBBBBBBBBB";

    fn issuer_with(settings: JoinSettings) -> (JoinLinkIssuer, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let issuer = JoinLinkIssuer::new(store.clone(), Arc::new(settings));
        (issuer, store)
    }

    fn issuer() -> (JoinLinkIssuer, Arc<MemoryStore>) {
        issuer_with(JoinSettings::new("https://guard.example.com/"))
    }

    #[tokio::test]
    async fn test_resolve_returns_issued_configuration() {
        let (issuer, _) = issuer();

        let issued = issuer
            .issue("abc123", Role::Reader, "Budget", "admin-1")
            .await
            .unwrap();
        let resolved = issuer.resolve(issued.join_token.as_str()).await.unwrap();

        assert_eq!(resolved.spreadsheet_id, "abc123");
        assert_eq!(resolved.role, Role::Reader);
        assert_eq!(resolved, issued);
    }

    #[tokio::test]
    async fn test_resolve_is_repeatable() {
        let (issuer, _) = issuer();
        let issued = issuer.issue("abc123", Role::Writer, "", "admin").await.unwrap();

        for _ in 0..3 {
            let resolved = issuer.resolve(issued.join_token.as_str()).await.unwrap();
            assert_eq!(resolved.spreadsheet_id, "abc123");
        }
    }

    #[tokio::test]
    async fn test_concurrent_issuance_yields_unique_tokens() {
        let (issuer, _) = issuer();
        let ids: Vec<String> = (0..200).map(|i| format!("sheet-{i}")).collect();

        let results = futures::future::join_all(
            ids.iter()
                .map(|id| issuer.issue(id, Role::Writer, "", "admin")),
        )
        .await;

        let tokens: HashSet<_> = results
            .into_iter()
            .map(|result| result.unwrap().join_token)
            .collect();
        assert_eq!(tokens.len(), ids.len());
    }

    #[tokio::test]
    async fn test_collision_is_retried_with_fresh_token() {
        let store = Arc::new(MemoryStore::new());
        let issuer = JoinLinkIssuer::with_generator(
            store.clone(),
            Arc::new(JoinSettings::new("https://guard.example.com")),
            Box::new(SequenceGenerator::new(&[TOKEN_A, TOKEN_A, TOKEN_B])),
        );

        let first = issuer.issue("one", Role::Writer, "", "admin").await.unwrap();
        let second = issuer.issue("two", Role::Writer, "", "admin").await.unwrap();

        assert_eq!(first.join_token.as_str(), TOKEN_A);
        assert_eq!(second.join_token.as_str(), TOKEN_B);
        assert_eq!(issuer.resolve(TOKEN_B).await.unwrap().spreadsheet_id, "two");
    }

    #[tokio::test]
    async fn test_collision_exhaustion_is_internal() {
        let store = Arc::new(MemoryStore::new());
        let issuer = JoinLinkIssuer::with_generator(
            store,
            Arc::new(JoinSettings::new("https://guard.example.com")),
            Box::new(SequenceGenerator::new(&[TOKEN_A])),
        );
        issuer.issue("one", Role::Writer, "", "admin").await.unwrap();

        let err = issuer.issue("two", Role::Writer, "", "admin").await.unwrap_err();

        assert!(matches!(err.current_context(), GuardError::Internal(_)));
    }

    #[tokio::test]
    async fn test_duplicate_spreadsheet_is_already_registered() {
        let (issuer, _) = issuer();
        issuer.issue("abc123", Role::Writer, "", "admin").await.unwrap();

        let err = issuer
            .issue("abc123", Role::Reader, "", "admin")
            .await
            .unwrap_err();

        assert_eq!(err.current_context(), &GuardError::AlreadyRegistered);
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_tokens_are_not_found() {
        let (issuer, _) = issuer();

        for raw in ["nonexistent-token", "", TOKEN_A, "AAAAAAAAAAAAAAAAAAAAA/"] {
            let err = issuer.resolve(raw).await.unwrap_err();
            assert!(
                matches!(err.current_context(), GuardError::NotFound(_)),
                "{raw:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_join_url_embeds_token() {
        let (issuer, _) = issuer();
        let token = JoinToken::parse(TOKEN_A).unwrap();

        assert_eq!(
            issuer.join_url(&token),
            format!("https://guard.example.com/join/{TOKEN_A}")
        );
    }

    #[tokio::test]
    async fn test_expired_link_is_not_found() {
        let (issuer, store) = issuer();
        let now = Utc::now();
        store
            .insert_config(&SpreadsheetConfig {
                spreadsheet_id: "old".to_string(),
                role: Role::Writer,
                title: String::new(),
                join_token: JoinToken::parse(TOKEN_A).unwrap(),
                created_by: "admin".to_string(),
                created_at: now - chrono::Duration::hours(2),
                expires_at: Some(now - chrono::Duration::hours(1)),
                consumed_at: None,
            })
            .await
            .unwrap();

        let err = issuer.resolve(TOKEN_A).await.unwrap_err();

        assert!(matches!(err.current_context(), GuardError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_ttl_sets_expiry() {
        let mut settings = JoinSettings::new("https://guard.example.com");
        settings.link_ttl = Some(Duration::from_secs(3600));
        let (issuer, _) = issuer_with(settings);

        let config = issuer.issue("abc", Role::Writer, "", "admin").await.unwrap();

        let expires_at = config.expires_at.unwrap();
        assert_eq!(expires_at - config.created_at, chrono::Duration::hours(1));
        assert!(issuer.resolve(config.join_token.as_str()).await.is_ok());
    }

    #[tokio::test]
    async fn test_ttl_out_of_range_is_an_error() {
        let mut settings = JoinSettings::new("https://guard.example.com");
        settings.link_ttl = Some(Duration::from_secs(1_000_000_000_000_000));
        let (issuer, store) = issuer_with(settings);

        let err = issuer
            .issue("abc123", Role::Writer, "", "admin")
            .await
            .unwrap_err();

        assert!(matches!(err.current_context(), GuardError::Internal(_)));
        assert!(store.get_by_spreadsheet_id("abc123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_single_use_link_stops_resolving_after_claim() {
        let mut settings = JoinSettings::new("https://guard.example.com");
        settings.single_use = true;
        let (issuer, _) = issuer_with(settings);
        let config = issuer.issue("abc", Role::Writer, "", "admin").await.unwrap();

        issuer.claim(&config).await.unwrap();

        let err = issuer.resolve(config.join_token.as_str()).await.unwrap_err();
        assert!(matches!(err.current_context(), GuardError::NotFound(_)));
        let err = issuer.claim(&config).await.unwrap_err();
        assert!(matches!(err.current_context(), GuardError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_released_link_can_be_claimed_again() {
        let mut settings = JoinSettings::new("https://guard.example.com");
        settings.single_use = true;
        let (issuer, _) = issuer_with(settings);
        let config = issuer.issue("abc", Role::Writer, "", "admin").await.unwrap();

        issuer.claim(&config).await.unwrap();
        issuer.release(&config).await.unwrap();

        assert!(issuer.resolve(config.join_token.as_str()).await.is_ok());
        issuer.claim(&config).await.unwrap();
    }

    #[tokio::test]
    async fn test_claim_is_noop_for_multi_use_links() {
        let (issuer, _) = issuer();
        let config = issuer.issue("abc", Role::Writer, "", "admin").await.unwrap();

        issuer.claim(&config).await.unwrap();
        issuer.claim(&config).await.unwrap();

        assert!(issuer.resolve(config.join_token.as_str()).await.is_ok());
    }

    #[tokio::test]
    async fn test_rotate_invalidates_old_token() {
        let (issuer, _) = issuer();
        let original = issuer.issue("abc", Role::Writer, "T", "admin").await.unwrap();

        let rotated = issuer.rotate("abc").await.unwrap();

        assert_ne!(rotated.join_token, original.join_token);
        assert_eq!(rotated.title, "T");
        assert!(issuer.resolve(original.join_token.as_str()).await.is_err());
        assert_eq!(
            issuer
                .resolve(rotated.join_token.as_str())
                .await
                .unwrap()
                .spreadsheet_id,
            "abc"
        );
    }

    #[tokio::test]
    async fn test_rotate_unknown_spreadsheet() {
        let (issuer, _) = issuer();
        let err = issuer.rotate("missing").await.unwrap_err();
        assert!(matches!(err.current_context(), GuardError::NotFound(_)));
    }
}
