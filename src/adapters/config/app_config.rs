use std::time::Duration;

use chrono::Utc;
use config::Config;
use error_stack::{report, ResultExt};
use serde::Deserialize;
use serde_path_to_error::{Deserializer as PathDeserializer, Segment, Track};
use thiserror::Error;

use super::accounts_config::AccountsConfig;
use super::google_config::GoogleConfig;
use super::join_config::JoinConfig;
use super::server_config::ServerConfig;
use super::storage_config::{StorageBackend, StorageConfig};
use super::telemetry_config::TelemetryConfig;

pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "Config";
/// Environment overrides look like `GUARD__SERVER__LISTEN_ADDR`.
pub const ENV_PREFIX: &str = "GUARD";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Error reading config file '{0}'")]
    Read(String),
    #[error("Failed to deserialize config file '{path}' at field '{field}'")]
    Deserialize { path: String, field: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub accounts: AccountsConfig,
    pub google: GoogleConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub join: JoinConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Reads `path` (any format the `config` crate understands, extension
    /// optional) layered with `GUARD__*` environment variables.
    pub fn load(path: &str) -> error_stack::Result<Self, ConfigError> {
        Self::load_with_env(path, Self::environment())
    }

    /// `GUARD__JOIN__ALLOWED_EMAIL_DOMAINS` takes a comma separated list.
    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("join.allowed_email_domains")
    }

    fn load_with_env(
        path: &str,
        environment: config::Environment,
    ) -> error_stack::Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(environment)
            .build()
            .change_context_lazy(|| ConfigError::Read(path.to_string()))?;

        let value = config
            .try_deserialize::<serde_json::Value>()
            .change_context_lazy(|| ConfigError::Read(path.to_string()))?;

        let app_config = Self::from_value(path, value)?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn from_value(path: &str, value: serde_json::Value) -> error_stack::Result<Self, ConfigError> {
        use serde::de::IntoDeserializer;
        let mut track = Track::new();
        let path_de = PathDeserializer::new(value.into_deserializer(), &mut track);
        AppConfig::deserialize(path_de).map_err(|e| {
            let field = track
                .path()
                .iter()
                .map(|seg| match seg {
                    Segment::Seq { index } => format!("[{}]", index),
                    Segment::Map { key } => format!(".{}", key),
                    Segment::Enum { variant } => format!("::{}", variant),
                    Segment::Unknown => String::from("<?>"),
                })
                .collect::<String>();
            report!(ConfigError::Deserialize {
                path: path.to_string(),
                field: field.trim_start_matches('.').to_string(),
            })
            .attach_printable(e.to_string())
            .attach_printable("Make sure all required fields are present in the config file.")
        })
    }

    pub fn validate(&self) -> error_stack::Result<(), ConfigError> {
        if self.server.public_base_url.trim().is_empty() {
            return Err(report!(ConfigError::Invalid(
                "server.public_base_url must not be empty".into()
            )));
        }
        if let Some(ttl) = self.join.link_ttl_secs.filter(|secs| *secs > 0) {
            let fits = chrono::Duration::from_std(Duration::from_secs(ttl))
                .ok()
                .and_then(|ttl| Utc::now().checked_add_signed(ttl))
                .is_some();
            if !fits {
                return Err(report!(ConfigError::Invalid(format!(
                    "join.link_ttl_secs = {ttl} is out of range"
                ))));
            }
        }
        if self.storage.backend == StorageBackend::Postgres && self.storage.url.is_none() {
            return Err(report!(ConfigError::Invalid(
                "storage.url is required for the postgres backend".into()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const MINIMAL: &str = r#"
[server]
public_base_url = "https://guard.example.com"

[accounts]
api_url = "https://accounts.example.com/v0/"

[google]
service_account_file = "service-account.json"

[storage]
backend = "memory"
"#;

    #[test]
    fn test_load_minimal_config_with_defaults() {
        let file = write_config(MINIMAL);
        let config = AppConfig::load(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.server.listen_addr.port(), 8000);
        assert_eq!(
            config.accounts.verify_url(),
            "https://accounts.example.com/v0/users/me"
        );
        assert_eq!(config.accounts.timeout_secs, 30);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.join.default_role, Role::Writer);
        assert_eq!(config.join.link_ttl_secs, None);
        assert!(!config.join.single_use);
        assert!(config.telemetry.otlp_endpoint.is_none());
        assert_eq!(config.telemetry.service_name, "sheets_guard");
    }

    #[test]
    fn test_join_section_is_read() {
        let file = write_config(&format!(
            "{MINIMAL}
[join]
default_role = \"reader\"
link_ttl_secs = 3600
single_use = true
allowed_email_domains = [\"gmail.com\"]
"
        ));
        let config = AppConfig::load(file.path().to_str().unwrap()).unwrap();

        assert_eq!(config.join.default_role, Role::Reader);
        assert_eq!(config.join.link_ttl_secs, Some(3600));
        assert!(config.join.single_use);
        assert_eq!(config.join.allowed_email_domains, vec!["gmail.com"]);
    }

    #[test]
    fn test_missing_field_reports_path() {
        let file = write_config(
            r#"
[server]
public_base_url = "https://guard.example.com"

[accounts]
verify_path = "users/me"

[google]
service_account_file = "service-account.json"

[storage]
backend = "memory"
"#,
        );
        let err = AppConfig::load(file.path().to_str().unwrap()).unwrap_err();
        match err.current_context() {
            ConfigError::Deserialize { field, .. } => assert!(field.starts_with("accounts")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_postgres_requires_url() {
        let file = write_config(&MINIMAL.replace("backend = \"memory\"", "backend = \"postgres\""));
        let err = AppConfig::load(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err.current_context(), ConfigError::Invalid(_)));
    }

    #[test]
    fn test_env_sets_email_domain_list() {
        let file = write_config(MINIMAL);
        let env = AppConfig::environment().source(Some(
            [(
                "GUARD__JOIN__ALLOWED_EMAIL_DOMAINS".to_string(),
                "gmail.com,uni.example".to_string(),
            )]
            .into_iter()
            .collect(),
        ));

        let config = AppConfig::load_with_env(file.path().to_str().unwrap(), env).unwrap();

        assert_eq!(
            config.join.allowed_email_domains,
            vec!["gmail.com", "uni.example"]
        );
    }

    #[test]
    fn test_ttl_out_of_range_is_invalid() {
        let file = write_config(&format!(
            "{MINIMAL}\n[join]\nlink_ttl_secs = 1000000000000000\n"
        ));
        let err = AppConfig::load(file.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err.current_context(), ConfigError::Invalid(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::load("/definitely/not/here/Config").unwrap_err();
        assert!(matches!(err.current_context(), ConfigError::Read(_)));
    }
}
