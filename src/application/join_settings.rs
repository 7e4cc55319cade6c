use std::time::Duration;

use crate::adapters::config::app_config::AppConfig;
use crate::domain::Role;

/// Runtime policy for join links, derived once from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct JoinSettings {
    pub public_base_url: String,
    pub default_role: Role,
    pub link_ttl: Option<Duration>,
    pub single_use: bool,
    pub allowed_email_domains: Vec<String>,
}

impl JoinSettings {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            public_base_url: public_base_url.into(),
            default_role: Role::default(),
            link_ttl: None,
            single_use: false,
            allowed_email_domains: Vec::new(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            public_base_url: config.server.public_base_url.clone(),
            default_role: config.join.default_role,
            link_ttl: config
                .join
                .link_ttl_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            single_use: config.join.single_use,
            allowed_email_domains: config.join.allowed_email_domains.clone(),
        }
    }
}
