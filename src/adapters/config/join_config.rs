use crate::domain::Role;

#[derive(serde::Deserialize, Debug, Clone, Default)]
pub struct JoinConfig {
    #[serde(default)]
    pub default_role: Role,
    /// Links never expire when unset or zero.
    pub link_ttl_secs: Option<u64>,
    #[serde(default)]
    pub single_use: bool,
    #[serde(default)]
    pub allowed_email_domains: Vec<String>,
}
