#[derive(serde::Deserialize, Debug, Clone)]
pub struct AccountsConfig {
    pub api_url: String,
    #[serde(default = "default_verify_path")]
    pub verify_path: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_verify_path() -> String {
    "users/me".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl AccountsConfig {
    pub fn verify_url(&self) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            self.verify_path.trim_start_matches('/')
        )
    }
}
