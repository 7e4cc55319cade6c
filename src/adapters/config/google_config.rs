#[derive(serde::Deserialize, Debug, Clone)]
pub struct GoogleConfig {
    /// Path to the service account key JSON
    /// (Google Cloud console → IAM → Service accounts → Keys)
    pub service_account_file: Box<str>,
}
