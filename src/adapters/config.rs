pub mod accounts_config;
pub mod app_config;
pub mod google_config;
pub mod join_config;
pub mod server_config;
pub mod storage_config;
pub mod telemetry_config;
