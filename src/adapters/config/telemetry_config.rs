#[derive(serde::Deserialize, Debug, Clone)]
pub struct TelemetryConfig {
    /// OTLP/gRPC collector, e.g. `http://localhost:4317`. Tracing export is off when unset.
    pub otlp_endpoint: Option<String>,
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

fn default_service_name() -> String {
    "sheets_guard".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: default_service_name(),
        }
    }
}
