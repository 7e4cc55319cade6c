mod service_factory;

use clap::{Parser, Subcommand};
use error_stack::{Report, ResultExt};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace as sdktrace;
use opentelemetry_sdk::Resource;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{Layer, Registry};

use sheets_guard::adapters::config::app_config::{
    AppConfig, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH,
};
use sheets_guard::adapters::config::server_config::LogFormat;
use sheets_guard::adapters::http;
use sheets_guard::prettyprint::PrettyFormatter;

use service_factory::ApplicationServiceFactory;

#[derive(Parser, Debug)]
#[command(name = "sheets-guard", about = "Share Google Spreadsheets through join links", version)]
struct Cli {
    /// Configuration file, with or without extension
    #[arg(short, long, env = CONFIG_PATH_ENV, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, Default)]
enum Command {
    /// Run the HTTP server (default)
    #[default]
    Serve,
    /// Load and validate the configuration, then exit
    CheckConfig,
}

#[derive(Error, Debug)]
enum AppError {
    #[error("Failed to load the configuration")]
    Config,
    #[error("Failed to set up logging")]
    Telemetry,
    #[error("Failed to build the application services")]
    Startup,
    #[error("HTTP server error")]
    Server,
}

type Layers = Vec<Box<dyn Layer<Registry> + Send + Sync>>;

fn setup_tracing(config: &AppConfig) -> error_stack::Result<(), AppError> {
    let mut layers: Layers = Vec::new();

    match config.server.log_format {
        LogFormat::Pretty => layers.push(
            tracing_subscriber::fmt::layer()
                .event_format(PrettyFormatter::new(true))
                .boxed(),
        ),
        LogFormat::Json => layers.push(tracing_subscriber::fmt::layer().json().boxed()),
    }

    if let Some(path) = &config.server.log_file {
        let file = std::fs::File::create(path)
            .change_context(AppError::Telemetry)
            .attach_printable_lazy(|| format!("Failed to create log file '{path}'"))?;
        layers.push(
            tracing_subscriber::fmt::layer()
                .event_format(PrettyFormatter::new(false))
                .with_writer(file)
                .with_ansi(false)
                .boxed(),
        );
    }

    if let Some(endpoint) = &config.telemetry.otlp_endpoint {
        let exporter = opentelemetry_otlp::new_exporter()
            .tonic()
            .with_endpoint(endpoint.clone());
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(exporter)
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", config.telemetry.service_name.clone()),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .change_context(AppError::Telemetry)
            .attach_printable("Failed to install OTLP tracer")?;
        layers.push(OpenTelemetryLayer::new(tracer).boxed());
    }

    let targets = tracing_subscriber::filter::Targets::new()
        .with_target("sheets_guard", tracing::Level::TRACE)
        .with_default(tracing::Level::INFO);

    Registry::default()
        .with(layers.with_filter(targets))
        .try_init()
        .change_context(AppError::Telemetry)?;

    tracing::trace!("Setting panic hook");
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("panic: {info}");
        opentelemetry::global::shutdown_tracer_provider();
    }));

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {err}");
        return;
    }
    tracing::info!("Shutting down");
}

async fn serve(config: &AppConfig) -> error_stack::Result<(), AppError> {
    let state = ApplicationServiceFactory::create(config)
        .await
        .change_context(AppError::Startup)?;

    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .change_context(AppError::Server)
        .attach_printable_lazy(|| format!("Failed to bind {}", config.server.listen_addr))?;
    tracing::info!(
        "Listening on {} (public base url {})",
        config.server.listen_addr,
        config.server.public_base_url
    );

    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .change_context(AppError::Server)
}

fn print_summary(config: &AppConfig) {
    println!("listen address:   {}", config.server.listen_addr);
    println!("public base url:  {}", config.server.public_base_url);
    println!("accounts verify:  {}", config.accounts.verify_url());
    println!("service account:  {}", config.google.service_account_file);
    println!("storage backend:  {:?}", config.storage.backend);
    println!("default role:     {}", config.join.default_role);
    match config.join.link_ttl_secs.filter(|ttl| *ttl > 0) {
        Some(ttl) => println!("link ttl:         {ttl}s"),
        None => println!("link ttl:         never expires"),
    }
    println!("single use links: {}", config.join.single_use);
    if !config.join.allowed_email_domains.is_empty() {
        println!("email domains:    {}", config.join.allowed_email_domains.join(", "));
    }
}

#[tokio::main]
async fn main() -> Result<(), Report<AppError>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config).change_context(AppError::Config)?;

    match cli.command.unwrap_or_default() {
        Command::CheckConfig => {
            print_summary(&config);
            Ok(())
        }
        Command::Serve => {
            setup_tracing(&config)?;
            let result = serve(&config).await;
            if let Err(report) = &result {
                tracing::error!("{report:?}");
            }
            opentelemetry::global::shutdown_tracer_provider();
            result
        }
    }
}
