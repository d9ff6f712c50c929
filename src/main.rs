use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use vdd_core::config::{data_dir_from_env_value, oracle_config_from_env_values, scope_from_env_value};
use vdd_core::constants::GATEWAY_API_KEY_VAR;
use vdd_core::{CoreConfig, FileProfileStore, GatewayOracle};

/// Main entry point for the VDD server
///
/// Resolves configuration once from the environment, then serves the REST API (analyze,
/// profiles, history, Swagger UI).
///
/// # Environment Variables
/// - `VDD_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `VDD_DATA_DIR`: Directory for profile and history storage (default: "vdd_data")
/// - `AI_GATEWAY_API_KEY`: Bearer credential for the AI gateway (required)
/// - `AI_GATEWAY_URL`: Chat-completions endpoint (optional)
/// - `AI_GATEWAY_MODEL`: Model name (optional)
/// - `VDD_SCOPE_FILE`: YAML file overriding the per-body-part nutrients (optional)
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the gateway credential is missing or any configuration value is invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vdd_run=info".parse()?)
                .add_directive("vdd_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("VDD_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let api_key = std::env::var(GATEWAY_API_KEY_VAR)
        .ok()
        .filter(|k| !k.trim().is_empty());
    if api_key.is_none() {
        anyhow::bail!("{} is not set", GATEWAY_API_KEY_VAR);
    }

    let cfg = CoreConfig::new(
        data_dir_from_env_value(std::env::var("VDD_DATA_DIR").ok()),
        oracle_config_from_env_values(
            std::env::var("AI_GATEWAY_URL").ok(),
            std::env::var("AI_GATEWAY_MODEL").ok(),
            api_key,
        )?,
        scope_from_env_value(std::env::var("VDD_SCOPE_FILE").ok())?,
    );

    tracing::info!(
        data_dir = %cfg.data_dir().display(),
        gateway = %cfg.oracle().endpoint(),
        model = cfg.oracle().model(),
        "configuration resolved"
    );

    std::fs::create_dir_all(cfg.data_dir())?;

    let oracle = Arc::new(GatewayOracle::new(cfg.oracle().clone(), cfg.scope().clone()));
    let store = Arc::new(FileProfileStore::new(cfg.data_dir()));
    let app = api_rest::router(AppState::new(oracle, store));

    tracing::info!("++ Starting VDD REST on {}", rest_addr);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
