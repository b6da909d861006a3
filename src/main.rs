use axum::{Router, routing::get};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use mtconnect_agent::adapter::{run_adapter, TcpLineSource};
use mtconnect_agent::config::AgentConfig;
use mtconnect_agent::handlers;
use mtconnect_agent::models::device::DeviceSchema;
use mtconnect_agent::registry::SchemaRegistry;
use mtconnect_agent::store::{self, Store};
use mtconnect_agent::AppState;

/// Starts the agent on a configured port, reads device list and adapter
/// connection info from a config file (`spec.md` §6).
#[derive(Parser, Debug)]
#[command(name = "mtconnect-agent")]
struct Cli {
    /// Path to the agent's TOML config file.
    #[arg(long, default_value = "agent.toml")]
    config: String,

    /// Overrides `server.port` from the config file.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mtconnect_agent=debug,tower_http=debug")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AgentConfig::load(&cli.config)?;
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let mut registry = SchemaRegistry::new();
    for device in &config.devices {
        let contents = std::fs::read_to_string(&device.schema_path).map_err(|e| {
            anyhow::anyhow!("failed to read device schema {}: {e}", device.schema_path)
        })?;
        let schema: DeviceSchema = serde_json::from_str(&contents).map_err(|e| {
            anyhow::anyhow!("failed to parse device schema {}: {e}", device.schema_path)
        })?;
        registry.insert_schema(schema);
        tracing::info!(uuid = %device.uuid, name = %device.name, "device schema loaded");
    }
    let registry = Arc::new(registry);

    let store = Arc::new(Mutex::new(Store::new(
        config.storage.history_capacity,
        config.storage.asset_capacity,
    )));
    let sequencer = store::sequencer::spawn(store.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    for device in &config.devices {
        let source = TcpLineSource::new(device.adapter.host.clone(), device.adapter.port);
        tokio::spawn(run_adapter(
            device.uuid.clone(),
            source,
            sequencer.clone(),
            registry.clone(),
            shutdown_rx.clone(),
        ));
    }

    let state = AppState {
        registry,
        store,
        agent_name: "mtconnect-agent".to_string(),
    };

    let app = Router::new()
        .route("/probe", get(handlers::probe::probe))
        .route("/current", get(handlers::current::current))
        .route("/sample", get(handlers::sample::sample))
        .route("/assets", get(handlers::assets::assets))
        .route("/healthz", get(handlers::health::healthz))
        .fallback(handlers::unsupported)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("mtconnect-agent listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(mtconnect_agent::error::AgentError::PortBind)?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received, draining adapters");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}
