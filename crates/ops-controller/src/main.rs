//! Operations Controller
//!
//! Multi-tenant session relay for real-time peer-to-peer audio operations.
//!
//! # Startup Flow
//!
//! 1. Load configuration from environment
//! 2. Open the tenant store (Postgres when `DATABASE_URL` is set, otherwise
//!    in-memory)
//! 3. Spawn the coordinator actor
//! 4. Serve the WebSocket and health endpoints on one listener
//! 5. Wait for ctrl-c, then cancel the coordinator and drain

#![warn(clippy::pedantic)]

use std::sync::Arc;

use axum::Router;
use common::secret::ExposeSecret;
use ops_controller::actors::{CoordinatorActor, CoordinatorSettings};
use ops_controller::config::Config;
use ops_controller::observability::{health_router, HealthState};
use ops_controller::server::{build_router, AppState};
use ops_controller::store::{MemoryStore, PgStore, TenantStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ops_controller=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Operations Controller");

    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        bcrypt_cost = config.bcrypt_cost,
        default_channels = ?config.default_channels,
        store = if config.database_url.is_some() { "postgres" } else { "memory" },
        "Configuration loaded successfully"
    );

    let store: Arc<dyn TenantStore> = match &config.database_url {
        Some(url) => {
            info!("Connecting to Postgres...");
            let store = PgStore::connect(url.expose_secret()).await.map_err(|e| {
                error!(error = %e, "Failed to connect to the tenant store");
                e
            })?;
            info!("Tenant store connection established");
            Arc::new(store)
        }
        None => {
            info!("No DATABASE_URL set, using the in-memory tenant store");
            Arc::new(MemoryStore::new())
        }
    };

    let health_state = Arc::new(HealthState::new());
    let cancel_token = CancellationToken::new();

    let (coordinator, coordinator_task) = CoordinatorActor::spawn(
        store,
        CoordinatorSettings::from(&config),
        cancel_token.clone(),
    );

    let app = Router::new()
        .merge(build_router(AppState {
            coordinator: coordinator.clone(),
            outbound_buffer: config.outbound_buffer,
        }))
        .merge(health_router(health_state.clone()))
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(bind_address = %config.bind_address, "Listening");
    health_state.set_ready();

    axum::serve(listener, app)
        .with_graceful_shutdown({
            let health_state = Arc::clone(&health_state);
            let cancel_token = cancel_token.clone();
            async move {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutdown signal received");
                health_state.set_not_ready();
                cancel_token.cancel();
            }
        })
        .await?;

    coordinator.cancel();
    let _ = coordinator_task.await;

    info!("Operations Controller stopped");
    Ok(())
}
