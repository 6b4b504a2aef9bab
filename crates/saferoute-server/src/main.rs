//! SafeRoute Server - accident risk API and live danger overlay

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use saferoute_overlay::run_refresh_loop;
use saferoute_server::api;
use saferoute_server::config::Config;
use saferoute_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("saferoute_server=debug".parse()?)
                .add_directive("saferoute_overlay=info".parse()?),
        )
        .init();

    tracing::info!("Starting SafeRoute Server...");

    let config = Config::from_env();
    let port = config.server_port;
    let refresh_every = Duration::from_secs(config.risk_refresh_s);
    tracing::info!(
        "City: {}, dataset: {}, routing: {} ({})",
        config.city,
        config.data_path.display(),
        config.osrm_url,
        config.osrm_profile
    );
    let state = Arc::new(AppState::new(config)?);

    // The loop's first refresh runs immediately and loads the dataset.
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let refresh = tokio::spawn(run_refresh_loop(
        state.zones().clone(),
        refresh_every,
        shutdown_tx.subscribe(),
    ));

    let app = api::routes()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    refresh.await?;
    tracing::info!("SafeRoute Server stopped");
    Ok(())
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for ctrl-c: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
    let _ = shutdown_tx.send(());
}
