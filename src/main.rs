//! Hastebin Server
//!
//! A self-hosted paste server with pluggable storage backends.

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hastebin_server::config::Config;
use hastebin_server::notify::Notifier;
use hastebin_server::routes;
use hastebin_server::state::AppState;
use hastebin_server::storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "hastebin_server=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    tracing::info!("Starting Hastebin Server v{}", env!("CARGO_PKG_VERSION"));

    // A store that cannot be reached at startup is fatal
    let store = storage::build_store(&config.storage)
        .await
        .context("Failed to initialize document store")?;

    let notifier = Notifier::new(config.notifications.webhook_url.clone());
    let host = config.server.host.clone();
    let port = config.server.port;

    let app_state = AppState::new(config, store, notifier.clone());

    let loaded = app_state.documents().load_static_documents().await;
    tracing::info!("Loaded {} static documents", loaded);

    let app = routes::app(app_state);

    let listener = tokio::net::TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;

    let message = format!("Server listening on {}:{}", host, port);
    tracing::info!("{}", message);
    notifier.notify_in_background(message);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
