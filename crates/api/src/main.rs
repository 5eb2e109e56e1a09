//! API server entry point.

use std::sync::Arc;

use api::config::{Config, LogFormat};
use api::delivery::LogDeliveryChannel;
use api::state::AppState;
use common::Role;
use domain::notification::{InMemoryDirectory, OutboundDispatcher};
use event_store::{EventStore, InMemoryEventStore, PostgresEventStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn open_store(config: &Config) -> Arc<dyn EventStore> {
    match &config.database_url {
        Some(url) => {
            let store = PostgresEventStore::connect(url)
                .await
                .expect("failed to connect to Postgres");
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            tracing::info!("using Postgres event store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, events are kept in memory only");
            Arc::new(InMemoryEventStore::new())
        }
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env().expect("invalid configuration");
    init_tracing(&config);

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let store = open_store(&config).await;
    let directory = InMemoryDirectory::new()
        .with_members(Role::Operation, config.operation_members.iter().copied())
        .with_members(Role::Admin, config.admin_members.iter().copied());
    let outbound = OutboundDispatcher::new(Arc::new(LogDeliveryChannel), Arc::new(directory));
    let state = Arc::new(AppState::new(store, outbound, config.max_commit_attempts));

    // Replay existing events into the read models.
    let replayed = state
        .processor
        .run_catch_up()
        .await
        .expect("catch-up failed");
    tracing::info!(events = replayed, "read models ready");

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
