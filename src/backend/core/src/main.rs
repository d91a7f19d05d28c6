//! AccessGate server entry point.

use std::sync::Arc;

use accessgate_core::{
    access::AccessService,
    api::{self, AppState, ManagementPolicy},
    config::{Config, StoreBackend},
    db::Database,
    store::{AccessStore, MemoryStore},
    telemetry::{self, SensitiveFieldRedactor},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = match std::env::var("ACCESSGATE_CONFIG") {
        Ok(path) => Config::from_file(&path)?,
        Err(_) => Config::load().unwrap_or_else(|e| {
            eprintln!("Warning: Could not load config: {}. Using defaults.", e);
            Config::default()
        }),
    };

    let telemetry = telemetry::init_telemetry(&config.telemetry)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting AccessGate server");

    let store: Arc<dyn AccessStore> = match config.store.backend {
        StoreBackend::Postgres => {
            tracing::info!(
                url = %SensitiveFieldRedactor::global().redact_value(&config.database.url),
                "Connecting to database"
            );
            let db = Database::connect(&config.database).await?;
            if config.database.run_migrations {
                db.migrate().await?;
            }
            Arc::new(db)
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store seeded with default roles; data is lost on exit");
            Arc::new(MemoryStore::seeded())
        }
    };
    store.health_check().await?;

    let service = Arc::new(AccessService::from_config(store, &config));
    if let Err(e) = service.ensure_all_loaded().await {
        tracing::warn!(error = %e, "Initial access data load failed; will retry on demand");
    }

    let state = AppState::new(service)
        .with_metrics(telemetry.prometheus.clone())
        .with_management(ManagementPolicy::from_config(&config.access)?);
    let app = api::build_router(state);

    let addr = config.server.bind_addr();
    tracing::info!(address = %addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    telemetry.shutdown();
    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
