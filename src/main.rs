use std::sync::Arc;

use chrono::Duration;
use dotenvy::dotenv;
use envconfig::Envconfig;

use meditrack::{
    auth::session::SessionStore,
    config::{Config, Settings},
    db::{apply_schema, init_db},
    handlers,
    services::{schedule_inventory_alerts, uploads::ensure_upload_dirs},
    state::AppState,
    storage::{seed::seed_defaults, MemStorage, PgStorage, Storage},
};

type Error = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Initialize the logger with "info" unless RUST_LOG says otherwise
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    log::info!("Starting MediTrack...");

    dotenv().ok();
    let config = Config::init_from_env()?;

    let storage: Arc<dyn Storage> = match config.database_url.as_deref() {
        Some(url) => {
            let pool = init_db(url).await?;
            apply_schema(&pool).await?;
            log::info!("Using PostgreSQL storage");
            Arc::new(PgStorage::new(pool))
        }
        None => {
            log::warn!("DATABASE_URL not set; using in-memory storage");
            let storage = MemStorage::new();
            seed_defaults(&storage, &config.admin_password).await?;
            Arc::new(storage)
        }
    };

    ensure_upload_dirs(&config.upload_dir).await?;

    let sessions = SessionStore::new(Duration::seconds(config.session_ttl_secs));

    if let Err(e) = schedule_inventory_alerts(
        storage.clone(),
        sessions.clone(),
        &config.alert_schedule,
        config.expiry_alert_days,
    )
    .await
    {
        log::error!("Inventory alerts disabled: {}", e);
    }

    let state = AppState::new(storage, sessions, Settings::from(&config));
    let app = handlers::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    log::info!("Listening on {}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    log::info!("Shutting down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {}", e);
    }
}
