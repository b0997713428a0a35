use std::{process, sync::Arc};

use config::AppConfig;
use storage::{LocalFileStorage, Storage};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod errors;
mod handlers;
mod names;
mod resize;
mod sniff;
mod storage;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().unwrap_or_else(|err| {
        tracing::error!("Invalid configuration: {err}");
        process::exit(1);
    });

    let storage = match LocalFileStorage::new(config.upload_directory.clone()) {
        Ok(storage) => storage,
        Err(err) => {
            tracing::error!(
                "Failed to create upload directory {}: {err}",
                config.upload_directory.display()
            );
            process::exit(1);
        }
    };

    let upload_directory = storage.path().display().to_string();
    let storage: Arc<dyn Storage> = Arc::new(storage);
    let app = handlers::router(storage);

    let addr = config.socket_addr().unwrap_or_else(|err| {
        tracing::error!("Invalid listen address: {err}");
        process::exit(1);
    });

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("Failed to bind {addr}: {err}");
            process::exit(1);
        }
    };

    tracing::info!("Server running on {addr}, storing uploads in {upload_directory}");

    if let Err(err) = axum::serve(listener, app).await {
        tracing::error!("Server error: {err}");
        process::exit(1);
    }
}
