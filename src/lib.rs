// src/lib.rs
pub mod auth;
pub mod coingecko;
pub mod config;
pub mod data;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod soap;

// Re-export commonly used items
pub use db::{DatabasePool, Schema};
pub use error::ApiError;
pub use handlers::{router, AppState};

/// Resolves on Ctrl-C so servers can drain in-flight requests.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
