use cryptofolio_backend::config::{DataServiceConfig, DEFAULT_DATA_API_KEY};
use cryptofolio_backend::data::{router, DataState};
use cryptofolio_backend::db::{DatabasePool, Schema};
use cryptofolio_backend::{logging, shutdown_signal};
use tower_http::trace::{self, TraceLayer};
use tracing::Level;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    logging::init(logging::level_from_args(&args));

    dotenv::dotenv().ok();
    let config = DataServiceConfig::from_env()?;

    if config.api_key == DEFAULT_DATA_API_KEY {
        tracing::warn!("DATA_API_KEY is not set, using the insecure default key");
    }

    let pool = DatabasePool::open(&config.database_path, Schema::Portfolio)?;

    let app = router(DataState::new(pool, &config.api_key)).layer(
        TraceLayer::new_for_http()
            .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
            .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    tracing::info!("Data service listening on: {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
