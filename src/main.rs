use cryptofolio_backend::auth::TokenIssuer;
use cryptofolio_backend::coingecko::PriceFeed;
use cryptofolio_backend::config::{ApiConfig, DEFAULT_DATA_API_KEY};
use cryptofolio_backend::data::DataClient;
use cryptofolio_backend::db::{DatabasePool, Schema};
use cryptofolio_backend::handlers::{router, AppState};
use cryptofolio_backend::{logging, shutdown_signal};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::{self, TraceLayer};
use tracing::Level;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set the log level based on the first argument
    let args: Vec<String> = std::env::args().collect();
    logging::init(logging::level_from_args(&args));

    // Initalize dotenv so we can read .env file
    dotenv::dotenv().ok();
    let config = ApiConfig::from_env()?;

    if config.data_api_key == DEFAULT_DATA_API_KEY {
        tracing::warn!("DATA_API_KEY is not set, using the insecure default key");
    }

    // Initialize the users database
    let users = DatabasePool::open(&config.database_path, Schema::Accounts)?;

    let state = AppState {
        users,
        data: DataClient::new(&config.data_service_url, &config.data_api_key)?,
        market: PriceFeed::new(&config.coingecko_url, config.market_cache_ttl)?,
        tokens: Arc::new(TokenIssuer::new(&config.jwt)),
        bcrypt_cost: config.bcrypt_cost,
    };

    // Build application with routes, CORS and tracing layers
    let app = router(state).layer(CorsLayer::permissive()).layer(
        TraceLayer::new_for_http()
            .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
            .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
    );

    // Run server
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    tracing::info!("Listening on: {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
