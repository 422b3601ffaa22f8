use cryptofolio_backend::coingecko::PriceFeed;
use cryptofolio_backend::config::MarketServiceConfig;
use cryptofolio_backend::{logging, shutdown_signal, soap};
use std::time::Duration;
use tower_http::trace::{self, TraceLayer};
use tracing::Level;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    logging::init(logging::level_from_args(&args));

    dotenv::dotenv().ok();
    let config = MarketServiceConfig::from_env()?;

    // Summaries are always fetched fresh.
    let feed = PriceFeed::new(&config.coingecko_url, Duration::ZERO)?;

    let app = soap::router(feed).layer(
        TraceLayer::new_for_http()
            .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
            .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    tracing::info!("SOAP market service listening on: {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
