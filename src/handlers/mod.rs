use crate::auth::{self, TokenIssuer};
use crate::coingecko::PriceFeed;
use crate::data::DataClient;
use crate::db::DatabasePool;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub mod market;
pub mod portfolio;
pub mod watchlist;

/// Shared state of the public API.
#[derive(Clone)]
pub struct AppState {
    pub users: DatabasePool,
    pub data: DataClient,
    pub market: PriceFeed,
    pub tokens: Arc<TokenIssuer>,
    pub bcrypt_cost: u32,
}

/// All public API routes. Layers (CORS, tracing) are added by the binary.
pub fn router(state: AppState) -> Router {
    Router::new()
        // Auth routes
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/me", get(auth::me))
        // Portfolio routes
        .route("/api/portfolio", get(portfolio::get_portfolio))
        .route("/api/portfolio/summary", get(portfolio::get_summary))
        .route("/api/portfolio/transaction", post(portfolio::add_transaction))
        .route(
            "/api/portfolio/:crypto_id/transactions",
            get(portfolio::get_transactions),
        )
        // Watchlist routes
        .route("/api/watchlist", get(watchlist::get_watchlist))
        .route(
            "/api/watchlist/:crypto_id",
            post(watchlist::add_to_watchlist).delete(watchlist::remove_from_watchlist),
        )
        // Market routes
        .route("/api/market/:crypto_id", get(market::get_market_data))
        .with_state(state)
}
