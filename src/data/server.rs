use super::xml::{
    CreateHoldingXml, CreateTransactionXml, CryptoIdListXml, DecimalXml, GuidXml, HoldingListXml,
    HoldingXml, TransactionListXml, TransactionXml, WatchlistXml, Xml,
};
use crate::db::{is_constraint_violation, DatabasePool};
use crate::models::{Holding, Transaction, TransactionSide};
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Header carrying the shared key; header names are matched case-insensitively.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct DataState {
    pub pool: DatabasePool,
    pub api_key: Arc<str>,
}

impl DataState {
    pub fn new(pool: DatabasePool, api_key: &str) -> Self {
        DataState {
            pool,
            api_key: Arc::from(api_key),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("{0}")]
    BadRequest(&'static str),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(&'static str),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl IntoResponse for DataError {
    fn into_response(self) -> Response {
        match self {
            DataError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            DataError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            DataError::Conflict(msg) => (StatusCode::CONFLICT, msg).into_response(),
            DataError::Database(e) => {
                tracing::error!("Data service database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
        }
    }
}

/// Routes of the data service. Everything under `/data` requires the API key;
/// `/health` stays open for probes.
pub fn router(state: DataState) -> Router {
    Router::new()
        .route("/data/portfolio", post(create_holding))
        .route(
            "/data/portfolio/:id",
            get(list_holdings).put(update_holding).delete(delete_holding),
        )
        .route("/data/portfolio/:id/:crypto_id", get(get_holding))
        .route(
            "/data/watchlist",
            post(add_to_watchlist).delete(remove_from_watchlist),
        )
        .route("/data/watchlist/:user_id", get(list_watchlist))
        .route("/data/transaction", post(create_transaction))
        .route("/data/transaction/:portfolio_id", get(list_transactions))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key))
        .route("/health", get(health))
        .with_state(state)
}

async fn require_api_key(State(state): State<DataState>, req: Request, next: Next) -> Response {
    match req.headers().get(API_KEY_HEADER) {
        None => (
            StatusCode::UNAUTHORIZED,
            "API key not provided. Use the 'X-Api-Key' header",
        )
            .into_response(),
        Some(key) if key.as_bytes() != state.api_key.as_bytes() => {
            tracing::warn!(path = %req.uri().path(), "Rejected request with invalid API key");
            (StatusCode::FORBIDDEN, "Invalid API key").into_response()
        }
        Some(_) => next.run(req).await,
    }
}

async fn health() -> &'static str {
    "ok"
}

// ============ HOLDINGS ============

async fn list_holdings(
    State(state): State<DataState>,
    Path(user_id): Path<Uuid>,
) -> Result<Xml<HoldingListXml>, DataError> {
    let holdings = state.pool.list_holdings(user_id).await?;
    Ok(Xml(HoldingListXml {
        items: holdings.into_iter().map(HoldingXml::from).collect(),
    }))
}

async fn get_holding(
    State(state): State<DataState>,
    Path((user_id, crypto_id)): Path<(Uuid, String)>,
) -> Result<Xml<HoldingXml>, DataError> {
    state
        .pool
        .get_holding(user_id, &crypto_id)
        .await?
        .map(|h| Xml(HoldingXml::from(h)))
        .ok_or(DataError::NotFound("Holding not found"))
}

async fn create_holding(
    State(state): State<DataState>,
    Xml(req): Xml<CreateHoldingXml>,
) -> Result<Xml<GuidXml>, DataError> {
    if req.user_id.is_nil() {
        return Err(DataError::BadRequest("UserId is invalid"));
    }
    if req.crypto_id.trim().is_empty() {
        return Err(DataError::BadRequest("CryptoId is required"));
    }
    if req.quantity < Decimal::ZERO {
        return Err(DataError::BadRequest("Quantity cannot be negative"));
    }

    let holding = Holding {
        id: Uuid::new_v4(),
        user_id: req.user_id,
        crypto_id: req.crypto_id,
        quantity: req.quantity,
    };

    match state.pool.create_holding(&holding).await {
        Ok(()) => {}
        Err(e) if is_constraint_violation(&e) => {
            return Err(DataError::Conflict("Holding already exists for this crypto"));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::debug!(holding_id = %holding.id, crypto_id = %holding.crypto_id, "Holding created");
    Ok(Xml(GuidXml { value: holding.id }))
}

async fn update_holding(
    State(state): State<DataState>,
    Path(holding_id): Path<Uuid>,
    Xml(quantity): Xml<DecimalXml>,
) -> Result<StatusCode, DataError> {
    if holding_id.is_nil() {
        return Err(DataError::BadRequest("PortfolioId is invalid"));
    }
    if quantity.value < Decimal::ZERO {
        return Err(DataError::BadRequest("Quantity cannot be negative"));
    }

    match state
        .pool
        .update_holding_quantity(holding_id, quantity.value)
        .await?
    {
        0 => Err(DataError::NotFound("Holding not found")),
        _ => Ok(StatusCode::OK),
    }
}

async fn delete_holding(
    State(state): State<DataState>,
    Path(holding_id): Path<Uuid>,
) -> Result<StatusCode, DataError> {
    state.pool.delete_holding(holding_id).await?;
    Ok(StatusCode::OK)
}

// ============ WATCHLIST ============

fn validate_watch(req: &WatchlistXml) -> Result<(), DataError> {
    if req.user_id.is_nil() {
        return Err(DataError::BadRequest("UserId is invalid"));
    }
    if req.crypto_id.trim().is_empty() {
        return Err(DataError::BadRequest("CryptoId is required"));
    }
    Ok(())
}

async fn list_watchlist(
    State(state): State<DataState>,
    Path(user_id): Path<Uuid>,
) -> Result<Xml<CryptoIdListXml>, DataError> {
    let items = state.pool.list_watchlist(user_id).await?;
    Ok(Xml(CryptoIdListXml { items }))
}

async fn add_to_watchlist(
    State(state): State<DataState>,
    Xml(req): Xml<WatchlistXml>,
) -> Result<StatusCode, DataError> {
    validate_watch(&req)?;
    state.pool.add_to_watchlist(req.user_id, &req.crypto_id).await?;
    Ok(StatusCode::OK)
}

async fn remove_from_watchlist(
    State(state): State<DataState>,
    Xml(req): Xml<WatchlistXml>,
) -> Result<StatusCode, DataError> {
    validate_watch(&req)?;
    state
        .pool
        .remove_from_watchlist(req.user_id, &req.crypto_id)
        .await?;
    Ok(StatusCode::OK)
}

// ============ TRANSACTIONS ============

async fn create_transaction(
    State(state): State<DataState>,
    Xml(req): Xml<CreateTransactionXml>,
) -> Result<Xml<GuidXml>, DataError> {
    if req.portfolio_id.is_nil() {
        return Err(DataError::BadRequest("PortfolioId is invalid"));
    }
    if req.side.trim().is_empty() {
        return Err(DataError::BadRequest("Type is required"));
    }
    let side: TransactionSide = req
        .side
        .parse()
        .map_err(|_| DataError::BadRequest("Type must be BUY or SELL"))?;
    if req.quantity <= Decimal::ZERO {
        return Err(DataError::BadRequest("Quantity must be greater than zero"));
    }
    if req.price_eur <= Decimal::ZERO {
        return Err(DataError::BadRequest("PriceEur must be greater than zero"));
    }

    let tx = Transaction {
        id: Uuid::new_v4(),
        holding_id: req.portfolio_id,
        side,
        quantity: req.quantity,
        price_eur: req.price_eur,
        created_at: Utc::now(),
    };
    state.pool.insert_transaction(&tx).await?;

    Ok(Xml(GuidXml { value: tx.id }))
}

async fn list_transactions(
    State(state): State<DataState>,
    Path(holding_id): Path<Uuid>,
) -> Result<Xml<TransactionListXml>, DataError> {
    let ledger = state.pool.list_transactions(holding_id).await?;
    Ok(Xml(TransactionListXml {
        items: ledger.into_iter().map(TransactionXml::from).collect(),
    }))
}
