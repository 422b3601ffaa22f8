use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::models::{
    is_single_crypto_id, normalize_crypto_id, AddTransactionRequest, BalanceChange, Holding,
    PortfolioItem, PortfolioSummary, TradeError, TransactionEntry, TransactionRecorded,
    TransactionSide,
};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use futures_util::future::try_join_all;
use rust_decimal::Decimal;

const VALUE_OUT_OF_RANGE: ApiError = ApiError::OutOfRange("Portfolio value is out of range");

/// Record a BUY or SELL and move the matching holding accordingly.
///
/// The holding is updated first and the ledger entry appended afterwards, as
/// two separate data service calls.
#[axum::debug_handler]
pub async fn add_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<AddTransactionRequest>,
) -> Result<(StatusCode, Json<TransactionRecorded>), ApiError> {
    let side: TransactionSide = req
        .side
        .parse()
        .map_err(|_| ApiError::BadRequest("Type must be BUY or SELL"))?;
    if req.quantity <= Decimal::ZERO {
        return Err(ApiError::BadRequest("Quantity must be positive"));
    }
    if req.price_eur <= Decimal::ZERO {
        return Err(ApiError::BadRequest("Price must be positive"));
    }
    let crypto_id = normalize_crypto_id(&req.crypto_id);
    if !is_single_crypto_id(&crypto_id) {
        return Err(ApiError::BadRequest("CryptoId is required"));
    }

    let existing = state.data.get_holding(user.id, &crypto_id).await?;
    let current = existing.as_ref().map_or(Decimal::ZERO, |h| h.quantity);

    let change = side.apply(current, req.quantity).map_err(|e| match e {
        TradeError::InsufficientQuantity { .. } => {
            ApiError::BadRequest("Insufficient quantity to sell")
        }
        TradeError::Overflow { .. } => ApiError::BadRequest("Quantity is too large"),
    })?;

    let holding_id = match (existing, change) {
        (Some(holding), BalanceChange::Set(quantity)) => {
            state
                .data
                .update_holding_quantity(holding.id, quantity)
                .await?;
            holding.id
        }
        (Some(holding), BalanceChange::Remove) => {
            state.data.delete_holding(holding.id).await?;
            holding.id
        }
        (None, BalanceChange::Set(quantity)) => {
            state
                .data
                .create_holding(user.id, &crypto_id, quantity)
                .await?
        }
        (None, BalanceChange::Remove) => {
            return Err(ApiError::BadRequest("Insufficient quantity to sell"));
        }
    };

    let transaction_id = state
        .data
        .create_transaction(holding_id, side, req.quantity, req.price_eur)
        .await?;

    tracing::info!(
        user_id = %user.id,
        %crypto_id,
        %side,
        quantity = %req.quantity,
        "Transaction recorded"
    );

    Ok((
        StatusCode::OK,
        Json(TransactionRecorded {
            message: "Transaction added successfully".to_string(),
            transaction_id,
        }),
    ))
}

/// Every open holding valued at the current market price.
pub async fn get_portfolio(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<(StatusCode, Json<Vec<PortfolioItem>>), ApiError> {
    let holdings = state.data.list_holdings(user.id).await?;
    let items = value_holdings(&state, holdings).await?;
    Ok((StatusCode::OK, Json(items)))
}

/// Totals over the valued portfolio.
pub async fn get_summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<(StatusCode, Json<PortfolioSummary>), ApiError> {
    let holdings = state.data.list_holdings(user.id).await?;
    let items = value_holdings(&state, holdings).await?;
    Ok((StatusCode::OK, Json(summarize(&items)?)))
}

/// Ledger of one coin, newest first.
pub async fn get_transactions(
    State(state): State<AppState>,
    user: AuthUser,
    Path(crypto_id): Path<String>,
) -> Result<(StatusCode, Json<Vec<TransactionEntry>>), ApiError> {
    let crypto_id = normalize_crypto_id(&crypto_id);
    let holding = state
        .data
        .get_holding(user.id, &crypto_id)
        .await?
        .ok_or(ApiError::NotFound("Portfolio not found for this crypto"))?;

    let ledger = state.data.list_transactions(holding.id).await?;
    Ok((
        StatusCode::OK,
        Json(ledger.into_iter().map(TransactionEntry::from).collect()),
    ))
}

async fn value_holdings(
    state: &AppState,
    holdings: Vec<Holding>,
) -> Result<Vec<PortfolioItem>, ApiError> {
    let holdings: Vec<Holding> = holdings
        .into_iter()
        .filter(|h| h.quantity > Decimal::ZERO)
        .collect();

    let quotes = try_join_all(
        holdings
            .iter()
            .map(|h| state.market.market_data(&h.crypto_id)),
    )
    .await?;

    holdings
        .into_iter()
        .zip(quotes)
        .map(|(holding, quote)| -> Result<PortfolioItem, ApiError> {
            let current_value_eur = holding
                .quantity
                .checked_mul(quote.current_price_eur)
                .ok_or(VALUE_OUT_OF_RANGE)?;
            Ok(PortfolioItem {
                current_value_eur,
                current_price_eur: quote.current_price_eur,
                change_24h: quote.change_24h,
                quantity: holding.quantity,
                crypto_id: holding.crypto_id,
            })
        })
        .collect()
}

/// Sums holding values; the 24h EUR change applies each coin's percentage
/// change to its current value.
fn summarize(items: &[PortfolioItem]) -> Result<PortfolioSummary, ApiError> {
    let mut total = Decimal::ZERO;
    let mut change = Decimal::ZERO;
    for item in items {
        let item_change = item
            .current_value_eur
            .checked_mul(item.change_24h)
            .and_then(|c| c.checked_div(Decimal::ONE_HUNDRED));
        total = total
            .checked_add(item.current_value_eur)
            .ok_or(VALUE_OUT_OF_RANGE)?;
        change = item_change
            .and_then(|c| change.checked_add(c))
            .ok_or(VALUE_OUT_OF_RANGE)?;
    }

    Ok(PortfolioSummary {
        total_value_eur: total.round_dp(2),
        change_24h_eur: change.round_dp(2),
        holdings: items.len(),
    })
}
