use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::AppState;
use crate::models::{is_single_crypto_id, normalize_crypto_id, WatchlistItem};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use futures_util::future::try_join_all;

/// Watched coins with their current market numbers.
pub async fn get_watchlist(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<(StatusCode, Json<Vec<WatchlistItem>>), ApiError> {
    let crypto_ids = state.data.list_watchlist(user.id).await?;

    let quotes = try_join_all(crypto_ids.iter().map(|id| state.market.market_data(id))).await?;

    let items = crypto_ids
        .into_iter()
        .zip(quotes)
        .map(|(crypto_id, quote)| WatchlistItem {
            crypto_id,
            current_price_eur: quote.current_price_eur,
            change_1h: quote.change_1h,
            change_24h: quote.change_24h,
        })
        .collect();

    Ok((StatusCode::OK, Json(items)))
}

pub async fn add_to_watchlist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(crypto_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let crypto_id = normalize_crypto_id(&crypto_id);
    if !is_single_crypto_id(&crypto_id) {
        return Err(ApiError::BadRequest("CryptoId is required"));
    }

    state.data.add_to_watchlist(user.id, &crypto_id).await?;
    Ok(StatusCode::OK)
}

pub async fn remove_from_watchlist(
    State(state): State<AppState>,
    user: AuthUser,
    Path(crypto_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let crypto_id = normalize_crypto_id(&crypto_id);
    if !is_single_crypto_id(&crypto_id) {
        return Err(ApiError::BadRequest("CryptoId is required"));
    }

    state.data.remove_from_watchlist(user.id, &crypto_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
