use crate::error::ApiError;
use crate::handlers::AppState;
use crate::models::{is_single_crypto_id, normalize_crypto_id, CryptoMarketData};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

/// Live EUR quote for one coin. Open to anonymous callers.
pub async fn get_market_data(
    State(state): State<AppState>,
    Path(crypto_id): Path<String>,
) -> Result<(StatusCode, Json<CryptoMarketData>), ApiError> {
    let crypto_id = normalize_crypto_id(&crypto_id);
    if !is_single_crypto_id(&crypto_id) {
        return Err(ApiError::BadRequest("CryptoId is required"));
    }

    let data = state.market.market_data(&crypto_id).await?;
    Ok((StatusCode::OK, Json(data)))
}
