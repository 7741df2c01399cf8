use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::models::Quote;
use crate::services::price_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/quote/:symbol", get(get_quote))
}

pub async fn get_quote(
    Path(symbol): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<Quote>, AppError> {
    info!("GET /market/quote/{} - Fetching quote", symbol);
    let quote = price_service::get_quote(
        state.price_provider.as_ref(),
        &state.quote_cache,
        &state.retry_policy,
        &symbol,
    )
    .await
    .map_err(|e| {
        match &e {
            AppError::RateLimited => warn!("Rate limited when fetching quote for {}", symbol),
            _ => error!("Failed to fetch quote for {}: {}", symbol, e),
        }
        e
    })?;
    Ok(Json(quote))
}
