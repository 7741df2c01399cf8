use axum::extract::{Path, State};
use axum::routing::put;
use axum::{Json, Router};
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::models::{MarketData, PriceUpdate};
use crate::services::price_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/:ticker", put(update_price))
}

pub async fn update_price(
    Path(ticker): Path<String>,
    State(state): State<AppState>,
    Json(data): Json<MarketData>,
) -> Result<Json<PriceUpdate>, AppError> {
    info!("PUT /prices/{} - Updating price to {}", ticker, data.price);
    let update = state
        .store
        .update_async({
            let ticker = ticker.clone();
            move |doc| price_service::update_stock_price(doc, &ticker, data)
        })
        .await
        .map_err(|e| {
            match &e {
                AppError::NotFound(_) => warn!("No holdings of {} to update", ticker),
                _ => error!("Failed to update price for {}: {}", ticker, e),
            }
            e
        })?;
    Ok(Json(update))
}
