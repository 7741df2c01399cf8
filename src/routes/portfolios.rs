use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use http::StatusCode;
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::models::{
    Allocation, CreatePortfolio, Holding, Portfolio, RefreshSummary, Trade, TradeOutcome, TradeRecord,
    UpdateHolding, UpdatePortfolio,
};
use crate::services::{portfolio_service, price_service, trade_service};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_portfolio).get(fetch_portfolios))
        .route("/:id", get(get_portfolio).put(update_portfolio).delete(delete_portfolio))
        .route("/:id/holdings", get(list_holdings))
        .route("/:id/holdings/:ticker", put(update_holding).delete(remove_holding))
        .route("/:id/allocation", get(get_allocation))
        .route("/:id/trades", post(execute_trade).get(list_trades))
        .route("/:id/refresh", post(refresh_prices))
}

pub async fn create_portfolio(
    State(state): State<AppState>,
    Json(data): Json<CreatePortfolio>,
) -> Result<(StatusCode, Json<Portfolio>), AppError> {
    info!("POST /portfolios - Creating new portfolio");
    let portfolio = state
        .store
        .update_async(move |doc| portfolio_service::create(doc, data))
        .await
        .map_err(|e| {
            error!("Failed to create portfolio: {}", e);
            e
        })?;
    Ok((StatusCode::CREATED, Json(portfolio)))
}

pub async fn fetch_portfolios(State(state): State<AppState>) -> Result<Json<Vec<Portfolio>>, AppError> {
    info!("GET /portfolios - Fetching all portfolios");
    let doc = state.store.load_async().await.map_err(|e| {
        error!("Failed to load ledger: {}", e);
        e
    })?;
    Ok(Json(portfolio_service::fetch_all(&doc)))
}

pub async fn get_portfolio(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Portfolio>, AppError> {
    info!("GET /portfolios/{} - Fetching portfolio", id);
    let doc = state.store.load_async().await?;
    let portfolio = portfolio_service::fetch_one(&doc, &id).map_err(|e| {
        error!("Failed to fetch portfolio {}: {}", id, e);
        e
    })?;
    Ok(Json(portfolio))
}

pub async fn update_portfolio(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(data): Json<UpdatePortfolio>,
) -> Result<Json<Portfolio>, AppError> {
    info!("PUT /portfolios/{} - Updating portfolio", id);
    let portfolio = state
        .store
        .update_async({
            let id = id.clone();
            move |doc| portfolio_service::update(doc, &id, data)
        })
        .await
        .map_err(|e| {
            error!("Failed to update portfolio {}: {}", id, e);
            e
        })?;
    Ok(Json(portfolio))
}

pub async fn delete_portfolio(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    info!("DELETE /portfolios/{} - Deleting portfolio", id);
    state
        .store
        .update_async({
            let id = id.clone();
            move |doc| portfolio_service::delete(doc, &id)
        })
        .await
        .map_err(|e| {
            error!("Failed to delete portfolio {}: {}", id, e);
            e
        })?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_holdings(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Holding>>, AppError> {
    info!("GET /portfolios/{}/holdings - Listing holdings", id);
    let doc = state.store.load_async().await?;
    Ok(Json(doc.portfolio(&id)?.holdings_by_value()))
}

pub async fn update_holding(
    State(state): State<AppState>,
    Path((id, ticker)): Path<(String, String)>,
    Json(data): Json<UpdateHolding>,
) -> Result<Json<Holding>, AppError> {
    info!("PUT /portfolios/{}/holdings/{} - Adjusting holding", id, ticker);
    let holding = state
        .store
        .update_async({
            let (id, ticker) = (id.clone(), ticker.clone());
            move |doc| portfolio_service::update_holding(doc, &id, &ticker, data)
        })
        .await
        .map_err(|e| {
            match &e {
                AppError::Validation(_) | AppError::NotFound(_) => warn!("Rejected edit of {} in {}: {}", ticker, id, e),
                _ => error!("Failed to update holding {} in {}: {}", ticker, id, e),
            }
            e
        })?;
    Ok(Json(holding))
}

pub async fn remove_holding(
    State(state): State<AppState>,
    Path((id, ticker)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    info!("DELETE /portfolios/{}/holdings/{} - Removing holding", id, ticker);
    state
        .store
        .update_async({
            let (id, ticker) = (id.clone(), ticker.clone());
            move |doc| portfolio_service::remove_holding(doc, &id, &ticker)
        })
        .await
        .map_err(|e| {
            error!("Failed to remove holding {} from {}: {}", ticker, id, e);
            e
        })?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_allocation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Allocation>, AppError> {
    info!("GET /portfolios/{}/allocation - Sector allocation", id);
    let doc = state.store.load_async().await?;
    Ok(Json(doc.portfolio(&id)?.allocation()))
}

pub async fn execute_trade(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(trade): Json<Trade>,
) -> Result<(StatusCode, Json<TradeOutcome>), AppError> {
    info!("POST /portfolios/{}/trades - {} {} {}", id, trade.action, trade.shares, trade.ticker);
    let outcome = state
        .store
        .update_async({
            let id = id.clone();
            move |doc| trade_service::execute_trade(doc, &id, trade)
        })
        .await
        .map_err(|e| {
            match &e {
                AppError::Validation(_) | AppError::NotFound(_) => warn!("Rejected trade for {}: {}", id, e),
                _ => error!("Failed to execute trade for {}: {}", id, e),
            }
            e
        })?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn list_trades(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TradeRecord>>, AppError> {
    info!("GET /portfolios/{}/trades - Trade history", id);
    let doc = state.store.load_async().await?;
    Ok(Json(doc.portfolio(&id)?.trades.clone()))
}

pub async fn refresh_prices(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RefreshSummary>, AppError> {
    info!("POST /portfolios/{}/refresh - Refreshing prices", id);
    let summary = price_service::refresh_prices(
        &state.store,
        state.price_provider.as_ref(),
        &state.retry_policy,
        Some(&id),
    )
    .await
    .map_err(|e| {
        error!("Failed to refresh prices for {}: {}", id, e);
        e
    })?;
    Ok(Json(summary))
}
