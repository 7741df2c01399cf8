use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
}

async fn root() -> Json<Value> {
    info!("GET / - Service info");
    Json(json!({
        "message": "Codex Ledger API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "operational",
        "timestamp": Utc::now().to_rfc3339(),
        "endpoints": {
            "health": "/health",
            "portfolios": "/api/portfolios",
            "holdings": "/api/portfolios/{id}/holdings",
            "holding": "/api/portfolios/{id}/holdings/{ticker}",
            "allocation": "/api/portfolios/{id}/allocation",
            "trades": "/api/portfolios/{id}/trades",
            "refresh": "/api/portfolios/{id}/refresh",
            "prices": "/api/prices/{ticker}",
            "market": "/api/market/quote/{symbol}"
        }
    }))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    info!("GET /health - Health check");
    let (status, portfolios, ledger_error) = match state.store.load_async().await {
        Ok(doc) => ("healthy", Some(doc.portfolios.len()), None),
        Err(e) => {
            warn!("Health check could not read ledger: {}", e);
            ("degraded", None, Some(e.to_string()))
        }
    };
    let price_source = match state.price_provider.name() {
        "mock" => "mock_mode",
        other => other,
    };

    Json(json!({
        "status": status,
        "ledger": state.store.path().display().to_string(),
        "portfolios": portfolios,
        "ledger_error": ledger_error,
        "price_source": price_source,
        "cached_quotes": state.quote_cache.len(),
        "timestamp": Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
