//! Market API
//!
//! - GET    /api/market/live     - Nasdaq, Dow and gold quotes
//! - GET    /api/market/timer    - US session countdown
//! - POST   /api/market/close    - Capture today's closes (admin)
//! - GET    /api/market/close    - Captured closes, newest first
//! - GET    /api/market/export   - Closes and signals as one JSON document
//! - DELETE /api/market/data     - Clear captured closes (admin)

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::auth::{AdminUser, Authenticated};
use crate::api::ApiResponse;
use crate::error::Result;
use crate::services::{market_clock, scheduler};
use crate::types::{LiveQuote, MarketClose, MarketTimer, SignalRecord};
use crate::AppState;

const DEFAULT_CLOSE_LIMIT: i64 = 30;
const EXPORT_LIMIT: i64 = 10_000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/live", get(live))
        .route("/timer", get(timer))
        .route("/close", get(list_closes).post(capture_close))
        .route("/export", get(export))
        .route("/data", axum::routing::delete(clear_data))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveResponse {
    pub market_open: bool,
    pub quotes: Vec<LiveQuote>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResponse {
    pub captured: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearResponse {
    pub deleted: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub exported_at: i64,
    pub market_closes: Vec<MarketClose>,
    pub signals: Vec<SignalRecord>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CloseQuery {
    pub limit: Option<i64>,
}

/// GET /api/market/live
///
/// Instruments that fail to fetch fall back to their cached quote.
async fn live(State(state): State<AppState>) -> Json<ApiResponse<LiveResponse>> {
    let quotes = state.market.live_quotes().await;

    Json(ApiResponse::new(LiveResponse {
        market_open: market_clock::is_market_open(Utc::now()),
        quotes,
    }))
}

/// GET /api/market/timer
async fn timer() -> Json<ApiResponse<MarketTimer>> {
    Json(ApiResponse::new(market_clock::market_timer(Utc::now())))
}

/// POST /api/market/close
async fn capture_close(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<CaptureResponse>>> {
    let captured = scheduler::capture_market_close(&state, Utc::now()).await?;
    Ok(Json(ApiResponse::new(CaptureResponse { captured })))
}

/// GET /api/market/close
async fn list_closes(
    State(state): State<AppState>,
    _auth: Authenticated,
    Query(query): Query<CloseQuery>,
) -> Result<Json<ApiResponse<Vec<MarketClose>>>> {
    let limit = query.limit.unwrap_or(DEFAULT_CLOSE_LIMIT).clamp(1, EXPORT_LIMIT);
    Ok(Json(ApiResponse::new(state.store.list_market_closes(limit)?)))
}

/// GET /api/market/export
async fn export(
    State(state): State<AppState>,
    _auth: Authenticated,
) -> Result<Json<ApiResponse<ExportResponse>>> {
    Ok(Json(ApiResponse::new(ExportResponse {
        exported_at: Utc::now().timestamp_millis(),
        market_closes: state.store.list_market_closes(EXPORT_LIMIT)?,
        signals: state.store.list_signals(None, EXPORT_LIMIT)?,
    })))
}

/// DELETE /api/market/data
async fn clear_data(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<ClearResponse>>> {
    let deleted = state.store.clear_market_data()?;
    Ok(Json(ApiResponse::new(ClearResponse { deleted })))
}
