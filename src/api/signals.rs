//! Signals API
//!
//! - POST   /api/signals/generate       - Run the pipeline (admin)
//! - POST   /api/signals/calculate      - Signal and trade plan from manual values
//! - POST   /api/signals/preview        - Render Discord and WhatsApp messages
//! - GET    /api/signals                - Stored signals, newest first
//! - GET    /api/signals/performance    - Outcome summary
//! - GET    /api/signals/:id            - One stored signal
//! - DELETE /api/signals/:id            - Remove a signal (admin)
//! - PUT    /api/signals/:id/outcome    - Record win/loss and learn (admin)

use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::api::auth::{AdminUser, Authenticated};
use crate::api::{ApiResponse, SuccessResponse};
use crate::config::parse_symbols;
use crate::error::{AppError, Result};
use crate::services::{formatter, pipeline, strategy};
use crate::sources::marketwatch::IndexSnapshot;
use crate::types::{
    FormatOptions, GenerationReport, OhlcBar, OutcomeRequest, PerformanceSummary, Signal,
    SignalRecord, TradePlan,
};
use crate::AppState;

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 500;
const DEFAULT_PERFORMANCE_DAYS: i64 = 30;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_signals))
        .route("/generate", post(generate))
        .route("/calculate", post(calculate))
        .route("/preview", post(preview))
        .route("/performance", get(performance))
        .route("/:id", get(get_signal).delete(delete_signal))
        .route("/:id/outcome", put(record_outcome))
}

// =============================================================================
// Request / response types
// =============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct GenerateQuery {
    /// Comma-separated symbols; the configured list when absent.
    pub symbols: Option<String>,
}

/// Manual calculation input: explicit bars, or the four index values.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateRequest {
    pub symbol: String,
    #[serde(default)]
    pub bars: Option<Vec<OhlcBar>>,
    pub current_value: Option<f64>,
    pub previous_close: Option<f64>,
    pub today_high: Option<f64>,
    pub today_low: Option<f64>,
}

impl CalculateRequest {
    fn into_bars(self) -> Result<(String, Vec<OhlcBar>)> {
        if let Some(bars) = self.bars {
            return Ok((self.symbol, bars));
        }

        match (self.current_value, self.previous_close, self.today_high, self.today_low) {
            (Some(price), Some(previous_close), Some(day_high), Some(day_low)) => {
                let snapshot = IndexSnapshot {
                    previous_close,
                    price,
                    day_low,
                    day_high,
                };
                Ok((self.symbol, snapshot.to_bars()))
            }
            _ => Err(AppError::BadRequest(
                "Provide bars or currentValue, previousClose, todayHigh and todayLow".to_string(),
            )),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculateResponse {
    pub signal: Signal,
    pub trade_plan: TradePlan,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewRequest {
    pub signal: Signal,
    #[serde(default)]
    pub options: FormatOptions,
    /// Use the compact Discord layout.
    #[serde(default)]
    pub simple: bool,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub discord: String,
    pub whatsapp: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub symbol: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PerformanceQuery {
    pub days: Option<i64>,
}

// =============================================================================
// Handlers
// =============================================================================

/// POST /api/signals/generate
async fn generate(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<GenerateQuery>,
) -> Result<Json<ApiResponse<GenerationReport>>> {
    let symbols = match query.symbols.as_deref().map(parse_symbols) {
        Some(symbols) if !symbols.is_empty() => symbols,
        _ => state.config.trading_symbols.clone(),
    };

    let report = pipeline::generate_signals(&state, &symbols).await;
    Ok(Json(ApiResponse::new(report)))
}

/// POST /api/signals/calculate
async fn calculate(
    _auth: Authenticated,
    Json(request): Json<CalculateRequest>,
) -> Result<Json<ApiResponse<CalculateResponse>>> {
    let (symbol, bars) = request.into_bars()?;
    let signal = strategy::calculate_signal(&symbol, &bars)?;
    let trade_plan = strategy::trade_plan(&signal);
    Ok(Json(ApiResponse::new(CalculateResponse { signal, trade_plan })))
}

/// POST /api/signals/preview
async fn preview(
    _auth: Authenticated,
    Json(request): Json<PreviewRequest>,
) -> Json<ApiResponse<PreviewResponse>> {
    let discord = if request.simple {
        formatter::format_discord_simple(&request.signal)
    } else {
        formatter::format_discord(&request.signal, &request.options)
    };

    Json(ApiResponse::new(PreviewResponse {
        discord,
        whatsapp: formatter::format_whatsapp(&request.signal),
    }))
}

/// GET /api/signals
async fn list_signals(
    State(state): State<AppState>,
    _auth: Authenticated,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<SignalRecord>>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let symbol = query.symbol.as_deref().filter(|s| !s.is_empty());
    Ok(Json(ApiResponse::new(state.store.list_signals(symbol, limit)?)))
}

/// GET /api/signals/performance
async fn performance(
    State(state): State<AppState>,
    _auth: Authenticated,
    Query(query): Query<PerformanceQuery>,
) -> Result<Json<ApiResponse<PerformanceSummary>>> {
    let days = query.days.unwrap_or(DEFAULT_PERFORMANCE_DAYS);
    let summary = state
        .learning
        .performance_summary(days, Utc::now().timestamp_millis())?;
    Ok(Json(ApiResponse::new(summary)))
}

/// GET /api/signals/:id
async fn get_signal(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<SignalRecord>>> {
    let record = state
        .store
        .get_signal(id)?
        .ok_or_else(|| AppError::NotFound(format!("Signal {} not found", id)))?;
    Ok(Json(ApiResponse::new(record)))
}

/// DELETE /api/signals/:id
async fn delete_signal(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<SuccessResponse>>> {
    if !state.store.delete_signal(id)? {
        return Err(AppError::NotFound(format!("Signal {} not found", id)));
    }
    Ok(Json(ApiResponse::new(SuccessResponse { success: true })))
}

/// PUT /api/signals/:id/outcome
async fn record_outcome(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<i64>,
    Json(request): Json<OutcomeRequest>,
) -> Result<Json<ApiResponse<SignalRecord>>> {
    let record = state.learning.learn_from_outcome(
        id,
        request.outcome,
        request.profit_loss,
        Utc::now().timestamp_millis(),
    )?;
    Ok(Json(ApiResponse::new(record)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(json: serde_json::Value) -> CalculateRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_calculate_from_index_values() {
        let (symbol, bars) = request(serde_json::json!({
            "symbol": "^NDX",
            "currentValue": 110.0,
            "previousClose": 100.0,
            "todayHigh": 112.0,
            "todayLow": 98.0
        }))
        .into_bars()
        .unwrap();

        assert_eq!(symbol, "^NDX");
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 100.0);
        assert_eq!(bars[1].close, 110.0);
        assert_eq!(bars[1].high, 112.0);
    }

    #[test]
    fn test_calculate_prefers_bars() {
        let (_, bars) = request(serde_json::json!({
            "symbol": "^DJI",
            "bars": [
                {"open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5},
                {"open": 1.5, "high": 2.5, "low": 1.0, "close": 2.0},
                {"open": 2.0, "high": 3.0, "low": 1.5, "close": 2.5}
            ],
            "currentValue": 99.0
        }))
        .into_bars()
        .unwrap();
        assert_eq!(bars.len(), 3);
    }

    #[test]
    fn test_calculate_missing_values() {
        let err = request(serde_json::json!({
            "symbol": "^NDX",
            "currentValue": 110.0
        }))
        .into_bars()
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
