//! Trade journal API
//!
//! All routes are scoped to the authenticated user:
//!
//! - GET    /api/journal                - List entries (symbol, outcome, limit, offset)
//! - POST   /api/journal                - Create an entry
//! - GET    /api/journal/stats          - Aggregates
//! - GET    /api/journal/:id            - One entry
//! - PUT    /api/journal/:id            - Replace an entry
//! - DELETE /api/journal/:id            - Delete an entry and its chart
//! - POST   /api/journal/upload         - Upload a chart image (multipart)
//! - GET    /api/journal/charts/:name   - Fetch an uploaded chart

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::auth::Authenticated;
use crate::api::{ApiResponse, SuccessResponse};
use crate::error::{AppError, Result};
use crate::services::journal::MAX_UPLOAD_BYTES;
use crate::types::{JournalEntry, JournalEntryInput, JournalQuery, JournalStats};
use crate::AppState;

/// Multipart overhead allowed above the file limit.
const MULTIPART_SLACK: usize = 1024 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_entries).post(create_entry))
        .route("/stats", get(stats))
        .route(
            "/upload",
            post(upload_chart).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_SLACK)),
        )
        .route("/charts/:name", get(get_chart))
        .route("/:id", get(get_entry).put(update_entry).delete(delete_entry))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub filename: String,
    pub path: String,
}

async fn list_entries(
    State(state): State<AppState>,
    auth: Authenticated,
    Query(query): Query<JournalQuery>,
) -> Result<Json<ApiResponse<Vec<JournalEntry>>>> {
    Ok(Json(ApiResponse::new(state.journal.list(&auth.user.id, &query)?)))
}

async fn create_entry(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(input): Json<JournalEntryInput>,
) -> Result<Json<ApiResponse<JournalEntry>>> {
    Ok(Json(ApiResponse::new(state.journal.create(&auth.user.id, &input)?)))
}

async fn stats(
    State(state): State<AppState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<JournalStats>>> {
    Ok(Json(ApiResponse::new(state.journal.stats(&auth.user.id)?)))
}

async fn get_entry(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<JournalEntry>>> {
    Ok(Json(ApiResponse::new(state.journal.get(&auth.user.id, id)?)))
}

async fn update_entry(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
    Json(input): Json<JournalEntryInput>,
) -> Result<Json<ApiResponse<JournalEntry>>> {
    Ok(Json(ApiResponse::new(
        state.journal.update(&auth.user.id, id, &input)?,
    )))
}

async fn delete_entry(
    State(state): State<AppState>,
    auth: Authenticated,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<SuccessResponse>>> {
    state.journal.delete(&auth.user.id, id)?;
    Ok(Json(ApiResponse::new(SuccessResponse { success: true })))
}

/// POST /api/journal/upload
///
/// Reads the first `file` or `chart` field.
async fn upload_chart(
    State(state): State<AppState>,
    _auth: Authenticated,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResponse>>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if !matches!(field.name(), Some("file") | Some("chart")) {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| AppError::BadRequest("No file selected".to_string()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;

        let stored = state.journal.save_chart(&filename, &bytes).await?;

        return Ok(Json(ApiResponse::new(UploadResponse {
            path: format!("/api/journal/charts/{}", stored),
            filename: stored,
        })));
    }

    Err(AppError::BadRequest("No file uploaded".to_string()))
}

fn content_type(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase()).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

/// GET /api/journal/charts/:name
async fn get_chart(
    State(state): State<AppState>,
    _auth: Authenticated,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    let path = state.journal.chart_path(&name)?;
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::NotFound(format!("Chart {} not found", name)));
        }
        Err(e) => return Err(e.into()),
    };

    Ok(([(header::CONTENT_TYPE, content_type(&name))], bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("chart_1.png"), "image/png");
        assert_eq!(content_type("chart_1.JPEG"), "image/jpeg");
        assert_eq!(content_type("chart_1.gif"), "image/gif");
        assert_eq!(content_type("notes"), "application/octet-stream");
    }
}
