use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use adboard_core::actor::caps;

use super::require;
use crate::error::AppError;
use crate::state::{caps_from_headers, AppState};

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
}

fn default_page() -> u32 {
    1
}

/// GET /api/review?page=… — one page of the review queue, oldest first.
pub async fn list(
    State(app): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let capabilities = caps_from_headers(&headers);
    require(&capabilities, caps::REVIEW)?;

    let entries = app.service.reviews().list(query.page).await?;
    Ok(Json(json!({ "page": query.page.max(1), "entries": entries })))
}

/// DELETE /api/review/{id} — resolve (approve or dismiss) a queued ad.
pub async fn resolve(
    State(app): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    let capabilities = caps_from_headers(&headers);
    require(&capabilities, caps::REVIEW)?;

    app.service.reviews().resolve(id).await?;
    Ok(Json(json!({ "resolved": id })))
}
