use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde_json::json;

use adboard_core::actor::caps;

use super::require;
use crate::error::AppError;
use crate::state::{caps_from_headers, AppState};

/// POST /api/config/reload — reload `adboard.yaml`, swapping the rank table
/// wholesale. Returns any validation warnings.
pub async fn reload(
    State(app): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    let capabilities = caps_from_headers(&headers);
    require(&capabilities, caps::ADMIN)?;

    let warnings = app.service.reload(&app.config_path)?;
    tracing::info!(path = %app.config_path.display(), "config reloaded");
    Ok(Json(json!({ "reloaded": true, "warnings": warnings })))
}
