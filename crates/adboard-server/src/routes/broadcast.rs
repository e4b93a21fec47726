use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use adboard_core::actor::{caps, ActorId};

use super::require;
use crate::error::AppError;
use crate::state::{caps_from_headers, AppState};

#[derive(Deserialize)]
pub struct BroadcastBody {
    pub actor: ActorId,
    pub message: String,
    /// Restrict delivery to holders of this capability; everyone when absent.
    #[serde(default)]
    pub audience: Option<String>,
}

/// POST /api/broadcast — admin direct broadcast, no pending flow, no
/// cooldown.
pub async fn broadcast_now(
    State(app): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<BroadcastBody>,
) -> Result<impl IntoResponse, AppError> {
    let capabilities = caps_from_headers(&headers);
    require(&capabilities, caps::ADMIN)?;

    match app
        .service
        .broadcast_now(body.actor, &body.message, body.audience.as_deref())
    {
        Ok(()) => Ok((StatusCode::OK, Json(json!({ "status": "broadcast" })))),
        Err(rejection) => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "status": "invalid", "error": rejection.to_string() })),
        )),
    }
}
