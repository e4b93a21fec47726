use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use adboard_core::actor::{caps, ActorId};
use adboard_core::service::{CancelOutcome, ConfirmOutcome, SubmitOutcome};
use adboard_core::timefmt;

use super::require;
use crate::error::AppError;
use crate::state::{caps_from_headers, AppState};

// ---------------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct SubmitBody {
    pub actor: ActorId,
    pub message: String,
}

/// POST /api/ads — submit a draft ad for preview and confirmation.
pub async fn submit(
    State(app): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<SubmitBody>,
) -> Result<impl IntoResponse, AppError> {
    let capabilities = caps_from_headers(&headers);
    require(&capabilities, caps::USE)?;

    let outcome = app
        .service
        .submit(body.actor, &capabilities, body.message)
        .await;

    let response = match outcome {
        SubmitOutcome::PendingConfirmation {
            preview,
            timeout_secs,
        } => (
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "pending_confirmation",
                "preview": preview,
                "timeout_secs": timeout_secs,
            })),
        ),
        SubmitOutcome::AlreadyPending => (
            StatusCode::CONFLICT,
            Json(json!({
                "status": "already_pending",
                "error": "an ad is already awaiting confirmation",
            })),
        ),
        SubmitOutcome::OnCooldown { remaining_secs } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "status": "on_cooldown",
                "remaining_secs": remaining_secs,
                "formatted": timefmt::format_seconds(remaining_secs),
            })),
        ),
        SubmitOutcome::QueuedForReview => (
            StatusCode::ACCEPTED,
            Json(json!({ "status": "queued_for_review" })),
        ),
        SubmitOutcome::Invalid { reason } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "status": "invalid", "error": reason })),
        ),
    };
    Ok(response)
}

// ---------------------------------------------------------------------------
// Confirm / cancel
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ActorBody {
    pub actor: ActorId,
}

/// POST /api/ads/confirm — broadcast the pending ad and start the cooldown.
pub async fn confirm(
    State(app): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ActorBody>,
) -> Result<impl IntoResponse, AppError> {
    let capabilities = caps_from_headers(&headers);
    require(&capabilities, caps::USE)?;

    match app.service.confirm(body.actor) {
        ConfirmOutcome::Broadcast { message } => Ok((
            StatusCode::OK,
            Json(json!({ "status": "broadcast", "message": message })),
        )),
        ConfirmOutcome::NoPending => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no ad is awaiting confirmation" })),
        )),
    }
}

/// POST /api/ads/cancel — discard the pending ad.
pub async fn cancel(
    State(app): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ActorBody>,
) -> Result<impl IntoResponse, AppError> {
    let capabilities = caps_from_headers(&headers);
    require(&capabilities, caps::USE)?;

    match app.service.cancel(body.actor) {
        CancelOutcome::Cancelled => {
            Ok((StatusCode::OK, Json(json!({ "status": "cancelled" }))))
        }
        CancelOutcome::NoPending => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "no ad is awaiting confirmation" })),
        )),
    }
}

// ---------------------------------------------------------------------------
// Cooldown
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CooldownQuery {
    pub actor: ActorId,
}

/// GET /api/cooldown?actor=… — remaining cooldown for an actor.
pub async fn cooldown(
    State(app): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CooldownQuery>,
) -> Result<impl IntoResponse, AppError> {
    let capabilities = caps_from_headers(&headers);
    let remaining = app
        .service
        .remaining_cooldown(query.actor, &capabilities)
        .await;
    Ok(Json(json!({
        "remaining_secs": remaining,
        "formatted": timefmt::format_seconds(remaining),
    })))
}
