use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Deserialize;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use adboard_core::actor::ActorId;

use crate::state::{caps_from_headers, AppState};

#[derive(Deserialize)]
pub struct EventsQuery {
    /// The subscriber's own actor id; personal notices are filtered to it.
    pub actor: Option<ActorId>,
}

/// GET /api/events — SSE stream of broadcasts and notices visible to this
/// subscriber. Lagging subscribers are dropped by the channel; delivery is
/// fire-and-forget.
pub async fn sse_events(
    State(app): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> impl axum::response::IntoResponse {
    let capabilities = caps_from_headers(&headers);
    let viewer = query.actor;

    let rx = app.event_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(move |message| {
        let envelope = message.ok()?;
        if !envelope.visible_to(viewer, &capabilities) {
            return None;
        }
        let payload = serde_json::to_string(&envelope).ok()?;
        Some(Ok::<Event, Infallible>(
            Event::default().event(envelope.event_name()).data(payload),
        ))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
