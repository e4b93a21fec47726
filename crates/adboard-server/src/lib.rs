pub mod error;
pub mod routes;
pub mod state;

use std::path::PathBuf;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use adboard_core::config::Config;

use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Events (SSE)
        .route("/api/events", get(routes::events::sse_events))
        // Submission flow
        .route("/api/ads", post(routes::ads::submit))
        .route("/api/ads/confirm", post(routes::ads::confirm))
        .route("/api/ads/cancel", post(routes::ads::cancel))
        .route("/api/cooldown", get(routes::ads::cooldown))
        // Staff surface
        .route("/api/broadcast", post(routes::broadcast::broadcast_now))
        .route("/api/review", get(routes::review::list))
        .route("/api/review/{id}", delete(routes::review::resolve))
        .route("/api/config/reload", post(routes::config::reload))
        .layer(cors)
        .with_state(state)
}

/// Start the adboard server.
///
/// Writes a default `adboard.yaml` when none exists yet, mirrors of which
/// admins can then edit and reload at runtime. On ctrl-c the server stops
/// accepting, drains the write-behind queue, flushes the cooldown cache,
/// and releases the pool before returning.
pub async fn serve(config_path: PathBuf, port: u16) -> anyhow::Result<()> {
    let config = if config_path.exists() {
        Config::load(&config_path)?
    } else {
        let config = Config::default();
        config.save(&config_path)?;
        tracing::info!(path = %config_path.display(), "wrote default config");
        config
    };

    for warning in config.validate() {
        tracing::warn!(level = ?warning.level, "{}", warning.message);
    }

    let app_state = AppState::init(config, config_path).await?;
    let service = app_state.service.clone();
    let router = build_router(app_state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    let actual_port = listener.local_addr()?.port();
    tracing::info!("adboard server listening on http://localhost:{actual_port}");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    service.shutdown().await;
    tracing::info!("cooldowns flushed; pool released");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt as _;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt as _;

    use adboard_core::actor::ActorId;
    use crate::state::CAPS_HEADER;

    const USER_CAPS: &str = "adboard.use";
    const AD: &str = "visit the new mall at spawn plaza";

    async fn test_state() -> (TempDir, AppState) {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.database_path = dir.path().join("ads.db");
        let config_path = dir.path().join("adboard.yaml");
        config.save(&config_path).unwrap();

        let state = AppState::init(config, config_path).await.unwrap();
        (dir, state)
    }

    fn post_json(uri: &str, caps: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .header(CAPS_HEADER, caps)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn submit_without_use_capability_is_forbidden() {
        let (_dir, state) = test_state().await;
        let actor = ActorId::new();

        let response = build_router(state)
            .oneshot(post_json(
                "/api/ads",
                "",
                json!({ "actor": actor, "message": AD }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn submit_confirm_then_cooldown_flow() {
        let (_dir, state) = test_state().await;
        let actor = ActorId::new();

        let response = build_router(state.clone())
            .oneshot(post_json(
                "/api/ads",
                USER_CAPS,
                json!({ "actor": actor, "message": AD }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert_eq!(body["status"], "pending_confirmation");
        assert_eq!(body["preview"], AD);

        let response = build_router(state.clone())
            .oneshot(post_json(
                "/api/ads/confirm",
                USER_CAPS,
                json!({ "actor": actor }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "broadcast");
        assert_eq!(body["message"], AD);

        // Immediately on cooldown for the next submission.
        let response = build_router(state)
            .oneshot(post_json(
                "/api/ads",
                USER_CAPS,
                json!({ "actor": actor, "message": AD }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["status"], "on_cooldown");
        assert!(body["remaining_secs"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn double_submit_is_conflict() {
        let (_dir, state) = test_state().await;
        let actor = ActorId::new();

        build_router(state.clone())
            .oneshot(post_json(
                "/api/ads",
                USER_CAPS,
                json!({ "actor": actor, "message": AD }),
            ))
            .await
            .unwrap();

        let response = build_router(state)
            .oneshot(post_json(
                "/api/ads",
                USER_CAPS,
                json!({ "actor": actor, "message": AD }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn cancel_without_pending_is_not_found() {
        let (_dir, state) = test_state().await;

        let response = build_router(state)
            .oneshot(post_json(
                "/api/ads/cancel",
                USER_CAPS,
                json!({ "actor": ActorId::new() }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn short_message_is_unprocessable() {
        let (_dir, state) = test_state().await;

        let response = build_router(state)
            .oneshot(post_json(
                "/api/ads",
                USER_CAPS,
                json!({ "actor": ActorId::new(), "message": "short" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn cooldown_endpoint_reports_clear_actor() {
        let (_dir, state) = test_state().await;
        let actor = ActorId::new();

        let request = Request::builder()
            .method("GET")
            .uri(format!("/api/cooldown?actor={actor}"))
            .body(Body::empty())
            .unwrap();
        let response = build_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["remaining_secs"], 0);
        assert_eq!(body["formatted"], "0s");
    }

    #[tokio::test]
    async fn review_listing_requires_capability() {
        let (_dir, state) = test_state().await;

        let request = Request::builder()
            .method("GET")
            .uri("/api/review")
            .header(CAPS_HEADER, USER_CAPS)
            .body(Body::empty())
            .unwrap();
        let response = build_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_broadcast_requires_admin() {
        let (_dir, state) = test_state().await;

        let response = build_router(state.clone())
            .oneshot(post_json(
                "/api/broadcast",
                USER_CAPS,
                json!({ "actor": ActorId::new(), "message": AD }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = build_router(state)
            .oneshot(post_json(
                "/api/broadcast",
                "adboard.admin",
                json!({ "actor": ActorId::new(), "message": AD }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn config_reload_roundtrips_warnings() {
        let (_dir, state) = test_state().await;

        let response = build_router(state)
            .oneshot(post_json("/api/config/reload", "adboard.admin", json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["reloaded"], true);
        assert!(body["warnings"].as_array().unwrap().is_empty());
    }
}
