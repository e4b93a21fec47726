use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use adboard_core::AdboardError;

// ---------------------------------------------------------------------------
// Internal sentinel for explicit 403 Forbidden errors
// ---------------------------------------------------------------------------

/// Private sentinel error type used to carry an explicit HTTP 403 through
/// the `anyhow::Error` chain without touching the `AdboardError` enum.
#[derive(Debug)]
struct ForbiddenError(String);

impl std::fmt::Display for ForbiddenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ForbiddenError {}

// ---------------------------------------------------------------------------
// AppError — unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 403 Forbidden error (missing capability).
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self(ForbiddenError(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(f) = self.0.downcast_ref::<ForbiddenError>() {
            let body = serde_json::json!({ "error": f.0.clone() });
            return (StatusCode::FORBIDDEN, axum::Json(body)).into_response();
        }

        let status = if let Some(e) = self.0.downcast_ref::<AdboardError>() {
            match e {
                AdboardError::AlreadyPending => StatusCode::CONFLICT,
                AdboardError::NoPending | AdboardError::ReviewEntryNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                AdboardError::ConfigNotFound(_) => StatusCode::BAD_REQUEST,
                AdboardError::Store(_)
                | AdboardError::Io(_)
                | AdboardError::Yaml(_)
                | AdboardError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_pending_maps_to_409() {
        let err = AppError(AdboardError::AlreadyPending.into());
        assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn no_pending_maps_to_404() {
        let err = AppError(AdboardError::NoPending.into());
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn review_entry_not_found_maps_to_404() {
        let err = AppError(AdboardError::ReviewEntryNotFound(7).into());
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn config_not_found_maps_to_400() {
        let err = AppError(AdboardError::ConfigNotFound("x.yaml".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn store_failure_maps_to_500() {
        let err = AppError(AdboardError::Store("pool closed".into()).into());
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn forbidden_constructor_maps_to_403() {
        let err = AppError::forbidden("missing capability 'adboard.use'");
        assert_eq!(err.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn non_domain_error_maps_to_500() {
        let err = AppError(anyhow::anyhow!("something unexpected"));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
