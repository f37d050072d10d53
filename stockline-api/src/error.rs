use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use stockline_core::CoreError;

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    NotFoundError(String),
    /// Stock, transition and state conflicts, tagged with the core error code.
    ConflictError(&'static str, String),
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::ConflictError(code, msg) => (StatusCode::CONFLICT, code, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let code = err.code();
        match err {
            CoreError::ValidationError(_) => AppError::ValidationError(err.to_string()),
            CoreError::NotFound { .. } => AppError::NotFoundError(err.to_string()),
            CoreError::InsufficientStock { .. }
            | CoreError::InvalidTransition { .. }
            | CoreError::InvalidState(_) => AppError::ConflictError(code, err.to_string()),
            CoreError::StorageError(msg) => AppError::InternalServerError(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_status() {
        let cases = [
            (CoreError::ValidationError("x".into()), StatusCode::BAD_REQUEST),
            (CoreError::not_found("order", "ORD-000001"), StatusCode::NOT_FOUND),
            (
                CoreError::InsufficientStock {
                    product_id: "PRD001".into(),
                    batch_id: None,
                    requested: 2,
                    available: 1,
                },
                StatusCode::CONFLICT,
            ),
            (CoreError::InvalidState("x".into()), StatusCode::CONFLICT),
            (CoreError::StorageError("pool timed out".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }
}
