use deferd_core::CoreError;
use deferd_model::TaskId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Body could not be decoded; the attempt was recorded under `id`.
    #[error("malformed request body: {reason}")]
    Malformed { id: TaskId, reason: String },

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

#[cfg(feature = "http")]
mod http {
    use axum::{
        Json,
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    use deferd_core::CoreError;
    use serde_json::json;
    use tracing::error;

    use super::ApiError;

    impl ApiError {
        pub fn status(&self) -> StatusCode {
            match self {
                ApiError::InvalidRequest(_) | ApiError::Malformed { .. } => StatusCode::BAD_REQUEST,
                ApiError::TaskNotFound(_) => StatusCode::NOT_FOUND,
                ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::Core(e) => match e {
                    CoreError::Rejected(_) => StatusCode::BAD_REQUEST,
                    CoreError::Overflow(_) => StatusCode::TOO_MANY_REQUESTS,
                    CoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    CoreError::AlreadyExecuted(_) => StatusCode::CONFLICT,
                    CoreError::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
                },
            }
        }
    }

    impl IntoResponse for ApiError {
        fn into_response(self) -> Response {
            let status = self.status();
            if status.is_server_error() {
                error!(error = %self, "request failed");
            }

            let body = match &self {
                ApiError::Malformed { id, .. } => json!({ "error": self.to_string(), "id": id }),
                _ => json!({ "error": self.to_string() }),
            };
            (status, Json(body)).into_response()
        }
    }

    #[cfg(test)]
    mod tests {
        use deferd_core::{Overflow, ValidationError};
        use deferd_model::TaskId;

        use super::*;

        #[test]
        fn core_errors_map_to_status_codes() {
            let cases = [
                (
                    CoreError::Rejected(ValidationError::NotWhitelisted("rm".into())),
                    StatusCode::BAD_REQUEST,
                ),
                (CoreError::Overflow(Overflow { limit: 5 }), StatusCode::TOO_MANY_REQUESTS),
                (CoreError::NotFound(TaskId::from("x")), StatusCode::NOT_FOUND),
                (CoreError::AlreadyExecuted(TaskId::from("x")), StatusCode::CONFLICT),
            ];
            for (err, status) in cases {
                assert_eq!(ApiError::from(err).status(), status);
            }
        }

        #[test]
        fn overflow_message_is_passed_through() {
            let err = ApiError::from(CoreError::Overflow(Overflow { limit: 5 }));
            assert_eq!(err.to_string(), "tasks overflow: 5 tasks already in flight");
        }
    }
}
