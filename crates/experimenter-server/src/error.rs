//! Mapping of domain errors onto HTTP responses.

use axum::Json;
use axum::response::{IntoResponse, Response};
use experimenter_core::error::ExperimenterError;
use http::StatusCode;
use serde_json::json;
use tracing::error;

/// Error returned by every handler.
///
/// Bodies take the form `{"error": {"category": .., "message": ..}}`;
/// form failures add a `fields` map keyed by field name.
#[derive(Debug)]
pub struct ApiError(pub ExperimenterError);

impl From<ExperimenterError> for ApiError {
    fn from(err: ExperimenterError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        Self(ExperimenterError::AuthenticationFailed {
            reason: reason.into(),
        })
    }

    fn status_and_category(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            ExperimenterError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            ExperimenterError::AlreadyExists { .. } => (StatusCode::CONFLICT, "conflict"),
            ExperimenterError::AuthenticationFailed { .. } => {
                (StatusCode::UNAUTHORIZED, "authentication")
            }
            ExperimenterError::PermissionDenied { .. } => (StatusCode::FORBIDDEN, "permission"),
            ExperimenterError::Validation { .. } => (StatusCode::BAD_REQUEST, "validation"),
            ExperimenterError::InvalidForm(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
            ExperimenterError::InvalidTransition { .. } => (StatusCode::CONFLICT, "transition"),
            ExperimenterError::Database(_)
            | ExperimenterError::Integration(_)
            | ExperimenterError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, category) = self.status_and_category();

        let body = match &self.0 {
            ExperimenterError::InvalidForm(fields) => json!({
                "error": {
                    "category": category,
                    "message": "The submitted form is invalid",
                    "fields": fields,
                }
            }),
            ExperimenterError::Database(_)
            | ExperimenterError::Integration(_)
            | ExperimenterError::Internal(_) => {
                error!(error = %self.0, "Request failed");
                json!({
                    "error": {
                        "category": category,
                        "message": "Internal server error",
                    }
                })
            }
            other => json!({
                "error": {
                    "category": category,
                    "message": other.to_string(),
                }
            }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use experimenter_core::error::FormErrors;

    #[test]
    fn statuses_follow_error_kind() {
        let cases = [
            (
                ExperimenterError::NotFound {
                    entity: "experiment".into(),
                    id: "x".into(),
                },
                StatusCode::NOT_FOUND,
            ),
            (ExperimenterError::InvalidForm(FormErrors::new()), StatusCode::UNPROCESSABLE_ENTITY),
            (
                ExperimenterError::InvalidTransition {
                    from: "Draft".into(),
                    to: "Live".into(),
                },
                StatusCode::CONFLICT,
            ),
            (
                ExperimenterError::PermissionDenied {
                    reason: "nope".into(),
                },
                StatusCode::FORBIDDEN,
            ),
            (ExperimenterError::Database("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }
}
