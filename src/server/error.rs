//! HTTP rendering of [`WebSubError`].

use crate::error::WebSubError;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// JSON error body for caller-facing routes.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for WebSubError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

/// Status-only response for hub-facing routes, which never receive a body on
/// failure.
pub(crate) fn empty(error: &WebSubError) -> Response {
    error.status().into_response()
}
