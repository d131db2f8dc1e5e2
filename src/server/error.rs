//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`livemux_common::Error`] so that route
//! handlers can return `Result<T, AppError>` directly.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use livemux_common::Error;
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
pub struct AppError {
    inner: Error,
    request_id: Option<String>,
    plain_text: bool,
}

impl AppError {
    pub fn new(inner: Error) -> Self {
        Self {
            inner,
            request_id: None,
            plain_text: false,
        }
    }

    /// A failed subscription: rendered as a plain-text 400 carrying the
    /// error message, which is what media players show to the user.
    pub fn subscribe_failed(inner: Error) -> Self {
        Self {
            inner,
            request_id: None,
            plain_text: true,
        }
    }

    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn inner(&self) -> &Error {
        &self.inner
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.plain_text {
            tracing::warn!(error = %self.inner, "Subscription failed");
            return (
                StatusCode::BAD_REQUEST,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                self.inner.to_string(),
            )
                .into_response();
        }

        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in live handler"
            );
        }

        let code = match &self.inner {
            Error::NotFound { .. } => "not_found",
            Error::Validation(_) => "validation_error",
            Error::Conflict(_) => "conflict",
            Error::InvalidParameters { .. } => "invalid_parameters",
            Error::Encode(_) => "encode_error",
            Error::SinkClosed => "sink_closed",
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        };

        let body = json!({
            "error": self.inner.to_string(),
            "code": code,
            "request_id": self.request_id,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_stream_produces_400() {
        let err = AppError::new(Error::not_found("stream", "live/a"));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn invalid_parameters_produce_500() {
        let err = AppError::new(Error::invalid_parameters("h264", 2, 1));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn subscribe_failure_is_plain_text() {
        let response = AppError::subscribe_failed(Error::not_found("stream", "x")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn with_request_id() {
        let err = AppError::new(Error::Internal("oops".into())).with_request_id("req-123".into());
        assert_eq!(err.request_id.as_deref(), Some("req-123"));
    }
}
