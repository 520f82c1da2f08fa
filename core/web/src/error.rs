use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use drivegallery_common::Error;

/// Plain-text body for every authorization failure.
pub const AUTHENTICATION_REQUIRED: &str = "Authentication Required";

/// Failure of a gallery route.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// No session could be obtained.
    #[error("Authorization failed: {0}")]
    Unauthorized(Error),

    /// A session was obtained but the drive call failed.
    #[error("Drive request failed: {0}")]
    Drive(Error),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl RouteError {
    /// Status and plain-text body sent to the client.
    fn status_and_body(&self) -> (StatusCode, &'static str) {
        match self {
            RouteError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, AUTHENTICATION_REQUIRED),
            RouteError::Drive(e) if e.is_auth_failure() => {
                (StatusCode::UNAUTHORIZED, AUTHENTICATION_REQUIRED)
            }
            RouteError::Drive(Error::NotFound(_)) => (StatusCode::NOT_FOUND, "Not Found"),
            RouteError::Drive(Error::InvalidInput(_)) | RouteError::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, "Bad Request")
            }
            RouteError::Drive(_) => (StatusCode::BAD_GATEWAY, "Drive request failed"),
        }
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();

        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }

        (status, body).into_response()
    }
}
