//! Domain error types for server operations.
//!
//! Handler failures travel as `Report<SsoError>` and are turned into a
//! JSON response by [`ApiError`]; startup failures use [`StartupError`].

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fedgate_sso::SsoError;
use rootcause::Report;
use serde::Serialize;
use std::fmt;

/// An SSO failure on its way to the HTTP caller.
#[derive(Debug)]
pub struct ApiError(pub Report<SsoError>);

impl From<Report<SsoError>> for ApiError {
    fn from(report: Report<SsoError>) -> Self {
        Self(report)
    }
}

impl From<SsoError> for ApiError {
    fn from(error: SsoError) -> Self {
        Self(error.into())
    }
}

impl ApiError {
    /// Returns the underlying error.
    #[must_use]
    pub fn error(&self) -> &SsoError {
        self.0.current_context()
    }

    /// Returns the HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.error().status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// JSON envelope returned for failed requests.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: u16,
    message: String,
    data: Option<()>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.error();

        if status.is_server_error() {
            tracing::error!(kind = ?error.kind(), error = %self.0, "sso request failed");
        } else {
            tracing::warn!(kind = ?error.kind(), error = %self.0, "sso request rejected");
        }

        let body = ErrorBody {
            code: status.as_u16(),
            message: error.public_message(),
            data: None,
        };
        (status, Json(body)).into_response()
    }
}

/// Errors that stop the server from starting.
#[derive(Debug)]
pub enum StartupError {
    /// Configuration could not be loaded.
    Configuration { details: String },
    /// The database could not be reached or migrated.
    Database { details: String },
    /// The listener could not be bound or the server stopped abnormally.
    Serve { details: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration { details } => write!(f, "configuration error: {details}"),
            Self::Database { details } => write!(f, "database error: {details}"),
            Self::Serve { details } => write!(f, "server error: {details}"),
        }
    }
}

impl std::error::Error for StartupError {}
