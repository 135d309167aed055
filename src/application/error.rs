use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::otp::OtpError, application::purge::PurgeError,
    application::timetable::TimetableError, domain::error::SourceError, infra::error::InfraError,
};

/// Diagnostic chain attached to failed responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

impl TimetableError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            TimetableError::UnknownUniversity(_) => StatusCode::NOT_FOUND,
            TimetableError::Source(SourceError::User { .. }) => StatusCode::BAD_REQUEST,
            TimetableError::Source(SourceError::System { .. }) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl PurgeError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PurgeError::Unauthorized => StatusCode::UNAUTHORIZED,
            PurgeError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Failures that abort the process before or while serving.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("admin credential rejected: {0}")]
    Credential(#[from] OtpError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, "Unexpected error occurred").into_response();
        report.attach(&mut response);
        response
    }
}
