use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::repos::RepoError,
    cache::ResyncError,
    domain::error::DomainError,
    infra::error::InfraError,
};

/// Diagnostic attached to an error response so the tracing middleware can log
/// the full cause chain while the body stays generic.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
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

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Domain(DomainError::NotFound { .. }) | AppError::Repo(RepoError::NotFound) => {
                StatusCode::NOT_FOUND
            }
            AppError::Domain(DomainError::Conflict { .. })
            | AppError::Repo(RepoError::VersionConflict { .. }) => StatusCode::CONFLICT,
            AppError::Domain(DomainError::Validation { .. }) | AppError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Repo(RepoError::Persistence(_)) | AppError::Repo(RepoError::Timeout) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Infra(InfraError::Database { .. })
            | AppError::Infra(InfraError::Cache { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Infra(_) | AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self {
            AppError::Domain(DomainError::NotFound { .. }) | AppError::Repo(RepoError::NotFound) => {
                "Resource not found"
            }
            AppError::Domain(DomainError::Conflict { .. })
            | AppError::Repo(RepoError::VersionConflict { .. }) => {
                "The resource was modified concurrently; retry the request"
            }
            AppError::Domain(DomainError::Validation { .. }) | AppError::Validation(_) => {
                "Request could not be processed"
            }
            AppError::Repo(RepoError::Persistence(_))
            | AppError::Repo(RepoError::Timeout)
            | AppError::Infra(InfraError::Database { .. })
            | AppError::Infra(InfraError::Cache { .. }) => "Service temporarily unavailable",
            AppError::Infra(_) | AppError::Unexpected(_) => "Unexpected error occurred",
        }
    }
}

impl From<ResyncError> for AppError {
    fn from(err: ResyncError) -> Self {
        match err {
            ResyncError::Repo(repo) => Self::Repo(repo),
            ResyncError::Cache(cache) => Self::Infra(InfraError::cache(cache.to_string())),
            other => Self::Unexpected(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error("application::error::AppError", status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}
