//! Error types shared across the service.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

/// Failures a request can surface to the frontend.
#[derive(Debug, Error)]
pub enum AppError {
  /// Required connection settings are absent. Fatal, not retryable.
  #[error("configuration missing: {0}")]
  ConfigurationMissing(String),

  /// The upstream API answered with a non-2xx status.
  #[error("upstream API returned {status}: {body}")]
  UpstreamHttp { status: u16, body: String },

  /// Network-level failure reaching the upstream API (timeout, DNS,
  /// connection reset).
  #[error("upstream API unreachable: {0}")]
  UpstreamUnavailable(String),

  /// Durable cache tier failure. Callers treat the cache as optional;
  /// this only reaches a response when nothing else could.
  #[error("cache error: {0}")]
  Cache(String),

  #[error("unexpected error: {0}")]
  Unexpected(String),
}

impl From<reqwest::Error> for AppError {
  fn from(err: reqwest::Error) -> Self {
    // Status errors are raised explicitly with the response body attached;
    // anything reqwest itself reports is a transport-level failure.
    AppError::UpstreamUnavailable(err.to_string())
  }
}

impl From<serde_json::Error> for AppError {
  fn from(err: serde_json::Error) -> Self {
    AppError::Unexpected(format!("JSON error: {}", err))
  }
}

impl From<rusqlite::Error> for AppError {
  fn from(err: rusqlite::Error) -> Self {
    AppError::Cache(err.to_string())
  }
}

#[derive(Serialize)]
struct ErrorBody {
  error: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  details: Option<String>,
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::ConfigurationMissing(_) => StatusCode::INTERNAL_SERVER_ERROR,
      AppError::UpstreamHttp { status, .. } => {
        StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
      }
      AppError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      AppError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
      AppError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    tracing::error!(error = %self, "request failed");

    let body = match self {
      AppError::UpstreamHttp { status, body } => ErrorBody {
        error: format!("Upstream API request failed with status {}", status),
        details: Some(body.clone()),
      },
      other => ErrorBody {
        error: other.to_string(),
        details: None,
      },
    };

    HttpResponse::build(self.status_code()).json(body)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn upstream_http_echoes_status() {
    let err = AppError::UpstreamHttp {
      status: 404,
      body: "project not found".into(),
    };
    assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
  }

  #[test]
  fn upstream_http_with_bogus_status_maps_to_bad_gateway() {
    let err = AppError::UpstreamHttp {
      status: 99,
      body: String::new(),
    };
    assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
  }

  #[test]
  fn unavailable_maps_to_503() {
    let err = AppError::UpstreamUnavailable("connection reset".into());
    assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
  }
}
