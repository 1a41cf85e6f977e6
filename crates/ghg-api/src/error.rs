//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use ghg_core::Error as EngineError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error(transparent)]
  Engine(#[from] EngineError),
}

impl ApiError {
  fn status(&self) -> StatusCode {
    match self {
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Engine(e) => match e {
        EngineError::FactorNotFound(_)
        | EngineError::RecordNotFound(_)
        | EngineError::FacilityNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::DuplicateRecord(_)
        | EngineError::DuplicateFactor(_)
        | EngineError::DuplicateFacility(_) => StatusCode::CONFLICT,
        EngineError::Serialization(_) => StatusCode::BAD_REQUEST,
        EngineError::CatalogAlreadyInstalled => {
          StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::UNPROCESSABLE_ENTITY,
      },
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }
    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn engine_errors_map_to_statuses() {
    let mismatch = ApiError::from(EngineError::UnitMismatch {
      from: "km".into(),
      to:   "m3".into(),
    });
    assert_eq!(mismatch.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let missing = ApiError::from(EngineError::FactorNotFound("x".into()));
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let invalid = ApiError::from(EngineError::InvalidFactorValue {
      factor_id: "custom".into(),
      value:     -1.0,
    });
    assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let clash = ApiError::from(EngineError::DuplicateFacility("Plant".into()));
    assert_eq!(clash.status(), StatusCode::CONFLICT);
  }
}
