//! Handlers for the factor catalog and factor-selection queries.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/factors` | Optional `?scope=scope1\|scope2\|scope3`; unknown scope → `[]` |
//! | `GET`  | `/factors/:id` | 404 if not in the catalog |
//! | `GET`  | `/suggestions` | `?source&unit&scope`; ranked by score |
//! | `GET`  | `/applicability` | `?factor_id&source&unit` → `{"applies": bool}` |
//! | `POST` | `/validate` | Body: [`ValidateBody`] |

use std::str::FromStr;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use ghg_core::{
  applicability::{
    FactorSuggestion, SelectionValidation, factor_applies_to_activity,
    suggested_factors, validate_factor_selection,
  },
  catalog::FactorCatalog,
  factor::{EmissionFactor, FactorChoice},
  scope::Scope,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub scope: Option<String>,
}

/// `GET /factors[?scope=<scope>]`
pub async fn list(
  State(catalog): State<&'static FactorCatalog>,
  Query(params): Query<ListParams>,
) -> Json<Vec<EmissionFactor>> {
  let factors = match params.scope.as_deref() {
    None => catalog.factors().to_vec(),
    Some(raw) => match Scope::from_str(raw) {
      Ok(scope) => catalog.factors_by_scope(scope).into_iter().cloned().collect(),
      Err(_) => Vec::new(),
    },
  };
  Json(factors)
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /factors/:id`
pub async fn get_one(
  State(catalog): State<&'static FactorCatalog>,
  Path(id): Path<String>,
) -> Result<Json<EmissionFactor>, ApiError> {
  catalog
    .get(&id)
    .cloned()
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("factor {id} not found")))
}

// ─── Suggestions ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SuggestParams {
  pub source: String,
  pub unit:   String,
  pub scope:  Scope,
}

/// `GET /suggestions?source=<source>&unit=<unit>&scope=<scope>`
pub async fn suggestions(
  State(catalog): State<&'static FactorCatalog>,
  Query(params): Query<SuggestParams>,
) -> Json<Vec<FactorSuggestion<'static>>> {
  Json(suggested_factors(
    catalog,
    &params.source,
    &params.unit,
    params.scope,
  ))
}

// ─── Applicability ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ApplicabilityParams {
  pub factor_id: String,
  pub source:    String,
  pub unit:      String,
}

#[derive(Debug, Serialize)]
pub struct ApplicabilityResponse {
  pub applies: bool,
}

/// `GET /applicability?factor_id=<id>&source=<source>&unit=<unit>`
pub async fn applicability(
  State(catalog): State<&'static FactorCatalog>,
  Query(params): Query<ApplicabilityParams>,
) -> Result<Json<ApplicabilityResponse>, ApiError> {
  let factor = catalog.get(&params.factor_id).ok_or_else(|| {
    ApiError::NotFound(format!("factor {} not found", params.factor_id))
  })?;
  Ok(Json(ApplicabilityResponse {
    applies: factor_applies_to_activity(factor, &params.source, &params.unit),
  }))
}

// ─── Validate ─────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /validate`.
#[derive(Debug, Deserialize)]
pub struct ValidateBody {
  pub factor: FactorChoice,
  pub source: String,
  pub unit:   String,
  /// When given, a factor from another scope produces a warning.
  pub scope:  Option<Scope>,
}

/// `POST /validate`
pub async fn validate(
  State(catalog): State<&'static FactorCatalog>,
  Json(body): Json<ValidateBody>,
) -> Result<Json<SelectionValidation>, ApiError> {
  let factor = catalog.resolve(&body.factor)?;
  let mut validation = validate_factor_selection(&factor, &body.source, &body.unit);
  if let Some(scope) = body.scope {
    validation.check_scope(&factor, scope);
  }
  Ok(Json(validation))
}
