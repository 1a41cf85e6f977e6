//! Handlers that operate on a caller-supplied inventory snapshot and return
//! the updated snapshot.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/inventory/apply` | Body: [`ApplyBody`]; supersedes any prior factor |
//! | `POST` | `/inventory/remove-record` | Body: [`RemoveRecordBody`] |

use axum::{Json, extract::State};
use ghg_core::{
  activity::ActivityRecord,
  catalog::FactorCatalog,
  factor::FactorChoice,
  inventory::{FactorApplication, Inventory},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

// ─── Apply ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ApplyBody {
  pub inventory: Inventory,
  pub record_id: Uuid,
  pub factor:    FactorChoice,
}

#[derive(Debug, Serialize)]
pub struct ApplyResponse {
  pub inventory:   Inventory,
  pub application: FactorApplication,
}

/// `POST /inventory/apply`
pub async fn apply(
  State(catalog): State<&'static FactorCatalog>,
  Json(body): Json<ApplyBody>,
) -> Result<Json<ApplyResponse>, ApiError> {
  let mut inventory = body.inventory;
  let application = inventory.apply_factor(body.record_id, &body.factor, catalog)?;
  Ok(Json(ApplyResponse { inventory, application }))
}

// ─── Remove record ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RemoveRecordBody {
  pub inventory: Inventory,
  pub record_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RemoveRecordResponse {
  pub inventory: Inventory,
  pub removed:   ActivityRecord,
}

/// `POST /inventory/remove-record` — also drops the record's applied factor.
pub async fn remove_record(
  Json(body): Json<RemoveRecordBody>,
) -> Result<Json<RemoveRecordResponse>, ApiError> {
  let mut inventory = body.inventory;
  let removed = inventory.remove_record(body.record_id)?;
  Ok(Json(RemoveRecordResponse { inventory, removed }))
}
