//! Handlers for calculation, aggregation, and staleness checks.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/calculate` | Body: `{"record":…, "factor":…}`; 422 on unit mismatch |
//! | `POST` | `/aggregate` | Body: an inventory; returns the stamped result |
//! | `POST` | `/staleness` | Body: `{"result":…, "inventory":…}` |

use axum::{Json, extract::State};
use ghg_core::{
  activity::ActivityRecord,
  aggregate::CalculationResult,
  calculate::{Calculation, calculate_detailed},
  catalog::FactorCatalog,
  factor::FactorChoice,
  inventory::Inventory,
  staleness::{CalculationState, check},
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

// ─── Calculate ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CalculateBody {
  pub record: ActivityRecord,
  pub factor: FactorChoice,
}

/// `POST /calculate`
pub async fn calculate(
  State(catalog): State<&'static FactorCatalog>,
  Json(body): Json<CalculateBody>,
) -> Result<Json<Calculation>, ApiError> {
  let factor = catalog.resolve(&body.factor)?;
  Ok(Json(calculate_detailed(&body.record, &factor)?))
}

// ─── Aggregate ────────────────────────────────────────────────────────────────

/// `POST /aggregate`
pub async fn aggregate(Json(inventory): Json<Inventory>) -> Json<CalculationResult> {
  let result = inventory.aggregate();
  if let Some(summary) = result.exclusion_summary() {
    tracing::info!(%summary, "aggregation completed with exclusions");
  }
  Json(result)
}

// ─── Staleness ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StalenessBody {
  pub result:    CalculationResult,
  pub inventory: Inventory,
}

#[derive(Debug, Serialize)]
pub struct StalenessResponse {
  pub state:  CalculationState,
  /// The submitted result while it is current; a cleared result otherwise.
  pub result: CalculationResult,
}

/// `POST /staleness`
pub async fn staleness(Json(body): Json<StalenessBody>) -> Json<StalenessResponse> {
  let inventory = &body.inventory;
  let state = check(
    &body.result,
    inventory.records(),
    inventory.applied_factors(),
    inventory.facilities(),
  );
  let result = match state {
    CalculationState::Calculated => body.result,
    _ => CalculationResult::cleared(),
  };
  Json(StalenessResponse { state, result })
}
