//! Staleness tracking for calculation results.
//!
//! A result is stamped with a SHA-256 fingerprint of the inputs it was
//! computed from. Whenever the caller asks the tracker to revalidate, the
//! current inputs are fingerprinted again; any difference moves the tracker
//! to [`CalculationState::Stale`] and clears the held result. Only a new
//! calculation returns it to [`CalculationState::Calculated`].

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::Display;

use crate::{
  activity::{ActivityRecord, Facility},
  aggregate::CalculationResult,
  inventory::{AppliedFactor, Inventory},
};

// ─── Fingerprint ─────────────────────────────────────────────────────────────

/// Hex SHA-256 over the inputs of an aggregation pass.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputFingerprint(String);

impl InputFingerprint {
  pub fn as_str(&self) -> &str { &self.0 }

  pub fn into_string(self) -> String { self.0 }
}

impl fmt::Display for InputFingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

fn put_str(hasher: &mut Sha256, s: &str) {
  hasher.update((s.len() as u64).to_le_bytes());
  hasher.update(s.as_bytes());
}

fn put_opt(hasher: &mut Sha256, s: Option<&str>) {
  match s {
    Some(s) => {
      hasher.update([1u8]);
      put_str(hasher, s);
    }
    None => hasher.update([0u8]),
  }
}

/// Fingerprint records, applied factors, and facilities.
///
/// Each collection is sorted by id first, so input order does not matter.
pub fn fingerprint(
  records: &[ActivityRecord],
  applied: &[AppliedFactor],
  facilities: &[Facility],
) -> InputFingerprint {
  let mut hasher = Sha256::new();

  let mut records: Vec<&ActivityRecord> = records.iter().collect();
  records.sort_by_key(|r| r.record_id);
  hasher.update(b"records");
  for r in records {
    hasher.update(r.record_id.as_bytes());
    put_str(&mut hasher, &r.scope.to_string());
    put_str(&mut hasher, &r.source);
    put_opt(&mut hasher, r.category.as_deref());
    hasher.update(r.amount.to_bits().to_le_bytes());
    put_str(&mut hasher, &r.unit);
    put_opt(&mut hasher, r.facility.as_deref());
    put_str(&mut hasher, &r.description);
  }

  let mut applied: Vec<&AppliedFactor> = applied.iter().collect();
  applied.sort_by_key(|a| a.applied_factor_id);
  hasher.update(b"applied");
  for a in applied {
    hasher.update(a.applied_factor_id.as_bytes());
    hasher.update(a.record_id.as_bytes());
    put_opt(&mut hasher, a.factor.catalog_id());
    hasher.update(a.factor.value().to_bits().to_le_bytes());
    put_str(&mut hasher, a.factor.unit());
    hasher.update(a.applied_at.timestamp_micros().to_le_bytes());
  }

  let mut facilities: Vec<&Facility> = facilities.iter().collect();
  facilities.sort_by_key(|f| f.facility_id);
  hasher.update(b"facilities");
  for f in facilities {
    hasher.update(f.facility_id.as_bytes());
    put_str(&mut hasher, &f.name);
    hasher.update(f.ownership_percentage.to_bits().to_le_bytes());
  }

  InputFingerprint(hex::encode(hasher.finalize()))
}

// ─── State machine ───────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CalculationState {
  #[default]
  Uncalculated,
  Calculated,
  Stale,
}

/// Classify a result against the current inputs without holding any state.
pub fn check(
  result: &CalculationResult,
  records: &[ActivityRecord],
  applied: &[AppliedFactor],
  facilities: &[Facility],
) -> CalculationState {
  let Some(stamped) = result.input_fingerprint.as_deref() else {
    return CalculationState::Uncalculated;
  };
  if result.is_cleared() {
    return CalculationState::Uncalculated;
  }
  if fingerprint(records, applied, facilities).as_str() == stamped {
    CalculationState::Calculated
  } else {
    CalculationState::Stale
  }
}

/// Holds the latest result and whether it can still be trusted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StalenessTracker {
  state:       CalculationState,
  fingerprint: Option<InputFingerprint>,
  result:      CalculationResult,
}

impl StalenessTracker {
  pub fn new() -> Self { Self::default() }

  pub fn state(&self) -> CalculationState { self.state }

  /// The held result, only while it is [`CalculationState::Calculated`].
  pub fn result(&self) -> Option<&CalculationResult> {
    (self.state == CalculationState::Calculated).then_some(&self.result)
  }

  /// Aggregate `inventory` and hold the stamped result.
  pub fn recalculate(&mut self, inventory: &Inventory) -> &CalculationResult {
    let result = inventory.aggregate();
    self.record(result);
    &self.result
  }

  /// Hold a result computed elsewhere. Results without a fingerprint or
  /// timestamp leave the tracker uncalculated.
  pub fn record(&mut self, result: CalculationResult) {
    match result.input_fingerprint.clone() {
      Some(fp) if !result.is_cleared() => {
        tracing::debug!(from = %self.state, fingerprint = %fp, "calculation recorded");
        self.fingerprint = Some(InputFingerprint(fp));
        self.result = result;
        self.state = CalculationState::Calculated;
      }
      _ => self.clear(CalculationState::Uncalculated),
    }
  }

  /// Compare the held fingerprint with `inventory`'s current inputs.
  pub fn revalidate(&mut self, inventory: &Inventory) -> CalculationState {
    self.revalidate_inputs(
      inventory.records(),
      inventory.applied_factors(),
      inventory.facilities(),
    )
  }

  pub fn revalidate_inputs(
    &mut self,
    records: &[ActivityRecord],
    applied: &[AppliedFactor],
    facilities: &[Facility],
  ) -> CalculationState {
    if self.state != CalculationState::Calculated {
      return self.state;
    }
    let current = fingerprint(records, applied, facilities);
    if self.fingerprint.as_ref() != Some(&current) {
      tracing::debug!(
        calculated = ?self.fingerprint,
        current = %current,
        "inputs changed, result is stale"
      );
      self.clear(CalculationState::Stale);
    }
    self.state
  }

  fn clear(&mut self, state: CalculationState) {
    self.state = state;
    self.fingerprint = None;
    self.result = CalculationResult::cleared();
  }
}
