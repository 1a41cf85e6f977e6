//! The aggregation pass: per-scope, per-facility, and per-category totals.
//!
//! Aggregation never fails as a whole. A record whose calculation errors
//! contributes zero and is listed in [`CalculationResult::failures`]; a
//! record with no applied factor contributes zero and is listed in
//! [`CalculationResult::unfactored_records`].

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, IntoEnumIterator};
use uuid::Uuid;

use crate::{
  Error,
  activity::{ActivityRecord, Facility},
  calculate::calculate,
  inventory::AppliedFactor,
  scope::Scope,
  staleness::fingerprint,
};

/// Label for scope-3 records without a category.
pub const UNCATEGORIZED: &str = "Uncategorized";

// ─── Result types ────────────────────────────────────────────────────────────

/// Ownership-prorated scope-1 and scope-2 emissions for one facility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityBreakdown {
  pub facility_id:          Uuid,
  pub facility:             String,
  pub ownership_percentage: f64,
  pub scope1:               f64,
  pub scope2:               f64,
  pub total:                f64,
}

/// One of the three fixed scope categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
  pub category:   String,
  pub scope:      Scope,
  pub amount:     f64,
  /// Share of total emissions, 0 when the total is 0.
  pub percentage: f64,
}

/// Scope-3 emissions for one free-text record category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope3CategoryBreakdown {
  pub category: String,
  pub amount:   f64,
}

/// Why a record was left out of the totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
  UnitMismatch,
  InvalidFactor,
  InvalidAmount,
}

/// A record excluded from the totals, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordFailure {
  pub record_id: Uuid,
  pub kind:      FailureKind,
  pub message:   String,
}

impl RecordFailure {
  fn new(record_id: Uuid, error: &Error) -> Self {
    let kind = match error {
      Error::UnitMismatch { .. } | Error::UnknownUnit(_) => {
        FailureKind::UnitMismatch
      }
      Error::InvalidAmount { .. } => FailureKind::InvalidAmount,
      _ => FailureKind::InvalidFactor,
    };
    Self { record_id, kind, message: error.to_string() }
  }
}

/// The derived emissions inventory for one snapshot of inputs.
///
/// Never edited by hand. `total_emissions` is a lower bound while
/// `unfactored_records` or `failures` is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
  pub scope1_total:       f64,
  pub scope2_total:       f64,
  pub scope3_total:       f64,
  pub total_emissions:    f64,
  pub by_facility:        Vec<FacilityBreakdown>,
  pub by_category:        Vec<CategoryBreakdown>,
  pub scope3_by_category: Vec<Scope3CategoryBreakdown>,
  pub failures:           Vec<RecordFailure>,
  pub unfactored_records: Vec<Uuid>,
  /// Number of activity records the pass saw.
  pub record_count:       usize,
  /// Fingerprint of the inputs this result was computed from.
  pub input_fingerprint:  Option<String>,
  /// When the pass ran; `None` once the result has been cleared.
  pub calculated_at:      Option<DateTime<Utc>>,
}

impl CalculationResult {
  /// All totals zeroed, breakdowns emptied, timestamp unset.
  pub fn cleared() -> Self { Self::default() }

  pub fn is_cleared(&self) -> bool { self.calculated_at.is_none() }

  /// Every record had a factor and every calculation succeeded.
  pub fn is_complete(&self) -> bool {
    self.failures.is_empty() && self.unfactored_records.is_empty()
  }

  /// e.g. `"3 of 12 records excluded due to unit mismatch"`.
  pub fn exclusion_summary(&self) -> Option<String> {
    if self.failures.is_empty() {
      return None;
    }
    let reason = if self
      .failures
      .iter()
      .all(|f| f.kind == FailureKind::UnitMismatch)
    {
      "unit mismatch"
    } else {
      "calculation errors"
    };
    Some(format!(
      "{} of {} records excluded due to {reason}",
      self.failures.len(),
      self.record_count
    ))
  }
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

/// Aggregate `records` under their `applied` factors, stamped with the
/// current time.
pub fn aggregate(
  records: &[ActivityRecord],
  applied: &[AppliedFactor],
  facilities: &[Facility],
) -> CalculationResult {
  aggregate_at(records, applied, facilities, Utc::now())
}

/// Pure form of [`aggregate`]: identical inputs and `calculated_at` give an
/// identical result.
///
/// If a record somehow has several applied factors, the most recently
/// applied one wins.
pub fn aggregate_at(
  records: &[ActivityRecord],
  applied: &[AppliedFactor],
  facilities: &[Facility],
  calculated_at: DateTime<Utc>,
) -> CalculationResult {
  let mut active: HashMap<Uuid, &AppliedFactor> = HashMap::new();
  for af in applied {
    match active.get(&af.record_id) {
      Some(existing) if existing.applied_at > af.applied_at => {}
      _ => {
        active.insert(af.record_id, af);
      }
    }
  }

  let mut per_record: HashMap<Uuid, f64> = HashMap::with_capacity(records.len());
  let mut scope_totals: BTreeMap<Scope, f64> = BTreeMap::new();
  let mut scope3_categories: BTreeMap<String, f64> = BTreeMap::new();
  let mut failures = Vec::new();
  let mut unfactored_records = Vec::new();

  for record in records {
    let Some(af) = active.get(&record.record_id) else {
      unfactored_records.push(record.record_id);
      continue;
    };
    let emissions = match calculate(record, &af.factor) {
      Ok(emissions) => emissions,
      Err(e) => {
        tracing::warn!(
          record_id = %record.record_id,
          error = %e,
          "excluding record from aggregation"
        );
        failures.push(RecordFailure::new(record.record_id, &e));
        continue;
      }
    };
    per_record.insert(record.record_id, emissions);
    *scope_totals.entry(record.scope).or_default() += emissions;

    if record.scope == Scope::Scope3 {
      let category = record
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(UNCATEGORIZED);
      *scope3_categories.entry(category.to_string()).or_default() += emissions;
    }
  }

  let known: HashSet<Uuid> = records.iter().map(|r| r.record_id).collect();
  let orphaned = active.keys().filter(|id| !known.contains(*id)).count();
  if orphaned > 0 {
    tracing::debug!(orphaned, "ignoring applied factors without a record");
  }

  let scope_total = |scope: Scope| scope_totals.get(&scope).copied().unwrap_or(0.0);
  let scope1_total = scope_total(Scope::Scope1);
  let scope2_total = scope_total(Scope::Scope2);
  let scope3_total = scope_total(Scope::Scope3);
  let total_emissions = scope1_total + scope2_total + scope3_total;

  let by_facility = facilities
    .iter()
    .map(|facility| facility_breakdown(facility, records, &per_record))
    .collect();

  let by_category = Scope::iter()
    .map(|scope| {
      let amount = scope_total(scope);
      let percentage = if total_emissions > 0.0 {
        amount / total_emissions * 100.0
      } else {
        0.0
      };
      CategoryBreakdown {
        category: scope.category_label().to_string(),
        scope,
        amount,
        percentage,
      }
    })
    .collect();

  let scope3_by_category = scope3_categories
    .into_iter()
    .map(|(category, amount)| Scope3CategoryBreakdown { category, amount })
    .collect();

  CalculationResult {
    scope1_total,
    scope2_total,
    scope3_total,
    total_emissions,
    by_facility,
    by_category,
    scope3_by_category,
    failures,
    unfactored_records,
    record_count: records.len(),
    input_fingerprint: Some(fingerprint(records, applied, facilities).into_string()),
    calculated_at: Some(calculated_at),
  }
}

fn facility_breakdown(
  facility: &Facility,
  records: &[ActivityRecord],
  per_record: &HashMap<Uuid, f64>,
) -> FacilityBreakdown {
  let (mut scope1, mut scope2) = (0.0, 0.0);
  for record in records.iter().filter(|r| facility.matches(r)) {
    let Some(emissions) = per_record.get(&record.record_id) else {
      continue;
    };
    match record.scope {
      Scope::Scope1 => scope1 += emissions,
      Scope::Scope2 => scope2 += emissions,
      Scope::Scope3 => {}
    }
  }
  let share = facility.ownership_share();
  let (scope1, scope2) = (scope1 * share, scope2 * share);
  FacilityBreakdown {
    facility_id: facility.facility_id,
    facility: facility.name.clone(),
    ownership_percentage: facility.ownership_percentage,
    scope1,
    scope2,
    total: scope1 + scope2,
  }
}
