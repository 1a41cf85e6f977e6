//! The in-memory inventory snapshot a calculation pass works on.
//!
//! The caller owns durable storage; an [`Inventory`] is handed in, mutated
//! through the operations here, and handed back. It upholds one invariant
//! the raw collections cannot: at most one applied factor per record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  activity::{ActivityRecord, Facility},
  aggregate::{CalculationResult, aggregate, aggregate_at},
  applicability::{SelectionIssue, SelectionValidation, validate_factor_selection},
  calculate::calculate,
  catalog::FactorCatalog,
  factor::{FactorChoice, ResolvedFactor},
  staleness::{InputFingerprint, fingerprint},
};

// ─── Applied factor ──────────────────────────────────────────────────────────

/// The factor currently chosen for one activity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppliedFactor {
  pub applied_factor_id:    Uuid,
  pub record_id:            Uuid,
  /// Snapshot of the factor as it was when applied.
  pub factor:               ResolvedFactor,
  pub activity_amount:      f64,
  pub activity_unit:        String,
  /// tCO2e as of the last time the record was (re)applied.
  pub calculated_emissions: f64,
  pub applied_at:           DateTime<Utc>,
  /// Applied on the caller's insistence despite validation errors.
  #[serde(default)]
  pub forced:               bool,
  /// Errors and warnings surfaced when the factor was applied.
  #[serde(default)]
  pub issues:               Vec<SelectionIssue>,
}

impl AppliedFactor {
  /// Apply `factor` to `record`, computing its emissions.
  pub fn new(
    record: &ActivityRecord,
    factor: ResolvedFactor,
    applied_at: DateTime<Utc>,
  ) -> Result<Self> {
    let calculated_emissions = calculate(record, &factor)?;
    Ok(Self {
      applied_factor_id: Uuid::new_v4(),
      record_id: record.record_id,
      factor,
      activity_amount: record.amount,
      activity_unit: record.unit.clone(),
      calculated_emissions,
      applied_at,
      forced: false,
      issues: Vec::new(),
    })
  }

  fn note(&mut self, validation: &SelectionValidation) {
    self.forced = !validation.is_valid;
    self.issues = validation.issues().cloned().collect();
  }

  /// Revalidate and recompute against an edited record. The issues always
  /// describe the edited record; on a calculation failure the previous
  /// figures are kept and aggregation will report the record.
  fn refresh(&mut self, record: &ActivityRecord) -> Result<()> {
    let validation = assess(&self.factor, record);
    self.note(&validation);
    let emissions = calculate(record, &self.factor)?;
    self.activity_amount = record.amount;
    self.activity_unit = record.unit.clone();
    self.calculated_emissions = emissions;
    Ok(())
  }
}

/// Validate `factor` against a record's source, unit, and scope.
fn assess(factor: &ResolvedFactor, record: &ActivityRecord) -> SelectionValidation {
  let mut validation =
    validate_factor_selection(factor, &record.source, &record.unit);
  validation.check_scope(factor, record.scope);
  validation
}

/// Outcome of [`Inventory::apply_factor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorApplication {
  pub applied:    AppliedFactor,
  pub validation: SelectionValidation,
  /// The applied factor this one replaced, if any.
  pub superseded: Option<AppliedFactor>,
}

// ─── Inventory ───────────────────────────────────────────────────────────────

/// Raw collections, as exchanged with callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryParts {
  #[serde(default)]
  pub records:         Vec<ActivityRecord>,
  #[serde(default)]
  pub applied_factors: Vec<AppliedFactor>,
  #[serde(default)]
  pub facilities:      Vec<Facility>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "InventoryParts")]
pub struct Inventory {
  records:         Vec<ActivityRecord>,
  applied_factors: Vec<AppliedFactor>,
  facilities:      Vec<Facility>,
}

impl TryFrom<InventoryParts> for Inventory {
  type Error = Error;

  fn try_from(parts: InventoryParts) -> Result<Self> {
    Self::from_parts(parts.records, parts.applied_factors, parts.facilities)
  }
}

impl Inventory {
  pub fn new() -> Self { Self::default() }

  /// Assemble an inventory from caller collections.
  ///
  /// Rejects duplicate record ids, invalid facilities, and applied factors
  /// for unknown records. When a record has several applied factors only the
  /// most recently applied one is kept.
  pub fn from_parts(
    records: Vec<ActivityRecord>,
    applied_factors: Vec<AppliedFactor>,
    facilities: Vec<Facility>,
  ) -> Result<Self> {
    let mut inventory = Self::new();
    for record in records {
      inventory.insert_record(record)?;
    }
    for facility in facilities {
      inventory.add_facility(facility)?;
    }
    let mut applied_factors = applied_factors;
    applied_factors.sort_by_key(|af| af.applied_at);
    for af in applied_factors {
      if inventory.record(af.record_id).is_none() {
        return Err(Error::RecordNotFound(af.record_id));
      }
      inventory.put_applied(af);
    }
    Ok(inventory)
  }

  pub fn into_parts(self) -> InventoryParts {
    InventoryParts {
      records:         self.records,
      applied_factors: self.applied_factors,
      facilities:      self.facilities,
    }
  }

  pub fn records(&self) -> &[ActivityRecord] { &self.records }

  pub fn applied_factors(&self) -> &[AppliedFactor] { &self.applied_factors }

  pub fn facilities(&self) -> &[Facility] { &self.facilities }

  pub fn record(&self, record_id: Uuid) -> Option<&ActivityRecord> {
    self.records.iter().find(|r| r.record_id == record_id)
  }

  // ── Records ───────────────────────────────────────────────────────────

  /// Add a new record. Fails if the id is already present.
  pub fn insert_record(&mut self, record: ActivityRecord) -> Result<()> {
    if self.record(record.record_id).is_some() {
      return Err(Error::DuplicateRecord(record.record_id));
    }
    self.records.push(record);
    Ok(())
  }

  /// Insert or replace a record, returning the previous version.
  ///
  /// A replaced record's applied factor is recalculated against the new
  /// amount and unit.
  pub fn upsert_record(
    &mut self,
    record: ActivityRecord,
  ) -> Option<ActivityRecord> {
    let Some(slot) =
      self.records.iter_mut().find(|r| r.record_id == record.record_id)
    else {
      self.records.push(record);
      return None;
    };
    let previous = std::mem::replace(slot, record.clone());

    if let Some(af) = self
      .applied_factors
      .iter_mut()
      .find(|af| af.record_id == record.record_id)
    {
      if let Err(e) = af.refresh(&record) {
        tracing::warn!(
          record_id = %record.record_id,
          error = %e,
          "applied factor no longer fits edited record"
        );
      } else if af.forced {
        tracing::info!(
          record_id = %record.record_id,
          "applied factor no longer validates against edited record"
        );
      }
    }
    Some(previous)
  }

  /// Remove a record together with its applied factor.
  pub fn remove_record(&mut self, record_id: Uuid) -> Result<ActivityRecord> {
    let index = self
      .records
      .iter()
      .position(|r| r.record_id == record_id)
      .ok_or(Error::RecordNotFound(record_id))?;
    self.clear_factor(record_id);
    Ok(self.records.remove(index))
  }

  /// Records with no applied factor.
  pub fn unfactored_records(&self) -> impl Iterator<Item = &ActivityRecord> {
    self
      .records
      .iter()
      .filter(|r| self.applied_factor_for(r.record_id).is_none())
  }

  // ── Facilities ────────────────────────────────────────────────────────

  /// Add a facility, replacing any facility with the same id.
  ///
  /// Records reference facilities by name, so a second facility with the
  /// same trimmed name is rejected.
  pub fn add_facility(&mut self, facility: Facility) -> Result<()> {
    facility.validate()?;
    let name = facility.name.trim();
    if self
      .facilities
      .iter()
      .any(|f| f.facility_id != facility.facility_id && f.name.trim() == name)
    {
      return Err(Error::DuplicateFacility(name.to_string()));
    }
    match self
      .facilities
      .iter_mut()
      .find(|f| f.facility_id == facility.facility_id)
    {
      Some(slot) => *slot = facility,
      None => self.facilities.push(facility),
    }
    Ok(())
  }

  pub fn remove_facility(&mut self, facility_id: Uuid) -> Result<Facility> {
    let index = self
      .facilities
      .iter()
      .position(|f| f.facility_id == facility_id)
      .ok_or(Error::FacilityNotFound(facility_id))?;
    Ok(self.facilities.remove(index))
  }

  // ── Applied factors ───────────────────────────────────────────────────

  pub fn applied_factor_for(&self, record_id: Uuid) -> Option<&AppliedFactor> {
    self.applied_factors.iter().find(|af| af.record_id == record_id)
  }

  /// Resolve `choice` against `catalog` and apply it to a record.
  pub fn apply_factor(
    &mut self,
    record_id: Uuid,
    choice: &FactorChoice,
    catalog: &FactorCatalog,
  ) -> Result<FactorApplication> {
    let factor = catalog.resolve(choice)?;
    self.apply_resolved(record_id, factor)
  }

  /// Apply an already-resolved factor to a record.
  ///
  /// Validation problems never block the application: they are returned and
  /// recorded on the applied factor, which is flagged `forced` when the
  /// selection was invalid. A unit that cannot be converted at all is a hard
  /// error, since no emissions figure can be produced.
  pub fn apply_resolved(
    &mut self,
    record_id: Uuid,
    factor: ResolvedFactor,
  ) -> Result<FactorApplication> {
    let record = self.record(record_id).ok_or(Error::RecordNotFound(record_id))?;

    let validation = assess(&factor, record);
    let mut applied = AppliedFactor::new(record, factor, Utc::now())?;
    applied.note(&validation);

    if applied.forced {
      tracing::info!(
        %record_id,
        errors = validation.errors.len(),
        "factor applied despite failed validation"
      );
    }

    let superseded = self.put_applied(applied.clone());
    Ok(FactorApplication { applied, validation, superseded })
  }

  /// Remove the applied factor for a record, if any.
  pub fn clear_factor(&mut self, record_id: Uuid) -> Option<AppliedFactor> {
    let index = self
      .applied_factors
      .iter()
      .position(|af| af.record_id == record_id)?;
    Some(self.applied_factors.remove(index))
  }

  fn put_applied(&mut self, applied: AppliedFactor) -> Option<AppliedFactor> {
    let superseded = self.clear_factor(applied.record_id);
    if let Some(old) = &superseded {
      tracing::debug!(
        record_id = %applied.record_id,
        superseded = %old.applied_factor_id,
        by = %applied.applied_factor_id,
        "applied factor superseded"
      );
    }
    self.applied_factors.push(applied);
    superseded
  }

  // ── Calculation ───────────────────────────────────────────────────────

  pub fn aggregate(&self) -> CalculationResult {
    aggregate(&self.records, &self.applied_factors, &self.facilities)
  }

  pub fn aggregate_at(&self, calculated_at: DateTime<Utc>) -> CalculationResult {
    aggregate_at(
      &self.records,
      &self.applied_factors,
      &self.facilities,
      calculated_at,
    )
  }

  pub fn fingerprint(&self) -> InputFingerprint {
    fingerprint(&self.records, &self.applied_factors, &self.facilities)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    applicability::IssueKind,
    catalog::builtin,
    factor::CustomFactor,
    scope::Scope,
    staleness::{CalculationState, StalenessTracker},
  };

  fn catalog_choice(id: &str) -> FactorChoice {
    FactorChoice::Catalog { factor_id: id.into() }
  }

  #[test]
  fn applying_supersedes_the_prior_factor() {
    let catalog = builtin().unwrap();
    let mut inv = Inventory::new();
    let record = ActivityRecord::new(Scope::Scope2, "grid-electricity", 1000.0, "kWh");
    let id = record.record_id;
    inv.insert_record(record).unwrap();

    let first = inv
      .apply_factor(id, &catalog_choice("s2-grid-uae-2023"), catalog)
      .unwrap();
    assert!(first.superseded.is_none());

    let second = inv
      .apply_factor(id, &catalog_choice("s2-grid-iea-world"), catalog)
      .unwrap();
    assert_eq!(
      second.superseded.map(|s| s.applied_factor_id),
      Some(first.applied.applied_factor_id)
    );
    assert_eq!(inv.applied_factors().len(), 1);
    assert_eq!(
      inv.applied_factor_for(id).unwrap().factor.catalog_id(),
      Some("s2-grid-iea-world")
    );
  }

  #[test]
  fn forced_selection_is_kept_with_its_errors() {
    let catalog = builtin().unwrap();
    let mut inv = Inventory::new();
    let record = ActivityRecord::new(Scope::Scope1, "generator fuel", 100.0, "L");
    let id = record.record_id;
    inv.insert_record(record).unwrap();

    let outcome = inv
      .apply_factor(id, &catalog_choice("s1-diesel-stationary"), catalog)
      .unwrap();
    assert!(!outcome.validation.is_valid);
    assert!(outcome.applied.forced);
    assert!(
      outcome
        .applied
        .issues
        .iter()
        .any(|i| i.kind == IssueKind::SourceNotApplicable)
    );
    assert!((outcome.applied.calculated_emissions - 0.268).abs() < 1e-9);
  }

  #[test]
  fn unconvertible_unit_is_a_hard_error() {
    let catalog = builtin().unwrap();
    let mut inv = Inventory::new();
    let record = ActivityRecord::new(Scope::Scope1, "natural-gas", 10.0, "km");
    let id = record.record_id;
    inv.insert_record(record).unwrap();

    let err = inv
      .apply_factor(id, &catalog_choice("s1-natural-gas-volume"), catalog)
      .unwrap_err();
    assert!(err.is_unit_mismatch());
    assert!(inv.applied_factor_for(id).is_none());
  }

  #[test]
  fn removing_a_record_destroys_its_factor() {
    let mut inv = Inventory::new();
    let record = ActivityRecord::new(Scope::Scope1, "diesel", 10.0, "L");
    let id = record.record_id;
    inv.insert_record(record).unwrap();
    inv
      .apply_resolved(
        id,
        ResolvedFactor::Custom(CustomFactor::new(2.68, "kgCO2e/L").unwrap()),
      )
      .unwrap();

    inv.remove_record(id).unwrap();
    assert!(inv.applied_factors().is_empty());
    assert!(matches!(inv.remove_record(id), Err(Error::RecordNotFound(_))));
  }

  #[test]
  fn editing_a_record_refreshes_its_factor() {
    let mut inv = Inventory::new();
    let record = ActivityRecord::new(Scope::Scope1, "diesel", 1000.0, "L");
    let id = record.record_id;
    inv.insert_record(record.clone()).unwrap();
    inv
      .apply_resolved(
        id,
        ResolvedFactor::Custom(CustomFactor::new(2.68, "kgCO2e/L").unwrap()),
      )
      .unwrap();

    let mut edited = record;
    edited.amount = 2000.0;
    let previous = inv.upsert_record(edited).unwrap();
    assert_eq!(previous.amount, 1000.0);

    let af = inv.applied_factor_for(id).unwrap();
    assert_eq!(af.activity_amount, 2000.0);
    assert!((af.calculated_emissions - 5.36).abs() < 1e-9);
  }

  #[test]
  fn duplicate_records_and_bad_facilities_are_rejected() {
    let mut inv = Inventory::new();
    let record = ActivityRecord::new(Scope::Scope1, "diesel", 1.0, "L");
    inv.insert_record(record.clone()).unwrap();
    assert!(matches!(inv.insert_record(record), Err(Error::DuplicateRecord(_))));
    assert!(matches!(
      inv.add_facility(Facility::new("Bad", -1.0)),
      Err(Error::InvalidOwnership(_))
    ));
  }

  #[test]
  fn deserialising_keeps_only_the_latest_factor_per_record() {
    let record = ActivityRecord::new(Scope::Scope1, "diesel", 1000.0, "L");
    let factor = ResolvedFactor::Custom(CustomFactor::new(1.0, "tCO2e/m3").unwrap());
    let older = AppliedFactor::new(&record, factor.clone(), Utc::now()).unwrap();
    let mut newer = AppliedFactor::new(&record, factor, Utc::now()).unwrap();
    newer.applied_at = older.applied_at + chrono::Duration::seconds(5);

    let parts = InventoryParts {
      records:         vec![record],
      applied_factors: vec![newer.clone(), older],
      facilities:      vec![],
    };
    let json = serde_json::to_string(&parts).unwrap();
    let inv: Inventory = serde_json::from_str(&json).unwrap();
    assert_eq!(inv.applied_factors(), &[newer]);
  }

  #[test]
  fn applied_factor_for_unknown_record_is_rejected() {
    let stray = ActivityRecord::new(Scope::Scope1, "diesel", 1.0, "L");
    let factor = ResolvedFactor::Custom(CustomFactor::new(1.0, "tCO2e/L").unwrap());
    let af = AppliedFactor::new(&stray, factor, Utc::now()).unwrap();
    let err = Inventory::from_parts(vec![], vec![af], vec![]).unwrap_err();
    assert!(matches!(err, Error::RecordNotFound(_)));
  }

  #[test]
  fn editing_a_record_revalidates_its_factor() {
    let catalog = builtin().unwrap();
    let mut inv = Inventory::new();
    let record = ActivityRecord::new(Scope::Scope1, "diesel", 100.0, "L");
    let id = record.record_id;
    inv.insert_record(record.clone()).unwrap();
    let outcome = inv
      .apply_factor(id, &catalog_choice("s1-diesel-stationary"), catalog)
      .unwrap();
    assert!(!outcome.applied.forced);
    assert!(outcome.applied.issues.is_empty());

    let mut edited = record.clone();
    edited.source = "waste".into();
    inv.upsert_record(edited);
    let af = inv.applied_factor_for(id).unwrap();
    assert!(af.forced);
    assert!(af.issues.iter().any(|i| i.kind == IssueKind::SourceNotApplicable));

    inv.upsert_record(record);
    let af = inv.applied_factor_for(id).unwrap();
    assert!(!af.forced);
    assert!(af.issues.is_empty());
  }

  #[test]
  fn facility_names_must_be_unique() {
    let mut inv = Inventory::new();
    let plant = Facility::new("Plant A", 100.0);
    inv.add_facility(plant.clone()).unwrap();
    assert!(matches!(
      inv.add_facility(Facility::new(" Plant A ", 50.0)),
      Err(Error::DuplicateFacility(ref name)) if name == "Plant A"
    ));

    // Replacing a facility under its own id keeps its name.
    let mut renamed = plant;
    renamed.ownership_percentage = 60.0;
    inv.add_facility(renamed).unwrap();
    assert_eq!(inv.facilities().len(), 1);
    assert_eq!(inv.facilities()[0].ownership_percentage, 60.0);

    let err = Inventory::from_parts(
      vec![],
      vec![],
      vec![Facility::new("A", 100.0), Facility::new("A", 100.0)],
    )
    .unwrap_err();
    assert!(matches!(err, Error::DuplicateFacility(_)));
  }

  #[test]
  fn unfactored_records_shrink_as_factors_are_applied() {
    let mut inv = Inventory::new();
    let diesel = ActivityRecord::new(Scope::Scope1, "diesel", 10.0, "L");
    let gas = ActivityRecord::new(Scope::Scope1, "natural-gas", 5.0, "m3");
    let (diesel_id, gas_id) = (diesel.record_id, gas.record_id);
    inv.insert_record(diesel).unwrap();
    inv.insert_record(gas).unwrap();

    let ids = |inv: &Inventory| -> Vec<Uuid> {
      inv.unfactored_records().map(|r| r.record_id).collect()
    };
    assert_eq!(ids(&inv), vec![diesel_id, gas_id]);

    inv
      .apply_resolved(
        diesel_id,
        ResolvedFactor::Custom(CustomFactor::new(2.68, "kgCO2e/L").unwrap()),
      )
      .unwrap();
    assert_eq!(ids(&inv), vec![gas_id]);

    inv.clear_factor(diesel_id);
    assert_eq!(ids(&inv), vec![diesel_id, gas_id]);
  }

  #[test]
  fn removing_a_facility_makes_the_result_stale() {
    let mut inv = Inventory::new();
    let plant = Facility::new("Plant", 50.0);
    let plant_id = plant.facility_id;
    inv.add_facility(plant).unwrap();
    let record =
      ActivityRecord::new(Scope::Scope1, "diesel", 1000.0, "L").at_facility("Plant");
    let id = record.record_id;
    inv.insert_record(record).unwrap();
    inv
      .apply_resolved(
        id,
        ResolvedFactor::Custom(CustomFactor::new(1.0, "tCO2e/m3").unwrap()),
      )
      .unwrap();

    let mut tracker = StalenessTracker::new();
    assert_eq!(tracker.recalculate(&inv).by_facility.len(), 1);
    assert_eq!(tracker.revalidate(&inv), CalculationState::Calculated);

    let removed = inv.remove_facility(plant_id).unwrap();
    assert_eq!(removed.name, "Plant");
    assert!(inv.facilities().is_empty());
    assert!(matches!(
      inv.remove_facility(plant_id),
      Err(Error::FacilityNotFound(_))
    ));

    assert_eq!(tracker.revalidate(&inv), CalculationState::Stale);
    assert!(tracker.result().is_none());
    assert!(tracker.recalculate(&inv).by_facility.is_empty());
  }

  #[test]
  fn parts_survive_a_round_trip() {
    let mut inv = Inventory::new();
    let plant = Facility::new("Plant", 75.0);
    inv.add_facility(plant.clone()).unwrap();
    let record = ActivityRecord::new(Scope::Scope2, "grid-electricity", 10.0, "MWh");
    let id = record.record_id;
    inv.insert_record(record.clone()).unwrap();
    inv
      .apply_factor(id, &catalog_choice("s2-grid-uae-2023"), builtin().unwrap())
      .unwrap();
    let fingerprint = inv.fingerprint();

    let parts = inv.clone().into_parts();
    assert_eq!(parts.records, vec![record]);
    assert_eq!(parts.facilities, vec![plant]);
    assert_eq!(parts.applied_factors.len(), 1);
    assert_eq!(parts.applied_factors[0].record_id, id);

    let rebuilt =
      Inventory::from_parts(parts.records, parts.applied_factors, parts.facilities)
        .unwrap();
    assert_eq!(rebuilt, inv);
    assert_eq!(rebuilt.fingerprint(), fingerprint);
  }
}
