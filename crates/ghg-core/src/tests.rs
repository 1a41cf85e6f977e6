//! End-to-end scenarios over the public engine surface.

use chrono::{TimeZone, Utc};

use crate::{
  activity::{ActivityRecord, Facility},
  aggregate::{CalculationResult, FailureKind},
  calculate::calculate,
  catalog::builtin,
  factor::{CustomFactor, FactorChoice, ResolvedFactor},
  inventory::Inventory,
  scope::Scope,
  staleness::{CalculationState, StalenessTracker},
  Error,
};

const TOLERANCE: f64 = 1e-9;

fn assert_close(actual: f64, expected: f64) {
  assert!(
    (actual - expected).abs() < TOLERANCE,
    "expected {expected}, got {actual}"
  );
}

fn custom(value: f64, unit: &str) -> ResolvedFactor {
  ResolvedFactor::Custom(CustomFactor::new(value, unit).unwrap())
}

/// Inventory with one record per scope, each with a factor applied.
fn mixed_inventory() -> Inventory {
  let catalog = builtin().unwrap();
  let mut inv = Inventory::new();
  inv.add_facility(Facility::new("Head Office", 100.0)).unwrap();

  let gas = ActivityRecord::new(Scope::Scope1, "natural gas", 12_000.0, "m³")
    .at_facility("Head Office");
  let power = ActivityRecord::new(Scope::Scope2, "grid-electricity", 250_000.0, "kWh")
    .at_facility("Head Office");
  let flights = ActivityRecord::new(Scope::Scope3, "air-travel", 40_000.0, "km")
    .in_category("Business travel");

  for (record, factor_id) in [
    (gas, "s1-natural-gas-volume"),
    (power, "s2-grid-uae-2023"),
    (flights, "s3-air-travel"),
  ] {
    let id = record.record_id;
    inv.insert_record(record).unwrap();
    inv
      .apply_factor(id, &FactorChoice::Catalog { factor_id: factor_id.into() }, catalog)
      .unwrap();
  }
  inv
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[test]
fn scenario_a_grid_electricity_in_kwh() {
  let catalog = builtin().unwrap();
  let factor = catalog
    .resolve(&FactorChoice::Catalog { factor_id: "s2-grid-uae-2023".into() })
    .unwrap();
  assert_eq!(factor.value(), 0.4772);
  assert_eq!(factor.unit(), "tCO2e/MWh");

  let record =
    ActivityRecord::new(Scope::Scope2, "grid-electricity", 50_000.0, "kWh");
  assert_close(calculate(&record, &factor).unwrap(), 23.86);
}

#[test]
fn scenario_b_ownership_prorating() {
  let mut inv = Inventory::new();
  inv.add_facility(Facility::new("A", 100.0)).unwrap();
  inv.add_facility(Facility::new("B", 50.0)).unwrap();

  for name in ["A", "B"] {
    let record =
      ActivityRecord::new(Scope::Scope1, "diesel", 10.0, "t").at_facility(name);
    let id = record.record_id;
    inv.insert_record(record).unwrap();
    inv.apply_resolved(id, custom(1.0, "tCO2e/t")).unwrap();
  }

  let result = inv.aggregate();
  let rows: Vec<(&str, f64)> = result
    .by_facility
    .iter()
    .map(|f| (f.facility.as_str(), f.scope1))
    .collect();
  assert_eq!(rows.len(), 2);
  assert_eq!(rows[0].0, "A");
  assert_close(rows[0].1, 10.0);
  assert_eq!(rows[1].0, "B");
  assert_close(rows[1].1, 5.0);
  // Scope totals are not prorated.
  assert_close(result.scope1_total, 20.0);
}

#[test]
fn scenario_c_empty_inventory() {
  let result = Inventory::new().aggregate();
  assert_eq!(result.total_emissions, 0.0);
  assert_eq!(result.scope1_total, 0.0);
  assert_eq!(result.scope2_total, 0.0);
  assert_eq!(result.scope3_total, 0.0);
  assert_eq!(result.by_category.len(), 3);
  assert!(result.by_category.iter().all(|c| c.percentage == 0.0 && c.amount == 0.0));
  assert!(result.failures.is_empty());
  assert!(result.is_complete());
}

#[test]
fn scenario_d_custom_factor_with_litres() {
  let record = ActivityRecord::new(Scope::Scope1, "generator fuel", 500.0, "liters");
  assert_close(calculate(&record, &custom(2.67, "tCO2e/m3")).unwrap(), 1.335);
}

// ─── Properties ──────────────────────────────────────────────────────────────

#[test]
fn aggregation_is_idempotent() {
  let inv = mixed_inventory();
  let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
  assert_eq!(inv.aggregate_at(at), inv.aggregate_at(at));

  let mut first = inv.aggregate();
  let second = inv.aggregate();
  first.calculated_at = second.calculated_at;
  assert_eq!(first, second);
}

#[test]
fn totals_are_conserved_and_percentages_sum_to_100() {
  let result = mixed_inventory().aggregate();
  assert!(result.total_emissions > 0.0);
  assert_close(
    result.total_emissions,
    result.scope1_total + result.scope2_total + result.scope3_total,
  );
  let pct: f64 = result.by_category.iter().map(|c| c.percentage).sum();
  assert!((pct - 100.0).abs() <= 0.1, "percentages sum to {pct}");

  // 12 000 m³ × 0.00202 + 250 MWh × 0.4772 + 40 000 km × 0.158 kg
  assert_close(result.scope1_total, 24.24);
  assert_close(result.scope2_total, 119.3);
  assert_close(result.scope3_total, 6.32);
}

#[test]
fn category_labels_are_fixed() {
  let labels: Vec<String> = mixed_inventory()
    .aggregate()
    .by_category
    .into_iter()
    .map(|c| c.category)
    .collect();
  assert_eq!(labels, vec![
    "Direct – Scope 1",
    "Energy Indirect – Scope 2",
    "Other Indirect – Scope 3",
  ]);
}

#[test]
fn facility_without_records_gets_zero_row() {
  let mut inv = mixed_inventory();
  inv.add_facility(Facility::new("Warehouse", 100.0)).unwrap();
  let result = inv.aggregate();
  let warehouse = result
    .by_facility
    .iter()
    .find(|f| f.facility == "Warehouse")
    .unwrap();
  assert_eq!(warehouse.total, 0.0);

  let office = result
    .by_facility
    .iter()
    .find(|f| f.facility == "Head Office")
    .unwrap();
  assert_close(office.scope1, result.scope1_total);
  assert_close(office.scope2, result.scope2_total);
}

#[test]
fn unfactored_records_make_totals_a_lower_bound() {
  let mut inv = mixed_inventory();
  let pending = ActivityRecord::new(Scope::Scope1, "diesel", 400.0, "L");
  let pending_id = pending.record_id;
  let before = inv.aggregate().total_emissions;
  inv.insert_record(pending).unwrap();

  let result = inv.aggregate();
  assert_close(result.total_emissions, before);
  assert_eq!(result.unfactored_records, vec![pending_id]);
  assert!(!result.is_complete());
}

#[test]
fn unit_safety_km_against_cubic_metres() {
  let record = ActivityRecord::new(Scope::Scope1, "natural-gas", 10.0, "km");
  let err = calculate(&record, &custom(0.00202, "tCO2e/m³")).unwrap_err();
  assert!(matches!(err, Error::UnitMismatch { .. }));
}

#[test]
fn mismatched_record_is_excluded_not_fatal() {
  let mut inv = mixed_inventory();
  let gas_id = inv.records()[0].record_id;
  let mut edited = inv.records()[0].clone();
  edited.unit = "km".into();
  inv.upsert_record(edited);

  let result = inv.aggregate();
  assert_eq!(result.failures.len(), 1);
  assert_eq!(result.failures[0].record_id, gas_id);
  assert_eq!(result.failures[0].kind, FailureKind::UnitMismatch);
  assert_eq!(result.scope1_total, 0.0);
  assert!(result.scope2_total > 0.0);
  assert_eq!(
    result.exclusion_summary().as_deref(),
    Some("1 of 3 records excluded due to unit mismatch")
  );
}

// ─── Staleness ───────────────────────────────────────────────────────────────

#[test]
fn tracker_cycles_through_states() {
  let mut inv = mixed_inventory();
  let mut tracker = StalenessTracker::new();
  assert_eq!(tracker.state(), CalculationState::Uncalculated);

  tracker.recalculate(&inv);
  assert_eq!(tracker.state(), CalculationState::Calculated);
  assert_eq!(tracker.revalidate(&inv), CalculationState::Calculated);
  assert!(tracker.result().is_some());

  inv.insert_record(ActivityRecord::new(Scope::Scope3, "waste", 1.0, "t")).unwrap();
  assert_eq!(tracker.revalidate(&inv), CalculationState::Stale);
  assert!(tracker.result().is_none());

  tracker.recalculate(&inv);
  assert_eq!(tracker.state(), CalculationState::Calculated);
  assert_eq!(tracker.result().unwrap().record_count, 4);
}

#[test]
fn editing_or_removing_a_record_goes_stale() {
  for mutate in [
    (|inv: &mut Inventory| {
      let mut r = inv.records()[1].clone();
      r.amount += 1.0;
      inv.upsert_record(r);
    }) as fn(&mut Inventory),
    |inv: &mut Inventory| {
      let id = inv.records()[2].record_id;
      inv.remove_record(id).unwrap();
    },
  ] {
    let mut inv = mixed_inventory();
    let mut tracker = StalenessTracker::new();
    tracker.recalculate(&inv);
    mutate(&mut inv);
    assert_eq!(tracker.revalidate(&inv), CalculationState::Stale);
  }
}

#[test]
fn stale_stays_stale_until_recalculated() {
  let mut inv = mixed_inventory();
  let mut tracker = StalenessTracker::new();
  tracker.recalculate(&inv);

  let extra = ActivityRecord::new(Scope::Scope1, "diesel", 1.0, "L");
  let extra_id = extra.record_id;
  inv.insert_record(extra).unwrap();
  assert_eq!(tracker.revalidate(&inv), CalculationState::Stale);

  // Undoing the edit does not revive a cleared result.
  inv.remove_record(extra_id).unwrap();
  assert_eq!(tracker.revalidate(&inv), CalculationState::Stale);
  assert!(tracker.result().is_none());
}

#[test]
fn stale_result_is_cleared_before_reuse() {
  let mut inv = mixed_inventory();
  let mut tracker = StalenessTracker::new();
  tracker.recalculate(&inv);
  inv.insert_record(ActivityRecord::new(Scope::Scope1, "lpg", 3.0, "kg")).unwrap();
  tracker.revalidate(&inv);

  let json = serde_json::to_value(&tracker).unwrap();
  let held: CalculationResult =
    serde_json::from_value(json["result"].clone()).unwrap();
  assert!(held.is_cleared());
  assert_eq!(held.total_emissions, 0.0);
}
