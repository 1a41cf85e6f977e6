//! Single-record emissions calculation.

use serde::{Deserialize, Serialize};

use crate::{
  Result,
  activity::ActivityRecord,
  factor::{FactorUnit, ResolvedFactor},
  units,
};

/// The worked result of applying one factor to one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calculation {
  /// Emissions in tCO2e.
  pub emissions:         f64,
  /// Activity amount expressed in `basis_unit`.
  pub converted_amount:  f64,
  /// Multiplier applied to the record's amount to reach `basis_unit`.
  pub conversion_factor: f64,
  /// The activity unit the factor is expressed against.
  pub basis_unit:        String,
}

/// Emissions in tCO2e for `record` under `factor`.
///
/// Fails with [`crate::Error::UnitMismatch`] or [`crate::Error::UnknownUnit`]
/// when the record's unit cannot be brought onto the factor's basis.
pub fn calculate(record: &ActivityRecord, factor: &ResolvedFactor) -> Result<f64> {
  calculate_detailed(record, factor).map(|c| c.emissions)
}

/// Like [`calculate`], but keeps the intermediate conversion.
pub fn calculate_detailed(
  record: &ActivityRecord,
  factor: &ResolvedFactor,
) -> Result<Calculation> {
  record.validate()?;
  factor.validate()?;

  let unit = FactorUnit::parse(factor.unit())?;
  let conversion_factor =
    units::conversion_factor(&record.unit, &unit.activity_unit)?;
  let converted_amount = record.amount * conversion_factor;
  let emissions = converted_amount * factor.value() * unit.tonnes_per_unit;

  Ok(Calculation {
    emissions,
    converted_amount,
    conversion_factor,
    basis_unit: unit.activity_unit,
  })
}
