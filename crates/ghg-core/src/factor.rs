//! Emission factors — catalog entries and caller-supplied custom factors.
//!
//! A factor is a multiplier from an activity quantity to an emissions mass.
//! Its compound unit (`"tCO2e/MWh"`, `"kgCO2e/kg"`) is parsed once into a
//! [`FactorUnit`] so that both sides of the ratio are known explicitly.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  scope::Scope,
  units::{self, UnitFamily},
};

// ─── Applicability ───────────────────────────────────────────────────────────

/// One `(source, units)` pair a catalog factor is declared for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicabilityRule {
  /// Emission-source key, e.g. `"natural-gas"`.
  pub source: String,
  /// Activity units this rule accepts, e.g. `["m3"]`.
  pub units:  BTreeSet<String>,
}

// ─── Compound unit ───────────────────────────────────────────────────────────

/// A parsed `<mass>CO2e/<activity unit>` factor unit.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorUnit {
  /// Mass symbol of the numerator (`"t"`, `"kg"`, `"g"`).
  pub emissions_mass: String,
  /// Tonnes per one numerator unit (1.0 for tCO2e, 0.001 for kgCO2e).
  pub tonnes_per_unit: f64,
  /// The activity unit the factor is expressed against, as declared.
  pub activity_unit: String,
}

impl FactorUnit {
  pub fn parse(raw: &str) -> Result<Self> {
    let malformed = || Error::MalformedFactorUnit(raw.to_string());

    let (numerator, denominator) = raw.split_once('/').ok_or_else(malformed)?;
    let denominator = denominator.trim();
    if denominator.is_empty() || denominator.contains('/') {
      return Err(malformed());
    }

    let numerator = numerator.trim();
    let mass = ["CO2e", "CO2-e", "CO2eq", "CO2"]
      .iter()
      .find_map(|suffix| strip_suffix_ignore_case(numerator, suffix))
      .ok_or_else(malformed)?;

    let def = units::lookup(mass)
      .filter(|def| def.family == UnitFamily::Mass)
      .ok_or_else(malformed)?;

    Ok(Self {
      emissions_mass:  def.symbol.to_string(),
      tonnes_per_unit: def.to_base / 1000.0,
      activity_unit:   denominator.to_string(),
    })
  }
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
  let split = s.len().checked_sub(suffix.len())?;
  let (head, tail) = s.split_at_checked(split)?;
  (tail.eq_ignore_ascii_case(suffix) && !head.is_empty()).then_some(head)
}

fn check_value(factor_id: &str, value: f64) -> Result<()> {
  if value.is_finite() && value >= 0.0 {
    Ok(())
  } else {
    Err(Error::InvalidFactorValue { factor_id: factor_id.to_string(), value })
  }
}

// ─── Catalog factor ──────────────────────────────────────────────────────────

/// A curated emission factor from the catalog. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionFactor {
  pub id:         String,
  pub scope:      Scope,
  pub name:       String,
  pub year:       u16,
  pub value:      f64,
  /// Compound unit, e.g. `"tCO2e/MWh"`.
  pub unit:       String,
  pub applies_to: Vec<ApplicabilityRule>,
  /// Issuing body, e.g. `"IPCC"`.
  pub authority:  String,
  #[serde(default)]
  pub notes:      String,
  #[serde(default)]
  pub certified:  bool,
}

impl EmissionFactor {
  /// Registration-time checks: non-negative finite value, at least one
  /// applicability rule, a parseable unit, and rule units that convert into
  /// that unit's activity basis.
  pub fn validate(&self) -> Result<()> {
    check_value(&self.id, self.value)?;
    if self.applies_to.is_empty() {
      return Err(Error::EmptyApplicability(self.id.clone()));
    }
    let basis = self.parsed_unit()?.activity_unit;
    if let Some(unit) = self
      .applies_to
      .iter()
      .flat_map(|rule| rule.units.iter())
      .find(|u| !units::convertible(u, &basis))
    {
      return Err(Error::InapplicableRuleUnit {
        factor_id: self.id.clone(),
        unit:      unit.clone(),
        basis,
      });
    }
    Ok(())
  }

  pub fn parsed_unit(&self) -> Result<FactorUnit> { FactorUnit::parse(&self.unit) }
}

// ─── Custom factor ───────────────────────────────────────────────────────────

/// A manual factor entered by the caller. Never certified and never checked
/// for applicability, but still unit-checked at calculation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomFactor {
  pub value: f64,
  pub unit:  String,
  /// Optional human label for reports.
  #[serde(default)]
  pub label: Option<String>,
}

impl CustomFactor {
  pub fn new(value: f64, unit: impl Into<String>) -> Result<Self> {
    let factor = Self { value, unit: unit.into(), label: None };
    factor.validate()?;
    Ok(factor)
  }

  pub fn validate(&self) -> Result<()> {
    check_value("custom", self.value)?;
    FactorUnit::parse(&self.unit)?;
    Ok(())
  }
}

// ─── Choice and resolution ───────────────────────────────────────────────────

/// What a caller picks for a record: a catalog id or an inline factor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FactorChoice {
  Catalog { factor_id: String },
  Custom(CustomFactor),
}

/// A factor resolved to its full definition. Applied factors keep this
/// snapshot so reports can show provenance without the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "factor", rename_all = "snake_case")]
pub enum ResolvedFactor {
  Catalog(EmissionFactor),
  Custom(CustomFactor),
}

impl ResolvedFactor {
  pub fn value(&self) -> f64 {
    match self {
      Self::Catalog(f) => f.value,
      Self::Custom(f) => f.value,
    }
  }

  pub fn unit(&self) -> &str {
    match self {
      Self::Catalog(f) => &f.unit,
      Self::Custom(f) => &f.unit,
    }
  }

  /// Catalog id, or `None` for custom factors.
  pub fn catalog_id(&self) -> Option<&str> {
    match self {
      Self::Catalog(f) => Some(&f.id),
      Self::Custom(_) => None,
    }
  }

  pub fn is_certified(&self) -> bool {
    matches!(self, Self::Catalog(f) if f.certified)
  }

  pub fn is_custom(&self) -> bool { matches!(self, Self::Custom(_)) }

  pub fn validate(&self) -> Result<()> {
    match self {
      Self::Catalog(f) => f.validate(),
      Self::Custom(f) => f.validate(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn factor(value: f64, unit: &str) -> EmissionFactor {
    EmissionFactor {
      id:         "test".into(),
      scope:      Scope::Scope1,
      name:       "Test".into(),
      year:       2024,
      value,
      unit:       unit.into(),
      applies_to: vec![ApplicabilityRule {
        source: "diesel".into(),
        units:  ["L".to_string()].into(),
      }],
      authority:  "Test".into(),
      notes:      String::new(),
      certified:  true,
    }
  }

  #[test]
  fn parses_tonne_and_kilogram_numerators() {
    let t = FactorUnit::parse("tCO2e/MWh").unwrap();
    assert_eq!(t.emissions_mass, "t");
    assert_eq!(t.tonnes_per_unit, 1.0);
    assert_eq!(t.activity_unit, "MWh");

    let kg = FactorUnit::parse("kgCO2e / kg").unwrap();
    assert_eq!(kg.emissions_mass, "kg");
    assert!((kg.tonnes_per_unit - 0.001).abs() < 1e-12);
    assert_eq!(kg.activity_unit, "kg");
  }

  #[test]
  fn rejects_malformed_units() {
    for raw in ["tCO2e", "CO2e/kWh", "kWh/MWh", "tCO2e/", "tCO2e/a/b"] {
      assert!(
        matches!(FactorUnit::parse(raw), Err(Error::MalformedFactorUnit(_))),
        "{raw} should be malformed"
      );
    }
  }

  #[test]
  fn negative_and_non_finite_values_are_rejected() {
    assert!(matches!(
      factor(-1.0, "tCO2e/L").validate(),
      Err(Error::InvalidFactorValue { .. })
    ));
    assert!(factor(f64::NAN, "tCO2e/L").validate().is_err());
    assert!(CustomFactor::new(f64::INFINITY, "tCO2e/L").is_err());
    assert!(factor(0.0, "tCO2e/L").validate().is_ok());
  }

  #[test]
  fn empty_applicability_is_rejected() {
    let mut f = factor(1.0, "tCO2e/L");
    f.applies_to.clear();
    assert!(matches!(f.validate(), Err(Error::EmptyApplicability(_))));
  }

  #[test]
  fn rule_units_must_convert_to_the_factor_basis() {
    let mut f = factor(1.0, "tCO2e/m3");
    assert!(f.validate().is_ok());
    assert_eq!(f.parsed_unit().unwrap().activity_unit, "m3");

    f.applies_to[0].units.insert("km".into());
    assert!(matches!(
      f.validate(),
      Err(Error::InapplicableRuleUnit { ref unit, ref basis, .. })
        if unit == "km" && basis == "m3"
    ));
  }

  #[test]
  fn custom_factors_are_never_certified() {
    let custom = ResolvedFactor::Custom(CustomFactor::new(2.67, "tCO2e/m3").unwrap());
    assert!(!custom.is_certified());
    assert!(custom.is_custom());
    assert_eq!(custom.catalog_id(), None);
    assert!(ResolvedFactor::Catalog(factor(1.0, "tCO2e/L")).is_certified());
  }

  #[test]
  fn choice_round_trips_through_json() {
    let json = r#"{"kind":"catalog","factor_id":"s2-grid"}"#;
    let choice: FactorChoice = serde_json::from_str(json).unwrap();
    assert_eq!(choice, FactorChoice::Catalog { factor_id: "s2-grid".into() });

    let json = r#"{"kind":"custom","value":2.67,"unit":"tCO2e/m3"}"#;
    let choice: FactorChoice = serde_json::from_str(json).unwrap();
    assert!(matches!(choice, FactorChoice::Custom(ref c) if c.value == 2.67));
  }
}
