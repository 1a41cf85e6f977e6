//! Inputs owned by the activity ledger: consumption records and facilities.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, scope::Scope};

/// One line of consumption data, e.g. 50 000 kWh of grid electricity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
  pub record_id:   Uuid,
  pub scope:       Scope,
  /// Emission-source key, e.g. `"natural-gas"`.
  pub source:      String,
  /// Free-text scope-3 category; ignored for scopes 1 and 2.
  #[serde(default)]
  pub category:    Option<String>,
  pub amount:      f64,
  pub unit:        String,
  /// Name of the facility this activity happened at.
  #[serde(default)]
  pub facility:    Option<String>,
  #[serde(default)]
  pub description: String,
}

impl ActivityRecord {
  /// Convenience constructor with a fresh id and optional fields unset.
  pub fn new(
    scope: Scope,
    source: impl Into<String>,
    amount: f64,
    unit: impl Into<String>,
  ) -> Self {
    Self {
      record_id: Uuid::new_v4(),
      scope,
      source: source.into(),
      category: None,
      amount,
      unit: unit.into(),
      facility: None,
      description: String::new(),
    }
  }

  pub fn at_facility(mut self, facility: impl Into<String>) -> Self {
    self.facility = Some(facility.into());
    self
  }

  pub fn in_category(mut self, category: impl Into<String>) -> Self {
    self.category = Some(category.into());
    self
  }

  /// The amount must be a finite, non-negative number.
  pub fn validate(&self) -> Result<()> {
    if self.amount.is_finite() && self.amount >= 0.0 {
      Ok(())
    } else {
      Err(Error::InvalidAmount {
        record_id: self.record_id,
        amount:    self.amount,
      })
    }
  }
}

/// A site whose scope-1 and scope-2 emissions are reported pro rata to
/// ownership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
  pub facility_id:          Uuid,
  pub name:                 String,
  #[serde(default)]
  pub kind:                 String,
  /// Share owned by the reporting entity, 0–100.
  pub ownership_percentage: f64,
  #[serde(default)]
  pub address:              String,
}

impl Facility {
  pub fn new(name: impl Into<String>, ownership_percentage: f64) -> Self {
    Self {
      facility_id: Uuid::new_v4(),
      name: name.into(),
      kind: String::new(),
      ownership_percentage,
      address: String::new(),
    }
  }

  pub fn validate(&self) -> Result<()> {
    if (0.0..=100.0).contains(&self.ownership_percentage) {
      Ok(())
    } else {
      Err(Error::InvalidOwnership(self.ownership_percentage))
    }
  }

  /// Ownership as a fraction, clamped into `0.0..=1.0`.
  pub fn ownership_share(&self) -> f64 {
    if self.ownership_percentage.is_nan() {
      return 0.0;
    }
    self.ownership_percentage.clamp(0.0, 100.0) / 100.0
  }

  /// Whether a record's facility reference points at this facility.
  pub fn matches(&self, record: &ActivityRecord) -> bool {
    record
      .facility
      .as_deref()
      .is_some_and(|name| name.trim() == self.name.trim())
  }
}
