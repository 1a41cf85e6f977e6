//! Error types for `ghg-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  /// The activity unit and the factor's activity unit are in different
  /// physical families (e.g. volume vs. distance).
  #[error("unit mismatch: cannot convert {from:?} to {to:?}")]
  UnitMismatch { from: String, to: String },

  #[error("unknown unit: {0:?}")]
  UnknownUnit(String),

  #[error("invalid value {value} for emission factor {factor_id:?}")]
  InvalidFactorValue { factor_id: String, value: f64 },

  #[error(
    "malformed factor unit {0:?}: expected <mass>CO2e/<activity unit>"
  )]
  MalformedFactorUnit(String),

  #[error(
    "emission factor {factor_id:?} declares unit {unit:?}, which does not \
     convert to its basis {basis:?}"
  )]
  InapplicableRuleUnit { factor_id: String, unit: String, basis: String },

  #[error("emission factor {0:?} declares no applicable sources")]
  EmptyApplicability(String),

  #[error("duplicate emission factor id: {0:?}")]
  DuplicateFactor(String),

  #[error("emission factor not found: {0:?}")]
  FactorNotFound(String),

  #[error("activity record not found: {0}")]
  RecordNotFound(Uuid),

  #[error("activity record already exists: {0}")]
  DuplicateRecord(Uuid),

  #[error("a facility named {0:?} already exists")]
  DuplicateFacility(String),

  #[error("facility not found: {0}")]
  FacilityNotFound(Uuid),

  #[error("invalid activity amount {amount} on record {record_id}")]
  InvalidAmount { record_id: Uuid, amount: f64 },

  #[error("ownership percentage {0} is outside 0..=100")]
  InvalidOwnership(f64),

  #[error("a factor catalog has already been installed")]
  CatalogAlreadyInstalled,

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// True for the errors that mean "these two units cannot be reconciled".
  pub fn is_unit_mismatch(&self) -> bool {
    matches!(self, Self::UnitMismatch { .. } | Self::UnknownUnit(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
