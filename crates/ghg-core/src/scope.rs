//! Scope — the GHG Protocol partition every factor and record belongs to.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Which GHG Protocol scope an emission source falls under.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Scope {
  /// Direct emissions from owned or controlled sources.
  Scope1,
  /// Indirect emissions from purchased energy.
  Scope2,
  /// All other indirect emissions in the value chain.
  Scope3,
}

impl Scope {
  /// The fixed label used for this scope in the category breakdown.
  pub fn category_label(self) -> &'static str {
    match self {
      Self::Scope1 => "Direct – Scope 1",
      Self::Scope2 => "Energy Indirect – Scope 2",
      Self::Scope3 => "Other Indirect – Scope 3",
    }
  }

  /// Whether emissions in this scope are attributed to facilities.
  pub fn has_facility_attribution(self) -> bool {
    matches!(self, Self::Scope1 | Self::Scope2)
  }
}
