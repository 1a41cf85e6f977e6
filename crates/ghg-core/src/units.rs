//! Unit families and linear conversion between units of the same family.
//!
//! Every unit maps to a multiplier onto its family's base unit; converting
//! between two units of one family is the ratio of their multipliers. There
//! are no offset conversions in this domain.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{
  Error, Result,
  normalize::{canonical_unit, fold_unit},
};

/// AED per USD at the UAE dirham peg.
pub const AED_PER_USD: f64 = 3.6725;

/// A physical (or monetary) dimension; units convert only within one family.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UnitFamily {
  /// Base: kg.
  Mass,
  /// Base: kWh.
  Energy,
  /// Base: L.
  Volume,
  /// Base: km.
  Distance,
  /// Base: USD. Spend-based factors only.
  Currency,
}

/// One row of the unit table.
#[derive(Debug)]
pub struct UnitDef {
  pub symbol:  &'static str,
  pub family:  UnitFamily,
  /// Multiplier onto the family's base unit.
  pub to_base: f64,
  /// Folded (lower-case) alternative spellings.
  aliases:     &'static [&'static str],
}

const fn unit(
  symbol: &'static str,
  family: UnitFamily,
  to_base: f64,
  aliases: &'static [&'static str],
) -> UnitDef {
  UnitDef { symbol, family, to_base, aliases }
}

static UNITS: &[UnitDef] = &[
  // Mass
  unit("g", UnitFamily::Mass, 0.001, &["gram", "grams"]),
  unit("kg", UnitFamily::Mass, 1.0, &["kgs", "kilogram", "kilograms"]),
  unit("t", UnitFamily::Mass, 1000.0, &[
    "tonne",
    "tonnes",
    "metric ton",
    "metric tons",
  ]),
  unit("lb", UnitFamily::Mass, 0.453_592_37, &["lbs", "pound", "pounds"]),
  // Energy
  unit("Wh", UnitFamily::Energy, 0.001, &[]),
  unit("kWh", UnitFamily::Energy, 1.0, &["kilowatt hour", "kilowatt hours"]),
  unit("MWh", UnitFamily::Energy, 1000.0, &[
    "megawatt hour",
    "megawatt hours",
  ]),
  unit("GWh", UnitFamily::Energy, 1_000_000.0, &[]),
  unit("MJ", UnitFamily::Energy, 1.0 / 3.6, &["megajoule", "megajoules"]),
  unit("GJ", UnitFamily::Energy, 1000.0 / 3.6, &["gigajoule", "gigajoules"]),
  unit("therm", UnitFamily::Energy, 29.307_107, &["therms"]),
  unit("MMBtu", UnitFamily::Energy, 293.071_07, &["mmbtu"]),
  // Volume
  unit("L", UnitFamily::Volume, 1.0, &[
    "liter", "liters", "litre", "litres", "ltr",
  ]),
  unit("m3", UnitFamily::Volume, 1000.0, &[
    "cubic meter",
    "cubic meters",
    "cubic metre",
    "cubic metres",
    "cbm",
  ]),
  unit("gal", UnitFamily::Volume, 3.785_411_784, &[
    "gallon",
    "gallons",
    "us gal",
  ]),
  // Distance
  unit("m", UnitFamily::Distance, 0.001, &["meter", "meters", "metre", "metres"]),
  unit("km", UnitFamily::Distance, 1.0, &[
    "kilometer",
    "kilometers",
    "kilometre",
    "kilometres",
  ]),
  unit("mi", UnitFamily::Distance, 1.609_344, &["mile", "miles"]),
  // Currency
  unit("USD", UnitFamily::Currency, 1.0, &["us$", "$"]),
  unit("AED", UnitFamily::Currency, 1.0 / AED_PER_USD, &["dhs", "dirham", "dirhams"]),
];

/// Look up a unit by symbol or alias, ignoring case and superscripts.
pub fn lookup(unit: &str) -> Option<&'static UnitDef> {
  let folded = fold_unit(unit);
  UNITS.iter().find(|def| {
    def.symbol.to_lowercase() == folded || def.aliases.contains(&folded.as_str())
  })
}

/// Multiplier that converts an amount in `from` into an amount in `to`.
///
/// Identical units (after canonicalisation) always convert 1:1, even when
/// they are not in the unit table. Otherwise both units must be known and
/// share a family.
pub fn conversion_factor(from: &str, to: &str) -> Result<f64> {
  if canonical_unit(from) == canonical_unit(to) {
    return Ok(1.0);
  }
  let from_def =
    lookup(from).ok_or_else(|| Error::UnknownUnit(from.to_string()))?;
  let to_def = lookup(to).ok_or_else(|| Error::UnknownUnit(to.to_string()))?;
  if from_def.family != to_def.family {
    return Err(Error::UnitMismatch {
      from: from_def.symbol.to_string(),
      to:   to_def.symbol.to_string(),
    });
  }
  Ok(from_def.to_base / to_def.to_base)
}

/// Convert `amount` from one unit to another.
pub fn convert(amount: f64, from: &str, to: &str) -> Result<f64> {
  Ok(amount * conversion_factor(from, to)?)
}

/// Whether [`conversion_factor`] would succeed for this pair.
pub fn convertible(from: &str, to: &str) -> bool {
  conversion_factor(from, to).is_ok()
}
