//! Canonical keys for emission sources and units.
//!
//! Applicability, suggestion scoring, and unit conversion all compare keys
//! produced here, never raw caller strings.

use crate::units;

/// Canonical form of an emission-source key.
///
/// Lower-cases, maps runs of whitespace, `_` and `/` to a single `-`, and
/// trims leading and trailing separators, so `"Natural Gas"`,
/// `"natural_gas"` and `"natural-gas"` all compare equal.
pub fn canonical_source(source: &str) -> String {
  let mut out = String::with_capacity(source.len());
  let mut pending_sep = false;
  for ch in source.trim().chars() {
    if ch.is_whitespace() || matches!(ch, '-' | '_' | '/') {
      pending_sep = !out.is_empty();
      continue;
    }
    if pending_sep {
      out.push('-');
      pending_sep = false;
    }
    out.extend(ch.to_lowercase());
  }
  out
}

/// Canonical form of a unit string.
///
/// Known units resolve to their table symbol (`"liters"` → `"L"`,
/// `"m³"` → `"m3"`). Unknown units fall back to their folded form so that
/// two spellings of the same unknown unit still compare equal.
pub fn canonical_unit(unit: &str) -> String {
  match units::lookup(unit) {
    Some(def) => def.symbol.to_string(),
    None => fold_unit(unit),
  }
}

/// Lower-case, superscript-free, single-spaced rendering of a unit string.
pub(crate) fn fold_unit(unit: &str) -> String {
  let replaced: String = unit
    .trim()
    .chars()
    .map(|ch| match ch {
      '³' => '3',
      '²' => '2',
      other => other,
    })
    .collect();
  replaced
    .split_whitespace()
    .collect::<Vec<_>>()
    .join(" ")
    .to_lowercase()
}

/// Whether two units are the same unit once canonicalised.
pub fn same_unit(a: &str, b: &str) -> bool {
  canonical_unit(a) == canonical_unit(b)
}

/// Whether two source keys name the same emission source.
pub fn same_source(a: &str, b: &str) -> bool {
  canonical_source(a) == canonical_source(b)
}
