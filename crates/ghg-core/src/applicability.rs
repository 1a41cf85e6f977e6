//! Factor applicability, suggestion scoring, and selection validation.
//!
//! All three are pure queries over canonicalised source and unit keys. None
//! of them fails for well-formed input; "no match" is an empty or negative
//! answer.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::{
  catalog::FactorCatalog,
  factor::{ApplicabilityRule, EmissionFactor, ResolvedFactor},
  normalize::{canonical_unit, same_source},
  scope::Scope,
  units,
};

/// Score for a factor declared for this exact source and unit.
pub const SCORE_EXACT: u8 = 100;
/// Score for a source match whose unit converts to a declared unit.
pub const SCORE_CONVERTIBLE: u8 = 70;
/// Score for a source match with no usable unit.
pub const SCORE_SOURCE_ONLY: u8 = 40;

// ─── Applicability ───────────────────────────────────────────────────────────

fn rules_for_source<'a>(
  factor: &'a EmissionFactor,
  source: &'a str,
) -> impl Iterator<Item = &'a ApplicabilityRule> + 'a {
  factor
    .applies_to
    .iter()
    .filter(move |rule| same_source(&rule.source, source))
}

fn rule_declares_unit(rule: &ApplicabilityRule, unit: &str) -> bool {
  let unit = canonical_unit(unit);
  rule.units.iter().any(|u| canonical_unit(u) == unit)
}

/// True iff some rule names `source` and lists `unit` among its units.
pub fn factor_applies_to_activity(
  factor: &EmissionFactor,
  source: &str,
  unit: &str,
) -> bool {
  rules_for_source(factor, source).any(|rule| rule_declares_unit(rule, unit))
}

/// Whether any rule of `factor` names `source`, regardless of unit.
pub fn source_applies(factor: &EmissionFactor, source: &str) -> bool {
  rules_for_source(factor, source).next().is_some()
}

/// Whether `unit` can be converted into the unit basis the factor is
/// expressed against.
fn unit_convertible_to_factor(unit: &str, factor_unit: &str) -> bool {
  crate::factor::FactorUnit::parse(factor_unit)
    .is_ok_and(|parsed| units::convertible(unit, &parsed.activity_unit))
}

// ─── Suggestion ──────────────────────────────────────────────────────────────

/// A catalog factor ranked against an activity.
#[derive(Debug, Clone, Serialize)]
pub struct FactorSuggestion<'a> {
  pub factor: &'a EmissionFactor,
  pub score:  u8,
}

/// Score one factor against an activity, or `None` if the source does not
/// match at all.
pub fn score_factor(
  factor: &EmissionFactor,
  source: &str,
  unit: &str,
) -> Option<u8> {
  let rules: Vec<&ApplicabilityRule> = rules_for_source(factor, source).collect();
  if rules.is_empty() {
    return None;
  }
  if rules.iter().any(|rule| rule_declares_unit(rule, unit)) {
    return Some(SCORE_EXACT);
  }
  let convertible = rules
    .iter()
    .flat_map(|rule| rule.units.iter())
    .any(|declared| units::convertible(unit, declared))
    || unit_convertible_to_factor(unit, &factor.unit);
  Some(if convertible { SCORE_CONVERTIBLE } else { SCORE_SOURCE_ONLY })
}

/// Rank every catalog factor of `scope` against an activity.
///
/// Higher scores first; equal scores keep catalog order. Factors whose
/// source does not match are omitted.
pub fn suggested_factors<'a>(
  catalog: &'a FactorCatalog,
  source: &str,
  unit: &str,
  scope: Scope,
) -> Vec<FactorSuggestion<'a>> {
  let mut suggestions: Vec<FactorSuggestion<'a>> = catalog
    .factors_by_scope(scope)
    .into_iter()
    .filter_map(|factor| {
      score_factor(factor, source, unit)
        .map(|score| FactorSuggestion { factor, score })
    })
    .collect();
  // `sort_by` is stable, so ties stay in catalog order.
  suggestions.sort_by(|a, b| b.score.cmp(&a.score));
  suggestions
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// What kind of problem a selection has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum IssueKind {
  /// The factor is not declared for this source at all.
  SourceNotApplicable,
  /// The activity unit cannot be converted into the factor's unit basis.
  UnitNotConvertible,
  /// The activity unit is not declared but will be converted.
  UnitConverted,
  /// The factor belongs to a different scope than the activity.
  ScopeMismatch,
  /// The factor is custom or otherwise not certified.
  UncertifiedFactor,
}

/// A structured error or warning about a factor selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionIssue {
  pub kind:    IssueKind,
  pub message: String,
}

impl SelectionIssue {
  fn new(kind: IssueKind, message: impl Into<String>) -> Self {
    Self { kind, message: message.into() }
  }
}

/// Outcome of [`validate_factor_selection`].
///
/// An invalid selection is still permitted when the caller insists on it;
/// the issues are carried alongside so they are never dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionValidation {
  pub is_valid: bool,
  pub errors:   Vec<SelectionIssue>,
  pub warnings: Vec<SelectionIssue>,
}

impl SelectionValidation {
  /// Errors followed by warnings.
  pub fn issues(&self) -> impl Iterator<Item = &SelectionIssue> {
    self.errors.iter().chain(self.warnings.iter())
  }

  /// Add a warning if the factor's scope differs from the activity's.
  pub fn check_scope(&mut self, factor: &ResolvedFactor, scope: Scope) {
    if let ResolvedFactor::Catalog(f) = factor
      && f.scope != scope
    {
      self.warnings.push(SelectionIssue::new(
        IssueKind::ScopeMismatch,
        format!("factor {} is a {} factor, activity is {scope}", f.id, f.scope),
      ));
    }
  }
}

/// Check a selected factor against an activity's source and unit.
///
/// Only a catalog factor that does not name the source makes the selection
/// invalid; custom factors skip that check. A unit that cannot be converted
/// is a warning here and is refused later, when emissions are calculated.
pub fn validate_factor_selection(
  factor: &ResolvedFactor,
  source: &str,
  unit: &str,
) -> SelectionValidation {
  let mut errors = Vec::new();
  let mut warnings = Vec::new();

  let unit_ok = unit_convertible_to_factor(unit, factor.unit());

  match factor {
    ResolvedFactor::Catalog(f) => {
      if !source_applies(f, source) {
        errors.push(SelectionIssue::new(
          IssueKind::SourceNotApplicable,
          format!("factor {} does not apply to source {source:?}", f.id),
        ));
      } else if !factor_applies_to_activity(f, source, unit) && unit_ok {
        warnings.push(SelectionIssue::new(
          IssueKind::UnitConverted,
          format!(
            "{unit} is not declared for factor {}; it will be converted to {}",
            f.id,
            basis_unit(factor.unit()),
          ),
        ));
      }
      if !f.certified {
        warnings.push(SelectionIssue::new(
          IssueKind::UncertifiedFactor,
          format!("factor {} is not certified", f.id),
        ));
      }
    }
    ResolvedFactor::Custom(_) => {
      warnings.push(SelectionIssue::new(
        IssueKind::UncertifiedFactor,
        "custom factors are not certified",
      ));
      if unit_ok && !crate::normalize::same_unit(unit, &basis_unit(factor.unit()))
      {
        warnings.push(SelectionIssue::new(
          IssueKind::UnitConverted,
          format!("{unit} will be converted to {}", basis_unit(factor.unit())),
        ));
      }
    }
  }

  if !unit_ok {
    warnings.push(SelectionIssue::new(
      IssueKind::UnitNotConvertible,
      format!(
        "{unit} cannot be converted to {}",
        basis_unit(factor.unit())
      ),
    ));
  }

  SelectionValidation { is_valid: errors.is_empty(), errors, warnings }
}

/// The activity side of a factor unit, or the raw unit if it does not parse.
fn basis_unit(factor_unit: &str) -> String {
  crate::factor::FactorUnit::parse(factor_unit)
    .map(|u| u.activity_unit)
    .unwrap_or_else(|_| factor_unit.to_string())
}
