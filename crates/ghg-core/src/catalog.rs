//! The factor catalog: a versioned, validated, read-only set of emission
//! factors.
//!
//! A catalog is loaded once and frozen. The process-wide instance is either
//! the built-in catalog embedded in this crate or one supplied by the host
//! through [`install`] before first use.

use std::{collections::HashSet, sync::OnceLock};

use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  factor::{EmissionFactor, FactorChoice, ResolvedFactor},
  scope::Scope,
};

const BUILTIN_JSON: &str = include_str!("../catalog/factors.json");

static BUILTIN: OnceLock<FactorCatalog> = OnceLock::new();
static INSTALLED: OnceLock<FactorCatalog> = OnceLock::new();

// ─── Catalog ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactorCatalog {
  version: String,
  factors: Vec<EmissionFactor>,
}

impl FactorCatalog {
  /// Build a catalog, validating every factor at registration time.
  pub fn new(
    version: impl Into<String>,
    factors: Vec<EmissionFactor>,
  ) -> Result<Self> {
    let version = version.into();
    let mut seen = HashSet::with_capacity(factors.len());
    for factor in &factors {
      if let Err(e) = factor.validate() {
        tracing::warn!(factor_id = %factor.id, error = %e, "rejected emission factor");
        return Err(e);
      }
      if !seen.insert(factor.id.as_str()) {
        return Err(Error::DuplicateFactor(factor.id.clone()));
      }
    }
    tracing::info!(%version, factors = factors.len(), "loaded factor catalog");
    Ok(Self { version, factors })
  }

  /// Parse and validate a catalog document:
  /// `{"version": "...", "factors": [...]}`.
  pub fn from_json(json: &str) -> Result<Self> {
    let raw: FactorCatalog = serde_json::from_str(json)?;
    Self::new(raw.version, raw.factors)
  }

  pub fn version(&self) -> &str { &self.version }

  /// All factors in catalog order.
  pub fn factors(&self) -> &[EmissionFactor] { &self.factors }

  /// Factors for one scope, in catalog order.
  pub fn factors_by_scope(&self, scope: Scope) -> Vec<&EmissionFactor> {
    self.factors.iter().filter(|f| f.scope == scope).collect()
  }

  pub fn get(&self, id: &str) -> Option<&EmissionFactor> {
    self.factors.iter().find(|f| f.id == id)
  }

  /// Turn a caller's choice into a full factor snapshot. Custom factors are
  /// validated here; catalog factors were validated at load.
  pub fn resolve(&self, choice: &FactorChoice) -> Result<ResolvedFactor> {
    match choice {
      FactorChoice::Catalog { factor_id } => self
        .get(factor_id)
        .cloned()
        .map(ResolvedFactor::Catalog)
        .ok_or_else(|| Error::FactorNotFound(factor_id.clone())),
      FactorChoice::Custom(custom) => {
        custom.validate()?;
        Ok(ResolvedFactor::Custom(custom.clone()))
      }
    }
  }
}

// ─── Process-wide instance ───────────────────────────────────────────────────

/// The catalog embedded in this crate, parsed on first access.
pub fn builtin() -> Result<&'static FactorCatalog> {
  if let Some(catalog) = BUILTIN.get() {
    return Ok(catalog);
  }
  let parsed = FactorCatalog::from_json(BUILTIN_JSON)?;
  Ok(BUILTIN.get_or_init(|| parsed))
}

/// Freeze `catalog` as the process-wide catalog. Only the first call
/// succeeds.
pub fn install(catalog: FactorCatalog) -> Result<&'static FactorCatalog> {
  let mut installed = false;
  let frozen = INSTALLED.get_or_init(|| {
    installed = true;
    catalog
  });
  if installed {
    Ok(frozen)
  } else {
    Err(Error::CatalogAlreadyInstalled)
  }
}

/// The installed catalog, or the built-in one if none was installed.
pub fn global() -> Result<&'static FactorCatalog> {
  match INSTALLED.get() {
    Some(catalog) => Ok(catalog),
    None => builtin(),
  }
}
