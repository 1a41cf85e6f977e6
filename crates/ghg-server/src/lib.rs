//! HTTP host for the emissions engine.
//!
//! Loads configuration, freezes the factor catalog, and mounts the JSON API
//! under `/api`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use axum::{Json, Router, routing::get};
use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use ghg_core::catalog::{self, FactorCatalog};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `GHG_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:         String,
  pub port:         u16,
  /// JSON factor catalog to install instead of the built-in one.
  #[serde(default)]
  pub catalog_path: Option<PathBuf>,
}

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Defaults every other source layers over.
pub fn config_builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
  Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)
}

/// Defaults, then the TOML file at `path` if present, then `GHG_*`
/// environment variables.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
  config_builder()?
    .add_source(File::from(path).required(false))
    .add_source(Environment::with_prefix("GHG"))
    .build()?
    .try_deserialize()
}

// ─── Catalog ──────────────────────────────────────────────────────────────────

/// Read and validate a JSON catalog document.
pub fn read_catalog(path: &Path) -> anyhow::Result<FactorCatalog> {
  let json = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read catalog at {path:?}"))?;
  FactorCatalog::from_json(&json)
    .with_context(|| format!("invalid catalog at {path:?}"))
}

/// Freeze the configured catalog as the process-wide one and return it.
pub fn install_catalog(
  config: &ServerConfig,
) -> anyhow::Result<&'static FactorCatalog> {
  match &config.catalog_path {
    Some(path) => {
      let loaded = read_catalog(path)?;
      Ok(catalog::install(loaded)?)
    }
    None => Ok(catalog::global()?),
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Health {
  status:          &'static str,
  catalog_version: String,
  factors:         usize,
}

/// The full application: `/health` plus the API under `/api`.
pub fn app(catalog: &'static FactorCatalog) -> Router {
  let health = move || async move {
    Json(Health {
      status:          "ok",
      catalog_version: catalog.version().to_string(),
      factors:         catalog.factors().len(),
    })
  };
  Router::new()
    .route("/health", get(health))
    .nest("/api", ghg_api::api_router(catalog))
    .layer(TraceLayer::new_for_http())
}
