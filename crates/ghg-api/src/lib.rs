//! JSON REST API for the emissions engine.
//!
//! Exposes an axum [`Router`] over a frozen
//! [`ghg_core::catalog::FactorCatalog`]. Every endpoint is a pure query or a
//! snapshot-in, snapshot-out operation; the API holds no inventory state.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", ghg_api::api_router(ghg_core::catalog::global()?))
//! ```

pub mod calculations;
pub mod error;
pub mod factors;
pub mod inventory;

use axum::{
  Router,
  routing::{get, post},
};
use ghg_core::catalog::FactorCatalog;

pub use error::ApiError;

/// Build the API router for `catalog`.
pub fn api_router(catalog: &'static FactorCatalog) -> Router<()> {
  Router::new()
    // Catalog and factor selection
    .route("/factors", get(factors::list))
    .route("/factors/{id}", get(factors::get_one))
    .route("/suggestions", get(factors::suggestions))
    .route("/applicability", get(factors::applicability))
    .route("/validate", post(factors::validate))
    // Calculation
    .route("/calculate", post(calculations::calculate))
    .route("/aggregate", post(calculations::aggregate))
    .route("/staleness", post(calculations::staleness))
    // Inventory snapshots
    .route("/inventory/apply", post(inventory::apply))
    .route("/inventory/remove-record", post(inventory::remove_record))
    .with_state(catalog)
}
