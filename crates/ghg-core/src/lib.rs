//! Emissions accounting engine.
//!
//! Turns activity records (fuel burned, electricity drawn, distance
//! travelled) into a greenhouse-gas inventory by scope, facility, and
//! category, using a frozen catalog of emission factors.
//!
//! This crate is free of HTTP, storage, and I/O. Callers hand in an
//! [`inventory::Inventory`] snapshot and get derived results back.

pub mod activity;
pub mod aggregate;
pub mod applicability;
pub mod calculate;
pub mod catalog;
pub mod error;
pub mod factor;
pub mod inventory;
pub mod normalize;
pub mod scope;
pub mod staleness;
pub mod units;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;
