//! Data-driven ability content and loaders.
//!
//! This crate houses the static content the engine consumes and provides
//! loaders for RON/TOML data files:
//! - Ability catalogs (data-driven via RON)
//! - Live tuning tables (data-driven via TOML)
//!
//! Content is immutable once loaded: the catalog and tuning types
//! implement the `game-core` oracle traits and are handed to the engine
//! by reference, never mutated mid-simulation.
//!
//! All loaders deserialize directly into game-core definition types via
//! serde.

pub mod catalog;
pub mod tuning;

#[cfg(feature = "loaders")]
pub mod loaders;

pub use catalog::AbilityCatalog;
pub use tuning::GameTuning;

#[cfg(feature = "loaders")]
pub use loaders::{AbilityLoader, ContentFactory, TuningLoader};
