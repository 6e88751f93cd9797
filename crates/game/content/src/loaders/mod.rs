//! Content loaders for reading ability data from files.
//!
//! This module converts RON/TOML files into the oracle implementations
//! the engine consumes: [`crate::AbilityCatalog`] from RON catalogs and
//! [`crate::GameTuning`] from TOML tuning tables.

pub mod abilities;
pub mod factory;
pub mod tuning;

pub use abilities::AbilityLoader;
pub use factory::ContentFactory;
pub use tuning::TuningLoader;

use std::path::Path;

/// Common result type for loaders.
pub type LoadResult<T> = anyhow::Result<T>;

/// Helper function to read file contents.
pub(crate) fn read_file(path: &Path) -> LoadResult<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read file {}: {}", path.display(), e))
}
