//! Tuning table loader.

use std::path::Path;

use crate::loaders::{LoadResult, read_file};
use crate::tuning::GameTuning;

/// Loader for tuning tables from TOML files.
pub struct TuningLoader;

impl TuningLoader {
    /// Load tuning from a TOML file. Every key is optional; missing keys
    /// keep their defaults.
    pub fn load(path: &Path) -> LoadResult<GameTuning> {
        let content = read_file(path)?;
        let tuning: GameTuning = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse tuning TOML: {}", e))?;
        Ok(tuning)
    }
}
