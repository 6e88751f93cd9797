//! Factory that loads every content table from a data directory.

use std::path::{Path, PathBuf};

use crate::catalog::AbilityCatalog;
use crate::loaders::{AbilityLoader, LoadResult, TuningLoader};
use crate::tuning::GameTuning;

/// Loads content tables from a directory with a fixed layout:
///
/// ```text
/// data/
/// ├── abilities.ron
/// └── tuning.toml
/// ```
pub struct ContentFactory {
    data_dir: PathBuf,
}

impl ContentFactory {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Load the ability catalog from `abilities.ron`.
    pub fn load_abilities(&self) -> LoadResult<AbilityCatalog> {
        AbilityLoader::load(&self.data_dir.join("abilities.ron"))
    }

    /// Load the tuning table from `tuning.toml`. A missing file falls
    /// back to defaults so a data directory can ship without one.
    pub fn load_tuning(&self) -> LoadResult<GameTuning> {
        let path = self.data_dir.join("tuning.toml");
        if !path.exists() {
            return Ok(GameTuning::default());
        }
        TuningLoader::load(&path)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
