//! Runtime oracle implementations.
//!
//! Bundles the content-backed oracles ([`game_content::AbilityCatalog`],
//! [`game_content::GameTuning`]), the live [`ConditionTracker`], and a
//! pluggable geometry implementation into an [`OracleManager`] the
//! worker snapshots into a [`game_core::GameEnv`] per command.

mod conditions;

use std::sync::Arc;

use game_content::{AbilityCatalog, GameTuning};
use game_core::env::{
    ConditionOracle, DefinitionOracle, GeometryOracle, OpenField, RngOracle, TuningOracle,
};
use game_core::{Env, GameEnv, PcgRng};

pub use conditions::ConditionTracker;

/// Owns every oracle implementation and hands out env snapshots.
#[derive(Clone)]
pub struct OracleManager {
    catalog: Arc<AbilityCatalog>,
    geometry: Arc<dyn GeometryOracle>,
    conditions: Arc<ConditionTracker>,
    tuning: Arc<GameTuning>,
    rng: PcgRng,
}

impl OracleManager {
    /// Unobstructed geometry and a fresh condition tracker; enough for
    /// most setups.
    pub fn new(catalog: AbilityCatalog, tuning: GameTuning) -> Self {
        Self {
            catalog: Arc::new(catalog),
            geometry: Arc::new(OpenField),
            conditions: Arc::new(ConditionTracker::new()),
            tuning: Arc::new(tuning),
            rng: PcgRng,
        }
    }

    /// Swap in a real collision/line-of-sight implementation.
    pub fn with_geometry(mut self, geometry: Arc<dyn GeometryOracle>) -> Self {
        self.geometry = geometry;
        self
    }

    /// Builds an env snapshot borrowing this manager.
    pub fn as_game_env(&self) -> GameEnv<'_> {
        Env::new(
            Some(self.catalog.as_ref() as &dyn DefinitionOracle),
            Some(self.geometry.as_ref()),
            Some(self.conditions.as_ref() as &dyn ConditionOracle),
            Some(self.tuning.as_ref() as &dyn TuningOracle),
            Some(&self.rng as &dyn RngOracle),
        )
    }

    pub fn catalog(&self) -> &AbilityCatalog {
        &self.catalog
    }

    /// The live condition tracker, for world-transition hooks and
    /// keyword registration.
    pub fn conditions(&self) -> &ConditionTracker {
        &self.conditions
    }
}
