//! Traits describing the services around the engine.
//!
//! Oracles expose the ability catalog, static geometry, the condition
//! tracker, balance curves, and the RNG. The [`Env`] aggregate bundles
//! them so engine code can reach everything it needs without hard
//! coupling to concrete implementations.

mod oracles;
mod rng;

pub use oracles::{
    ConditionHandle, ConditionOracle, DefaultTuning, DefinitionOracle, GeometryOracle, OpenField,
    SweepResult, TuningOracle,
};
pub use rng::{PcgRng, RngOracle, compute_seed, stream};

use crate::error::{ErrorSeverity, GameError};

/// Aggregates the oracles required by the activation and resolution
/// pipeline.
#[derive(Clone, Copy, Debug)]
pub struct Env<'a, D, G, C, T, R>
where
    D: DefinitionOracle + ?Sized,
    G: GeometryOracle + ?Sized,
    C: ConditionOracle + ?Sized,
    T: TuningOracle + ?Sized,
    R: RngOracle + ?Sized,
{
    definitions: Option<&'a D>,
    geometry: Option<&'a G>,
    conditions: Option<&'a C>,
    tuning: Option<&'a T>,
    rng: Option<&'a R>,
}

pub type GameEnv<'a> = Env<
    'a,
    dyn DefinitionOracle + 'a,
    dyn GeometryOracle + 'a,
    dyn ConditionOracle + 'a,
    dyn TuningOracle + 'a,
    dyn RngOracle + 'a,
>;

impl<'a, D, G, C, T, R> Env<'a, D, G, C, T, R>
where
    D: DefinitionOracle + ?Sized,
    G: GeometryOracle + ?Sized,
    C: ConditionOracle + ?Sized,
    T: TuningOracle + ?Sized,
    R: RngOracle + ?Sized,
{
    pub fn new(
        definitions: Option<&'a D>,
        geometry: Option<&'a G>,
        conditions: Option<&'a C>,
        tuning: Option<&'a T>,
        rng: Option<&'a R>,
    ) -> Self {
        Self { definitions, geometry, conditions, tuning, rng }
    }

    pub fn with_all(
        definitions: &'a D,
        geometry: &'a G,
        conditions: &'a C,
        tuning: &'a T,
        rng: &'a R,
    ) -> Self {
        Self::new(
            Some(definitions),
            Some(geometry),
            Some(conditions),
            Some(tuning),
            Some(rng),
        )
    }

    pub fn empty() -> Self {
        Self { definitions: None, geometry: None, conditions: None, tuning: None, rng: None }
    }

    /// Returns the DefinitionOracle, or an error if not available.
    pub fn definitions(&self) -> Result<&'a D, OracleError> {
        self.definitions.ok_or(OracleError::DefinitionsNotAvailable)
    }

    /// Returns the GeometryOracle, or an error if not available.
    pub fn geometry(&self) -> Result<&'a G, OracleError> {
        self.geometry.ok_or(OracleError::GeometryNotAvailable)
    }

    /// Returns the ConditionOracle, or an error if not available.
    pub fn conditions(&self) -> Result<&'a C, OracleError> {
        self.conditions.ok_or(OracleError::ConditionsNotAvailable)
    }

    /// Returns the TuningOracle, or an error if not available.
    pub fn tuning(&self) -> Result<&'a T, OracleError> {
        self.tuning.ok_or(OracleError::TuningNotAvailable)
    }

    /// Returns the RngOracle, or an error if not available.
    pub fn rng(&self) -> Result<&'a R, OracleError> {
        self.rng.ok_or(OracleError::RngNotAvailable)
    }
}

impl<'a, D, G, C, T, R> Env<'a, D, G, C, T, R>
where
    D: DefinitionOracle + 'a,
    G: GeometryOracle + 'a,
    C: ConditionOracle + 'a,
    T: TuningOracle + 'a,
    R: RngOracle + 'a,
{
    /// Converts this environment into a trait-object based `GameEnv`
    /// (borrows self).
    pub fn as_game_env(&self) -> GameEnv<'a> {
        let definitions: Option<&'a dyn DefinitionOracle> = self.definitions.map(|d| d as _);
        let geometry: Option<&'a dyn GeometryOracle> = self.geometry.map(|g| g as _);
        let conditions: Option<&'a dyn ConditionOracle> = self.conditions.map(|c| c as _);
        let tuning: Option<&'a dyn TuningOracle> = self.tuning.map(|t| t as _);
        let rng: Option<&'a dyn RngOracle> = self.rng.map(|r| r as _);
        Env::new(definitions, geometry, conditions, tuning, rng)
    }
}

/// Errors that occur when accessing oracle data.
///
/// A missing oracle means the engine was wired incorrectly; callers
/// surface these as generic activation failures rather than panicking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OracleError {
    #[error("DefinitionOracle not available")]
    DefinitionsNotAvailable,

    #[error("GeometryOracle not available")]
    GeometryNotAvailable,

    #[error("ConditionOracle not available")]
    ConditionsNotAvailable,

    #[error("TuningOracle not available")]
    TuningNotAvailable,

    #[error("RngOracle not available")]
    RngNotAvailable,
}

impl GameError for OracleError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Internal
    }

    fn error_code(&self) -> &'static str {
        use OracleError::*;
        match self {
            DefinitionsNotAvailable => "ORACLE_DEFINITIONS_NOT_AVAILABLE",
            GeometryNotAvailable => "ORACLE_GEOMETRY_NOT_AVAILABLE",
            ConditionsNotAvailable => "ORACLE_CONDITIONS_NOT_AVAILABLE",
            TuningNotAvailable => "ORACLE_TUNING_NOT_AVAILABLE",
            RngNotAvailable => "ORACLE_RNG_NOT_AVAILABLE",
        }
    }
}
