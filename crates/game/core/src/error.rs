//! Common error infrastructure for game-core.
//!
//! Domain-specific failure enums (activation gating, targeting, payload
//! delivery) live next to the code they describe; this module holds the
//! shared severity classification and the umbrella [`CoreError`] the
//! engine facade returns.

use crate::def::AbilityId;
use crate::state::EntityId;

/// Severity level of an error, used for categorization and recovery
/// strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Temporary condition, the same request may succeed later.
    ///
    /// Examples: ability on cooldown, not enough endurance
    Recoverable,

    /// Invalid input, should not retry without changes.
    ///
    /// Examples: unknown ability, target not found
    Validation,

    /// Unexpected state inconsistency. These indicate bugs and should be
    /// investigated.
    ///
    /// Examples: scheduler slot pointing at a cancelled task
    Internal,
}

impl ErrorSeverity {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Recoverable => "recoverable",
            Self::Validation => "validation",
            Self::Internal => "internal",
        }
    }

    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Recoverable)
    }
}

/// Common trait for game-core errors.
///
/// All error enums implement this; `#[derive(thiserror::Error)]` supplies
/// Display/Error, the trait adds severity classification on top.
pub trait GameError: core::fmt::Display + core::fmt::Debug {
    fn severity(&self) -> ErrorSeverity;

    /// Static identifier for the variant, for categorization and tests.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}

// ============================================================================
// Power Errors
// ============================================================================

/// Failures inside the ability pipeline that are not ordinary activation
/// rejections (those are reported as `PowerUseResult` outcomes, not
/// errors).
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PowerError {
    #[error("ability {ability:?} is not assigned to entity {owner:?}")]
    NotAssigned { owner: EntityId, ability: AbilityId },

    #[error("no definition registered for ability {0:?}")]
    UnknownAbility(AbilityId),

    #[error("entity {0:?} does not exist")]
    UnknownEntity(EntityId),

    #[error("random area targeting for ability {0:?} requires a nonzero seed")]
    MissingSeed(AbilityId),

    #[error("ability {ability:?} cannot trigger itself")]
    SelfTrigger { ability: AbilityId },

    #[error("phase transition task fired for ability {ability:?} in phase {phase}")]
    PhaseDesync { ability: AbilityId, phase: alloc::string::String },
}

impl GameError for PowerError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            PowerError::NotAssigned { .. }
            | PowerError::UnknownAbility(_)
            | PowerError::UnknownEntity(_)
            | PowerError::MissingSeed(_)
            | PowerError::SelfTrigger { .. } => ErrorSeverity::Validation,
            PowerError::PhaseDesync { .. } => ErrorSeverity::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            PowerError::NotAssigned { .. } => "not_assigned",
            PowerError::UnknownAbility(_) => "unknown_ability",
            PowerError::UnknownEntity(_) => "unknown_entity",
            PowerError::MissingSeed(_) => "missing_seed",
            PowerError::SelfTrigger { .. } => "self_trigger",
            PowerError::PhaseDesync { .. } => "phase_desync",
        }
    }
}

/// Umbrella error for the engine facade.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CoreError {
    #[error(transparent)]
    Power(#[from] PowerError),
}

impl GameError for CoreError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            CoreError::Power(e) => e.severity(),
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            CoreError::Power(e) => e.error_code(),
        }
    }
}
