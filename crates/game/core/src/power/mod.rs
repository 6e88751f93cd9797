//! # Ability Instances and the Engine Facade
//!
//! The heart of the crate: per-ability runtime state machines
//! ([`AbilityInstance`]), the engine facade that owns them
//! ([`PowerEngine`]), and the value types that cross the boundary
//! (activation settings, outcome codes, end flags, notices).
//!
//! An activation request enters through [`PowerEngine::activate`], runs
//! the gating chain, pays its costs, and brings the instance through its
//! phases. All timed behavior goes through the deferred scheduler; the
//! engine's [`PowerEngine::tick`] drains due tasks and dispatches them
//! back into the owning subsystem.

mod engine;
mod events;
mod instance;

pub use engine::PowerEngine;
pub use instance::{AbilityInstance, PowerPhase};

use crate::def::AbilityId;
use crate::math::Vec3;
use crate::state::{EntityId, GameTime};

// ============================================================================
// Activation Settings
// ============================================================================

bitflags::bitflags! {
    /// Modifiers a request or trigger attaches to an activation.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ActivationFlags: u16 {
        /// Skip the application-range check (bounces, forced procs).
        const SKIP_RANGE_CHECK = 1 << 0;
        /// Activation raised by an event table, not a client request.
        const TRIGGERED = 1 << 1;
        /// Auto-activation by the engine itself (recurring abilities).
        const AUTO = 1 << 2;
        /// Re-activation of a held ability (continuous fire).
        const CONTINUOUS = 1 << 3;
    }
}

/// Immutable description of one activation request.
///
/// The engine never mutates settings in place; anything it derives (a
/// scattered aim point, fresh trigger seeds) goes into copies carried by
/// payloads and scheduled tasks.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ActivationSettings {
    /// Aimed entity, [`EntityId::INVALID`] for position-aimed abilities.
    pub target: EntityId,
    pub target_position: Vec3,
    /// User position captured when the request was made.
    pub user_position: Vec3,
    /// Seed for gameplay-affecting draws (targeting, variance, crits).
    pub power_seed: u32,
    /// Seed for cosmetic draws; carried so clients can mirror fx.
    pub fx_seed: u32,
    pub flags: ActivationFlags,
    /// Ability whose event table raised this activation, if any.
    pub triggered_by: Option<AbilityId>,
}

impl ActivationSettings {
    pub fn aimed_at(target: EntityId, power_seed: u32, fx_seed: u32) -> Self {
        ActivationSettings {
            target,
            target_position: Vec3::ZERO,
            user_position: Vec3::ZERO,
            power_seed,
            fx_seed,
            flags: ActivationFlags::empty(),
            triggered_by: None,
        }
    }

    pub fn at_position(position: Vec3, power_seed: u32, fx_seed: u32) -> Self {
        ActivationSettings {
            target: EntityId::INVALID,
            target_position: position,
            user_position: Vec3::ZERO,
            power_seed,
            fx_seed,
            flags: ActivationFlags::empty(),
            triggered_by: None,
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Result code of an activation attempt. Anything except `Success`
/// leaves the instance untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PowerUseResult {
    Success,
    /// Gated by an active cooldown or the refresh window.
    Cooldown,
    InsufficientCharges,
    InsufficientEndurance,
    InsufficientSecondaryResource,
    /// Missing, dead, hostile-when-friendly-needed, or out-of-range
    /// target.
    BadTarget,
    OwnerDead,
    /// Ability switched off by live tuning.
    DisabledByConfig,
    /// A condition on the owner (silence, stun) blocks activation.
    RestrictedByCondition,
    /// Wiring or state inconsistency; details surface as a notice.
    GenericError,
}

impl PowerUseResult {
    pub fn is_success(self) -> bool {
        matches!(self, PowerUseResult::Success)
    }
}

// ============================================================================
// End Flags
// ============================================================================

bitflags::bitflags! {
    /// Why and how an ability is ending. Flags steer cleanup: whether
    /// cooldowns still start, whether the interrupt floor applies,
    /// whether pending payloads are dropped.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct EndFlags: u16 {
        /// The user asked to stop (released the button, cancelled).
        const EXPLICIT_CANCEL = 1 << 0;
        /// Another activation is interrupting this one.
        const INTERRUPTING = 1 << 1;
        /// A recurring cost tick found the pool empty.
        const NOT_ENOUGH_ENDURANCE = 1 << 2;
        /// The channel loop count ran out.
        const CHANNEL_LOOP_END = 1 << 3;
        /// Owner is leaving the world; drop everything pending.
        const EXIT_WORLD = 1 << 4;
        /// Instance is being unassigned outright.
        const UNASSIGN = 1 << 5;
        /// Bypass the minimum-channel-time hold.
        const FORCE = 1 << 6;
        /// End was deferred until the minimum channel time elapsed.
        const WAIT_FOR_MIN_TIME = 1 << 7;
    }
}

impl EndFlags {
    /// Ends that count as an interruption rather than a natural finish.
    pub fn is_interrupted(self) -> bool {
        self.intersects(
            EndFlags::EXPLICIT_CANCEL | EndFlags::INTERRUPTING | EndFlags::NOT_ENOUGH_ENDURANCE,
        )
    }

    /// Ends where follow-on work (cooldown start, OnEndPower events)
    /// must be skipped entirely.
    pub fn is_teardown(self) -> bool {
        self.intersects(EndFlags::EXIT_WORLD | EndFlags::UNASSIGN)
    }
}

// ============================================================================
// Notices
// ============================================================================

/// Facts the engine emits for the surrounding runtime to fan out to
/// observers. Draining them is the runtime's job; the engine never
/// blocks on delivery.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EngineNotice {
    Activated {
        owner: EntityId,
        ability: AbilityId,
        target: EntityId,
        target_position: Vec3,
        fx_seed: u32,
        at: GameTime,
    },
    ActivationRejected {
        owner: EntityId,
        ability: AbilityId,
        result: PowerUseResult,
    },
    Ended {
        owner: EntityId,
        ability: AbilityId,
        flags: EndFlags,
        at: GameTime,
    },
    ResultsApplied {
        owner: EntityId,
        ability: AbilityId,
        target: EntityId,
        damage: [f32; crate::def::DamageType::COUNT],
        healing: f32,
        flags: crate::payload::ResultFlags,
        at: GameTime,
    },
    CooldownStarted {
        owner: EntityId,
        ability: AbilityId,
        duration: crate::state::Millis,
    },
    CooldownEnded {
        owner: EntityId,
        ability: AbilityId,
    },
    ToggleChanged {
        owner: EntityId,
        ability: AbilityId,
        on: bool,
    },
    Fault {
        error: crate::error::PowerError,
    },
}
