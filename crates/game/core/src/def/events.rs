//! Triggered event tables.
//!
//! Definitions can attach reactions to lifecycle moments of the ability:
//! fire a follow-on ability when this one ends, adjust a cooldown when it
//! hits, spend secondary resource on contact. Entries are evaluated in
//! authored order; chance gates draw from the activation's effect seed.

use super::AbilityId;

/// Lifecycle moment an event entry reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventType {
    /// Activation accepted and costs paid.
    OnActivate,
    /// Active phase ran to its scheduled end.
    OnEndPower,
    /// Ability ended for any reason, including cancellation.
    OnPowerStopped,
    /// A payload result landed on a target.
    OnContactTime,
    /// A charge-up completed.
    OnChargeComplete,
    /// A channel loop iteration completed.
    OnChannelLoop,
    /// A toggled ability switched on.
    OnToggleOn,
    /// A toggled ability switched off.
    OnToggleOff,
}

/// What a matched event entry does.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum EventAction {
    /// Activate another ability with inherited aim and fresh sub-seeds.
    /// Scheduled, never run inline, and never the triggering ability
    /// itself.
    UsePower { ability: AbilityId },
    /// Schedule another ability after a delay.
    ScheduleActivationAtPercent { ability: AbilityId, delay_ms: u64 },
    /// Scale the remaining cooldown of an ability. Values below -1.0
    /// clamp to -1.0 (full refund).
    ModifyCooldownByPct { ability: AbilityId, pct: f32 },
    /// Add (or with a negative value, remove) time on a cooldown.
    ModifyCooldownMs { ability: AbilityId, delta_ms: i64 },
    /// Restore a fraction of the paid endurance cost.
    RefundEndurancePct { pct: f32 },
    /// Grant secondary resource.
    GainSecondary { amount: f32 },
    /// End a running activation of another ability.
    EndPower { ability: AbilityId },
    /// Add one charge to a charged ability, capped at its maximum.
    GrantCharge { ability: AbilityId },
}

/// One row of a definition's event table.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventEntry {
    pub event: EventType,
    pub action: EventAction,
    /// Probability in [0, 1] that the action runs. 1.0 entries skip the
    /// roll entirely so they consume no randomness.
    pub chance: f32,
}

impl EventEntry {
    pub fn always(event: EventType, action: EventAction) -> Self {
        EventEntry { event, action, chance: 1.0 }
    }
}
