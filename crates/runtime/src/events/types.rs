//! Typed events published on the runtime bus.
//!
//! Each variant is a straight projection of a [`game_core::EngineNotice`];
//! the engine stays oblivious to who is listening while subscribers get
//! serializable, topic-routable payloads.

use serde::{Deserialize, Serialize};

use game_core::def::{AbilityId, DamageType};
use game_core::math::Vec3;
use game_core::payload::ResultFlags;
use game_core::{EndFlags, EngineNotice, EntityId, GameTime, Millis, PowerError, PowerUseResult};

/// Activation lifecycle: starts, rejections, ends, toggle flips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActivationEvent {
    Started {
        owner: EntityId,
        ability: AbilityId,
        target: EntityId,
        target_position: Vec3,
        fx_seed: u32,
        at: GameTime,
    },
    Rejected {
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
    ToggleChanged {
        owner: EntityId,
        ability: AbilityId,
        on: bool,
    },
}

/// Per-target resolution outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CombatEvent {
    ResultsApplied {
        owner: EntityId,
        ability: AbilityId,
        target: EntityId,
        damage: [f32; DamageType::COUNT],
        healing: f32,
        flags: ResultFlags,
        at: GameTime,
    },
}

/// Cooldown window opening and closing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CooldownEvent {
    Started {
        owner: EntityId,
        ability: AbilityId,
        duration: Millis,
    },
    Ended {
        owner: EntityId,
        ability: AbilityId,
    },
}

/// Non-fatal engine faults (bad wiring, self-triggers, desyncs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultEvent {
    pub error: PowerError,
}

/// Topics for event routing.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum Topic {
    /// Activation starts, rejections, ends, toggles
    Activation,
    /// Damage and healing landing on targets
    Combat,
    /// Cooldown windows
    Cooldown,
    /// Engine faults
    Fault,
}

/// Event wrapper that carries the topic and typed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    Activation(ActivationEvent),
    Combat(CombatEvent),
    Cooldown(CooldownEvent),
    Fault(FaultEvent),
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::Activation(_) => Topic::Activation,
            Event::Combat(_) => Topic::Combat,
            Event::Cooldown(_) => Topic::Cooldown,
            Event::Fault(_) => Topic::Fault,
        }
    }

    /// World position the event is anchored at, when it has one.
    /// Proximity-based observer filtering keys off this.
    pub fn origin(&self, world: &game_core::World) -> Option<Vec3> {
        match self {
            Event::Activation(ActivationEvent::Started { target_position, .. }) => {
                Some(*target_position)
            }
            Event::Combat(CombatEvent::ResultsApplied { target, .. }) => {
                world.actor(*target).map(|a| a.position)
            }
            _ => None,
        }
    }
}

impl From<EngineNotice> for Event {
    fn from(notice: EngineNotice) -> Self {
        match notice {
            EngineNotice::Activated { owner, ability, target, target_position, fx_seed, at } => {
                Event::Activation(ActivationEvent::Started {
                    owner,
                    ability,
                    target,
                    target_position,
                    fx_seed,
                    at,
                })
            }
            EngineNotice::ActivationRejected { owner, ability, result } => {
                Event::Activation(ActivationEvent::Rejected { owner, ability, result })
            }
            EngineNotice::Ended { owner, ability, flags, at } => {
                Event::Activation(ActivationEvent::Ended { owner, ability, flags, at })
            }
            EngineNotice::ToggleChanged { owner, ability, on } => {
                Event::Activation(ActivationEvent::ToggleChanged { owner, ability, on })
            }
            EngineNotice::ResultsApplied { owner, ability, target, damage, healing, flags, at } => {
                Event::Combat(CombatEvent::ResultsApplied {
                    owner,
                    ability,
                    target,
                    damage,
                    healing,
                    flags,
                    at,
                })
            }
            EngineNotice::CooldownStarted { owner, ability, duration } => {
                Event::Cooldown(CooldownEvent::Started { owner, ability, duration })
            }
            EngineNotice::CooldownEnded { owner, ability } => {
                Event::Cooldown(CooldownEvent::Ended { owner, ability })
            }
            EngineNotice::Fault { error } => Event::Fault(FaultEvent { error }),
        }
    }
}
