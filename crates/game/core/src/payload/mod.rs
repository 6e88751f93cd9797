//! # Payload
//!
//! A payload is the self-contained record of one application of an
//! ability: everything needed to resolve targets and produce per-target
//! results, captured at application time so later delivery (projectile
//! travel, beam slices, bounce hops) sees the user as they were, not as
//! they are.

mod damage;
mod results;

pub use damage::{DamageSnapshot, results_for_target};
pub use results::{PowerResults, ResultFlags};

use alloc::vec::Vec;

use crate::attributes::Attr;
use crate::def::{AbilityDefinition, AbilityId, BounceBlock, ConditionSpec, DamageType};
use crate::env::GameEnv;
use crate::math::Vec3;
use crate::state::{Actor, AllianceId, EntityId, GameTime, Millis};

// ============================================================================
// Bounce State
// ============================================================================

/// Mutable chain state carried by a bouncing payload.
#[derive(Debug, Clone, PartialEq)]
pub struct BounceState {
    /// Hops left after the upcoming delivery. The chain ends when a
    /// delivery happens with this already at zero, i.e. the counter
    /// conceptually runs down to -1.
    pub remaining: i32,
    pub range: f32,
    pub speed: f32,
    pub allow_repeats: bool,
    /// Targets already hit by this chain, oldest first.
    pub previous_targets: Vec<EntityId>,
}

impl BounceState {
    pub fn new(block: &BounceBlock) -> Self {
        BounceState {
            remaining: block.count as i32,
            range: block.range,
            speed: block.speed,
            allow_repeats: block.allow_repeats,
            previous_targets: Vec::new(),
        }
    }
}

// ============================================================================
// Payload
// ============================================================================

/// Snapshot of one ability application.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub ability: AbilityId,
    pub user: EntityId,
    /// Top of the summon chain; credit (and life steal) flows here.
    pub ultimate_owner: EntityId,
    pub user_alliance: AllianceId,
    pub power_seed: u32,
    pub fx_seed: u32,

    pub target: EntityId,
    pub target_position: Vec3,
    /// User position at activation; area shapes anchor here.
    pub user_position: Vec3,

    /// When the application was created.
    pub execution_time: GameTime,
    pub combat_level: i64,

    pub damage: DamageSnapshot,
    pub conditions: Vec<ConditionSpec>,
    pub life_steal_pct: f32,

    /// Beam sweep slice this payload delivers, if the ability sweeps.
    pub beam_slice: Option<u32>,
    pub bounce: Option<BounceState>,
}

impl Payload {
    /// Capture an application. Everything user-sided (bonus totals, crit
    /// inputs, level) is frozen here; per-target math happens at
    /// delivery against this snapshot.
    pub fn init(
        def: &AbilityDefinition,
        user: &Actor,
        env: &GameEnv<'_>,
        target: EntityId,
        target_position: Vec3,
        power_seed: u32,
        fx_seed: u32,
        now: GameTime,
    ) -> Self {
        Payload {
            ability: def.id,
            user: user.id,
            ultimate_owner: user.summoner.unwrap_or(user.id),
            user_alliance: user.alliance,
            power_seed,
            fx_seed,
            target,
            target_position,
            user_position: user.position,
            execution_time: now,
            combat_level: user.attrs.i64(Attr::CombatLevel),
            damage: DamageSnapshot::capture(def, user, env),
            conditions: def.conditions.clone(),
            life_steal_pct: def.damage.life_steal_pct,
            beam_slice: if def.style.shape == crate::def::TargetingShape::BeamSweep {
                Some(0)
            } else {
                None
            },
            bounce: def.bounce.as_ref().map(BounceState::new),
        }
    }

    /// Travel delay from the user to the aim point, zero for instant
    /// delivery.
    pub fn travel_time(&self, projectile_speed: f32) -> Millis {
        speed_to_delay(self.user_position, self.target_position, projectile_speed)
    }

    /// Retarget for the next bounce hop: the new target becomes primary
    /// and the previous one joins the exclusion list.
    pub fn retarget_for_bounce(&mut self, next: EntityId, next_position: Vec3) {
        if let Some(bounce) = &mut self.bounce {
            bounce.previous_targets.push(self.target);
            bounce.remaining -= 1;
        }
        self.user_position = self.target_position;
        self.target = next;
        self.target_position = next_position;
    }

    pub fn has_damage(&self) -> bool {
        DamageType::COUNT > 0 && self.damage.max.iter().any(|v| *v > 0.0)
    }
}

/// Millisecond travel delay for a projectile covering the distance at
/// `speed` units/second.
pub fn speed_to_delay(from: Vec3, to: Vec3, speed: f32) -> Millis {
    if speed <= 0.0 {
        return Millis::ZERO;
    }
    Millis::from_f32(from.distance2d(to) / speed * 1000.0)
}
