//! Per-target results and their application.

use crate::attributes::Attr;
use crate::def::{AbilityId, DamageType};
use crate::math::Vec3;
use crate::state::{Actor, EntityId};

use super::Payload;

bitflags::bitflags! {
    /// Qualifiers on one target's results.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct ResultFlags: u16 {
        /// User and target are on opposing alliances.
        const HOSTILE = 1 << 0;
        const CRITICAL = 1 << 1;
        const SUPER_CRITICAL = 1 << 2;
        /// Hostile application that produced no damage.
        const NO_DAMAGE = 1 << 3;
        /// The application killed the target.
        const KILLED = 1 << 4;
        /// Target evaded the delivery entirely.
        const DODGED = 1 << 5;
        /// Target blocked; damage halved.
        const BLOCKED = 1 << 6;
    }
}

/// Everything one delivery did to one target.
#[derive(Debug, Clone, PartialEq)]
pub struct PowerResults {
    pub ability: AbilityId,
    pub user: EntityId,
    pub ultimate_owner: EntityId,
    pub target: EntityId,
    /// Target position at delivery, for fx and bounce anchoring.
    pub position: Vec3,
    pub flags: ResultFlags,
    pub damage: [f32; DamageType::COUNT],
    pub healing: f32,
}

impl PowerResults {
    pub fn new(payload: &Payload, target: EntityId, position: Vec3) -> Self {
        PowerResults {
            ability: payload.ability,
            user: payload.user,
            ultimate_owner: payload.ultimate_owner,
            target,
            position,
            flags: ResultFlags::empty(),
            damage: [0.0; DamageType::COUNT],
            healing: 0.0,
        }
    }

    pub fn total_damage(&self) -> f32 {
        self.damage.iter().sum()
    }

    /// Land the results on the target: healing first, then damage, with
    /// health clamped into `[0, max]`. Sets [`ResultFlags::KILLED`] when
    /// the target's health reaches zero here.
    pub fn apply_to(&mut self, target: &mut Actor) {
        let max = target.attrs.f32(Attr::HealthMax);
        let mut health = target.attrs.f32(Attr::Health);
        let was_alive = health > 0.0;

        if self.healing > 0.0 {
            health += self.healing;
            if max > 0.0 {
                health = health.min(max);
            }
        }
        health -= self.total_damage();
        if health <= 0.0 {
            health = 0.0;
            if was_alive {
                self.flags |= ResultFlags::KILLED;
            }
        }
        target.attrs.set_f32(Attr::Health, health);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AllianceId;

    fn dummy_results(damage: f32, healing: f32) -> PowerResults {
        PowerResults {
            ability: AbilityId(1),
            user: EntityId(1),
            ultimate_owner: EntityId(1),
            target: EntityId(2),
            position: Vec3::ZERO,
            flags: ResultFlags::empty(),
            damage: [damage, 0.0, 0.0],
            healing,
        }
    }

    fn target_with_health(health: f32, max: f32) -> Actor {
        let mut actor = Actor::new(EntityId(2), Vec3::ZERO, AllianceId(1));
        actor.attrs.set_f32(Attr::Health, health);
        actor.attrs.set_f32(Attr::HealthMax, max);
        actor
    }

    #[test]
    fn healing_clamps_at_max_health() {
        let mut target = target_with_health(80.0, 100.0);
        dummy_results(0.0, 500.0).apply_to(&mut target);
        assert_eq!(target.attrs.f32(Attr::Health), 100.0);
    }

    #[test]
    fn lethal_damage_floors_at_zero_and_marks_the_kill() {
        let mut target = target_with_health(40.0, 100.0);
        let mut results = dummy_results(90.0, 0.0);
        results.apply_to(&mut target);
        assert_eq!(target.attrs.f32(Attr::Health), 0.0);
        assert!(results.flags.contains(ResultFlags::KILLED));
        assert!(target.is_dead());
    }

    #[test]
    fn hitting_a_corpse_is_not_another_kill() {
        let mut target = target_with_health(0.0, 100.0);
        let mut results = dummy_results(10.0, 0.0);
        results.apply_to(&mut target);
        assert!(!results.flags.contains(ResultFlags::KILLED));
    }
}
