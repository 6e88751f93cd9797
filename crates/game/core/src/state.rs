//! # World State
//!
//! Entities, the world registry, and game time.
//!
//! The engine never touches a wall clock: [`GameTime`] is a monotonic
//! millisecond counter advanced by whoever drives the simulation, and
//! every duration in the crate is an integer [`Millis`] span. Fractional
//! milliseconds from scaled durations are truncated at the point where a
//! task is scheduled.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::ops::{Add, AddAssign, Sub};

use crate::attributes::{Attr, AttrStore};
use crate::math::Vec3;

// ============================================================================
// Time
// ============================================================================

/// Duration in whole milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Millis(pub u64);

impl Millis {
    pub const ZERO: Millis = Millis(0);

    /// Truncating conversion from fractional milliseconds. Negative
    /// inputs clamp to zero.
    pub fn from_f32(ms: f32) -> Self {
        if ms <= 0.0 { Millis(0) } else { Millis(ms as u64) }
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn min(self, other: Millis) -> Millis {
        Millis(self.0.min(other.0))
    }

    pub fn max(self, other: Millis) -> Millis {
        Millis(self.0.max(other.0))
    }

    pub fn saturating_sub(self, other: Millis) -> Millis {
        Millis(self.0.saturating_sub(other.0))
    }
}

impl Add for Millis {
    type Output = Millis;
    fn add(self, rhs: Millis) -> Millis {
        Millis(self.0 + rhs.0)
    }
}

/// Absolute simulation timestamp, milliseconds since world start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GameTime(pub u64);

impl GameTime {
    pub const ZERO: GameTime = GameTime(0);

    pub fn elapsed_since(self, earlier: GameTime) -> Millis {
        Millis(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Millis> for GameTime {
    type Output = GameTime;
    fn add(self, rhs: Millis) -> GameTime {
        GameTime(self.0 + rhs.0)
    }
}

impl AddAssign<Millis> for GameTime {
    fn add_assign(&mut self, rhs: Millis) {
        self.0 += rhs.0;
    }
}

impl Sub for GameTime {
    type Output = Millis;
    fn sub(self, rhs: GameTime) -> Millis {
        Millis(self.0.saturating_sub(rhs.0))
    }
}

// ============================================================================
// Entity Identity
// ============================================================================

/// Stable entity identifier. Zero is never a live entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntityId(pub u64);

impl EntityId {
    pub const INVALID: EntityId = EntityId(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Alliance tag. Entities sharing a tag are friendly, differing tags are
/// hostile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AllianceId(pub u32);

/// Who is steering this entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Controller {
    Player { party: Option<u32> },
    Ai,
}

/// Coarse difficulty rank, used by target restrictions and boss bonuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Rank {
    Default,
    Elite,
    MiniBoss,
    Boss,
    GroupBoss,
}

impl Rank {
    pub fn is_boss(self) -> bool {
        matches!(self, Rank::MiniBoss | Rank::Boss | Rank::GroupBoss)
    }
}

// ============================================================================
// Actor
// ============================================================================

/// A combat-capable entity: position, orientation, collision bounds,
/// allegiance, and its attribute store.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Actor {
    pub id: EntityId,
    pub position: Vec3,
    /// Facing direction, unit length in the XY plane.
    pub forward: Vec3,
    /// Collision radius of the entity's bounds.
    pub bounds_radius: f32,
    pub alliance: AllianceId,
    pub controller: Controller,
    pub rank: Rank,
    /// Master entity for summoned pets. Owner-targeted abilities resolve
    /// to this.
    pub summoner: Option<EntityId>,
    pub keywords: Vec<u32>,
    /// Interactable scenery (crates, barrels) rather than a combatant.
    pub destructible: bool,
    /// Flying entities are excluded by ground-only targeting.
    pub high_flying: bool,
    /// In the world and actively simulated. Entities outside the world
    /// are never valid targets.
    pub in_world: bool,
    pub destroyed: bool,
    pub attrs: AttrStore,
}

impl Actor {
    pub fn new(id: EntityId, position: Vec3, alliance: AllianceId) -> Self {
        Actor {
            id,
            position,
            forward: Vec3::X_AXIS,
            bounds_radius: 16.0,
            alliance,
            controller: Controller::Ai,
            rank: Rank::Default,
            summoner: None,
            keywords: Vec::new(),
            destructible: false,
            high_flying: false,
            in_world: true,
            destroyed: false,
            attrs: AttrStore::new(),
        }
    }

    pub fn is_dead(&self) -> bool {
        self.attrs.f32(Attr::Health) <= 0.0
    }

    pub fn is_targetable(&self) -> bool {
        self.in_world && !self.destroyed && !self.attrs.flag(Attr::Untargetable)
    }

    pub fn has_keyword(&self, keyword: u32) -> bool {
        self.keywords.contains(&keyword)
    }

    pub fn is_player(&self) -> bool {
        matches!(self.controller, Controller::Player { .. })
    }

    pub fn party(&self) -> Option<u32> {
        match self.controller {
            Controller::Player { party } => party,
            Controller::Ai => None,
        }
    }

    pub fn is_hostile_to(&self, other: &Actor) -> bool {
        self.alliance != other.alliance
    }

    pub fn is_friendly_to(&self, other: &Actor) -> bool {
        self.alliance == other.alliance
    }
}

// ============================================================================
// World
// ============================================================================

/// Registry of live actors plus the current simulation clock.
#[derive(Debug, Clone, Default)]
pub struct World {
    actors: BTreeMap<EntityId, Actor>,
    pub now: GameTime,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, actor: Actor) {
        debug_assert!(actor.id.is_valid());
        self.actors.insert(actor.id, actor);
    }

    pub fn remove(&mut self, id: EntityId) -> Option<Actor> {
        self.actors.remove(&id)
    }

    pub fn actor(&self, id: EntityId) -> Option<&Actor> {
        self.actors.get(&id)
    }

    pub fn actor_mut(&mut self, id: EntityId) -> Option<&mut Actor> {
        self.actors.get_mut(&id)
    }

    /// Actors in ascending id order. Broad-phase queries built on this
    /// stay deterministic across runs.
    pub fn actors(&self) -> impl Iterator<Item = &Actor> {
        self.actors.values()
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_saturates_instead_of_underflowing() {
        let early = GameTime(100);
        let late = GameTime(400);
        assert_eq!(late.elapsed_since(early), Millis(300));
        assert_eq!(early.elapsed_since(late), Millis::ZERO);
    }

    #[test]
    fn fractional_millis_truncate() {
        assert_eq!(Millis::from_f32(1500.9), Millis(1500));
        assert_eq!(Millis::from_f32(-3.0), Millis::ZERO);
    }

    #[test]
    fn dead_means_zero_health() {
        let mut actor = Actor::new(EntityId(1), Vec3::ZERO, AllianceId(0));
        assert!(actor.is_dead());
        actor.attrs.set_f32(Attr::Health, 50.0);
        assert!(!actor.is_dead());
    }

    #[test]
    fn world_iteration_is_id_ordered() {
        let mut world = World::new();
        world.insert(Actor::new(EntityId(9), Vec3::ZERO, AllianceId(0)));
        world.insert(Actor::new(EntityId(2), Vec3::ZERO, AllianceId(0)));
        world.insert(Actor::new(EntityId(5), Vec3::ZERO, AllianceId(1)));
        let ids: Vec<u64> = world.actors().map(|a| a.id.0).collect();
        assert_eq!(ids, alloc::vec![2, 5, 9]);
    }
}
