//! Oracle traits for the services surrounding the ability engine.
//!
//! The engine owns activation, targeting, and resolution; everything
//! else it needs (static geometry, the condition tracker, balance
//! curves, the ability catalog) is reached through these traits so the
//! runtime can swap implementations and tests can supply fixtures.

use crate::def::{AbilityDefinition, AbilityId, ConditionSpec, KeywordId};
use crate::math::Vec3;
use crate::state::{EntityId, GameTime};

// ============================================================================
// Definitions
// ============================================================================

/// Access to the loaded ability catalog.
pub trait DefinitionOracle: Send + Sync {
    fn ability(&self, id: AbilityId) -> Option<&AbilityDefinition>;
}

// ============================================================================
// Geometry
// ============================================================================

/// Outcome of sweeping a position toward a destination through static
/// geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SweepResult {
    /// Destination reachable as-is.
    Clear,
    /// Blocked partway; the adjusted reachable position.
    Clipped(Vec3),
    /// Destination invalid (outside the navigable world).
    Invalid,
}

/// Static world geometry: occlusion and navigability. Entity positions
/// are not the oracle's business; the engine reads those from the world
/// registry directly.
pub trait GeometryOracle: Send + Sync {
    fn line_of_sight(&self, from: Vec3, to: Vec3) -> bool;

    /// Validate and if necessary adjust a scattered aim point.
    fn sweep(&self, from: Vec3, to: Vec3, radius: f32) -> SweepResult;
}

/// Open-field geometry: nothing occludes, everywhere is navigable.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenField;

impl GeometryOracle for OpenField {
    fn line_of_sight(&self, _from: Vec3, _to: Vec3) -> bool {
        true
    }

    fn sweep(&self, _from: Vec3, _to: Vec3, _radius: f32) -> SweepResult {
        SweepResult::Clear
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// Handle to a live condition instance owned by the condition tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConditionHandle(pub u64);

/// The buff/debuff tracker. The engine asks it to attach and detach
/// conditions; lifetime management stays on the tracker's side.
///
/// Methods take `&self`; implementations are expected to use interior
/// mutability (the runtime's tracker lives behind its own cell).
pub trait ConditionOracle: Send + Sync {
    /// Attach a condition. Returns `None` if the target rejected it.
    fn apply(
        &self,
        target: EntityId,
        spec: &ConditionSpec,
        source: AbilityId,
        now: GameTime,
    ) -> Option<ConditionHandle>;

    fn remove(&self, handle: ConditionHandle) -> bool;

    /// Detach all conditions carrying a keyword. Returns the count
    /// removed.
    fn remove_by_keyword(&self, target: EntityId, keyword: KeywordId) -> usize;

    /// The condition granting the entity stealth, if any. Hostile
    /// activations break it unless the ability preserves stealth.
    fn stealth_condition(&self, target: EntityId) -> Option<ConditionHandle>;

    fn has_keyword(&self, target: EntityId, keyword: KeywordId) -> bool;
}

// ============================================================================
// Tuning
// ============================================================================

/// Balance curves and live-tuning switches.
pub trait TuningOracle: Send + Sync {
    /// Live-tuning kill switch for individual abilities.
    fn ability_enabled(&self, _ability: AbilityId) -> bool {
        true
    }

    /// Multiplier contributed by damage rating at a given attacker
    /// level.
    fn damage_rating_mult(&self, rating: f32, attacker_level: i64) -> f32;

    /// Critical hit probability in [0, 1] from rating, additive percent
    /// bonus, and the level matchup.
    fn crit_chance(&self, rating: f32, pct_add: f32, user_level: i64, target_level: i64) -> f32;

    fn super_crit_chance(
        &self,
        rating: f32,
        pct_add: f32,
        user_level: i64,
        target_level: i64,
    ) -> f32;

    /// Damage multiplier applied on a critical hit.
    fn crit_damage_mult(&self, rating: f32, pct_bonus: f32) -> f32;
}

/// Reasonable diminishing-returns curves for when no tuned tables are
/// loaded (tests, headless tools).
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTuning;

impl DefaultTuning {
    /// Rating needed per level for 50% effectiveness on the curves below.
    const RATING_HALF_POINT_PER_LEVEL: f32 = 40.0;

    fn saturating_curve(rating: f32, level: i64) -> f32 {
        let half = Self::RATING_HALF_POINT_PER_LEVEL * level.max(1) as f32;
        let rating = rating.max(0.0);
        rating / (rating + half)
    }
}

impl TuningOracle for DefaultTuning {
    fn damage_rating_mult(&self, rating: f32, attacker_level: i64) -> f32 {
        1.0 + Self::saturating_curve(rating, attacker_level)
    }

    fn crit_chance(&self, rating: f32, pct_add: f32, user_level: i64, target_level: i64) -> f32 {
        let level_penalty = 0.02 * (target_level - user_level).max(0) as f32;
        (0.05 + Self::saturating_curve(rating, user_level) * 0.5 + pct_add - level_penalty)
            .clamp(0.0, 0.95)
    }

    fn super_crit_chance(
        &self,
        rating: f32,
        pct_add: f32,
        user_level: i64,
        target_level: i64,
    ) -> f32 {
        let level_penalty = 0.02 * (target_level - user_level).max(0) as f32;
        (Self::saturating_curve(rating, user_level) * 0.35 + pct_add - level_penalty)
            .clamp(0.0, 0.95)
    }

    fn crit_damage_mult(&self, rating: f32, pct_bonus: f32) -> f32 {
        1.5 + Self::saturating_curve(rating, 1) + pct_bonus
    }
}
