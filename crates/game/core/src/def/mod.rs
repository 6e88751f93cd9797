//! # Ability Definitions
//!
//! Immutable per-ability data. A [`AbilityDefinition`] is authored
//! content (loaded by `game-content` from RON catalogs) and is never
//! mutated at runtime; everything dynamic lives on the owning entity's
//! attribute store or in the ability instance.

mod events;

pub use events::{EventAction, EventEntry, EventType};

use alloc::string::String;
use alloc::vec::Vec;

// ============================================================================
// Identifiers
// ============================================================================

/// Content-stable ability identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AbilityId(pub u32);

/// Content-stable keyword tag (e.g. "melee", "fire", "summon").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeywordId(pub u32);

/// Primary resource pool identifier (classes may run several).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceId(pub u32);

/// Condition (buff/debuff) definition identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConditionDefId(pub u32);

/// Keyword ids the engine itself reacts to. Content may define any
/// number of others; these are the ones with hardwired behavior.
pub mod well_known {
    use super::KeywordId;

    /// Conditions carrying this keyword block all activations.
    pub const SILENCE: KeywordId = KeywordId(1);

    /// Conditions carrying this keyword hide the entity; hostile
    /// activations strip them unless the ability preserves stealth.
    pub const STEALTH: KeywordId = KeywordId(2);
}

// ============================================================================
// Damage Types
// ============================================================================

/// The three damage channels. Attribute families parameterized on a
/// damage type use `as_param`; [`crate::attributes::PARAM_ALL`] addresses
/// the type-agnostic member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display, strum::EnumIter)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DamageType {
    Physical = 0,
    Energy = 1,
    Mental = 2,
}

impl DamageType {
    pub const COUNT: usize = 3;

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_param(self) -> u32 {
        self as u32
    }
}

// ============================================================================
// Activation Shape
// ============================================================================

/// How an ability is aimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ActivationType {
    /// Always on, never explicitly activated.
    Passive,
    /// Fire-and-forget, aimed at a position or direction.
    Instant,
    /// Requires an entity target at activation time.
    InstantTargeted,
    /// Aimed at a position the client pre-selected.
    TwoStageTargeted,
}

/// Geometric footprint used when resolving area targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TargetingShape {
    /// Affects only the user.
    SelfOnly,
    /// Exactly the aimed entity.
    SingleTarget,
    /// One eligible entity chosen by seeded draw.
    SingleTargetRandom,
    /// The user's ultimate owner (pets hitting their master).
    SingleTargetOwner,
    /// Disc around the aim point.
    CircleArea,
    /// Annulus: inside the outer radius but outside `radius - width`.
    RingArea,
    /// Angular sector around the aim direction.
    WedgeArea,
    /// Wedge whose angle widens so its chord covers `width` at range.
    ArcArea,
    /// Rotated rectangle (capsule footprint) along the aim direction.
    CapsuleArea,
    /// Wedge swept across the full aperture in timed slices.
    BeamSweep,
}

impl TargetingShape {
    /// Shapes that resolve to at most one entity.
    pub fn is_single_target(self) -> bool {
        matches!(
            self,
            TargetingShape::SelfOnly
                | TargetingShape::SingleTarget
                | TargetingShape::SingleTargetRandom
                | TargetingShape::SingleTargetOwner
        )
    }

    pub fn is_aoe(self) -> bool {
        !self.is_single_target()
    }
}

/// Aiming/geometry block of a definition.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetingStyle {
    pub shape: TargetingShape,
    /// Center the area on the user instead of the aim point.
    pub aoe_centered_on_user: bool,
    /// Full wedge/arc/sweep aperture in degrees.
    pub aoe_angle_deg: f32,
    /// Rotate the aim direction by this many degrees before shaping.
    pub orientation_offset_deg: f32,
    /// Capsule width, or ring thickness.
    pub width: f32,
    /// Capsule length. Zero means "use the ability radius".
    pub length: f32,
    /// Scatter the aim point inside this radius (seeded).
    pub random_position_radius: f32,
    /// Hard cap on resolved area targets. Zero means unlimited.
    pub max_targets: u32,
    /// Pick capped targets by seeded draw instead of distance order.
    pub random_selection: bool,
    /// A live entity target is required for activation to start.
    pub needs_target: bool,
}

impl Default for TargetingStyle {
    fn default() -> Self {
        TargetingStyle {
            shape: TargetingShape::SingleTarget,
            aoe_centered_on_user: false,
            aoe_angle_deg: 0.0,
            orientation_offset_deg: 0.0,
            width: 0.0,
            length: 0.0,
            random_position_radius: 0.0,
            max_targets: 0,
            random_selection: false,
            needs_target: true,
        }
    }
}

// ============================================================================
// Targeting Reach
// ============================================================================

/// Which health states make an entity eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TargetHealthState {
    #[default]
    Alive,
    Dead,
    AliveOrDead,
}

/// Vertical eligibility band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HeightConstraint {
    #[default]
    Any,
    GroundOnly,
    AirborneOnly,
}

/// Eligibility block of a definition: who counts as a valid target.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetingReach {
    pub targets_enemies: bool,
    pub targets_allies: bool,
    pub targets_self: bool,
    pub targets_destructibles: bool,
    /// Area resolution skips the aimed primary target.
    pub excludes_primary_target: bool,
    /// Player-cast friendly abilities only reach party members.
    pub party_only: bool,
    pub health_state: TargetHealthState,
    pub height: HeightConstraint,
    /// Only entities in the user's front 180 degrees.
    pub front_only: bool,
    pub requires_line_of_sight: bool,
    /// Melee reach: short range with a forward probe fallback.
    pub melee: bool,
}

impl Default for TargetingReach {
    fn default() -> Self {
        TargetingReach {
            targets_enemies: true,
            targets_allies: false,
            targets_self: false,
            targets_destructibles: true,
            excludes_primary_target: false,
            party_only: false,
            health_state: TargetHealthState::Alive,
            height: HeightConstraint::Any,
            front_only: false,
            requires_line_of_sight: true,
            melee: false,
        }
    }
}

/// Author-declared predicates a candidate must satisfy.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TargetRestriction {
    HealthAbovePct(f32),
    HealthBelowPct(f32),
    HasKeyword(KeywordId),
    MissingKeyword(KeywordId),
    RankAtLeast(crate::state::Rank),
    RankAtMost(crate::state::Rank),
}

// ============================================================================
// Timing
// ============================================================================

/// Phase durations, all in integer milliseconds of base time. Scaled
/// durations (cast speed etc.) are applied by the instance and truncated
/// back to whole milliseconds.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimingBlock {
    /// Active phase length. Zero with no channel block means the ability
    /// completes on the same tick it activates.
    pub activation_ms: u64,
    /// Charge-up before the active phase. Zero disables charging.
    pub charge_ms: u64,
    /// Channel wind-up. Nonzero channel loop implies a channel pipeline.
    pub channel_start_ms: u64,
    /// One channel loop iteration. Zero disables channeling.
    pub channel_loop_ms: u64,
    /// Loop iterations before the channel winds down. Ignored when
    /// `channel_infinite` is set.
    pub channel_loop_count: u32,
    /// Wind-down after the last loop.
    pub channel_end_ms: u64,
    /// Channeled abilities cannot be ended before this much channel time.
    pub channel_min_ms: u64,
    /// Loop forever until explicitly ended (or toggled off).
    pub channel_infinite: bool,
    /// Un-interruptible window at the start of the active phase.
    pub no_interrupt_pre_ms: u64,
    /// Un-interruptible window before the scheduled end.
    pub no_interrupt_post_ms: u64,
    /// Beam sweep: time per slice. The sweep spans `aoe_angle_deg`.
    pub beam_slice_ms: u64,
    /// Sweep direction.
    pub beam_clockwise: bool,
    /// Payload travel speed in units/second. Zero delivers instantly.
    pub projectile_speed: f32,
    /// Minimum gap between activations, independent of cooldown.
    pub refresh_ms: u64,
}

// ============================================================================
// Costs and Cooldowns
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CostBlock {
    /// One-time endurance cost per resource pool.
    pub endurance: Vec<(ResourceId, f32)>,
    /// Recurring cost charged every interval while channeling/toggled.
    pub endurance_recurring: Vec<(ResourceId, f32)>,
    pub recurring_interval_ms: u64,
    /// Secondary resource (class mechanic) cost.
    pub secondary: f32,
    /// Activation still allowed when secondary is short (pays what it
    /// can).
    pub secondary_optional: bool,
    /// Health paid on activation.
    pub health: f32,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CooldownBlock {
    pub base_ms: u64,
    /// Cooldown floor applied when the activation was interrupted.
    pub interrupt_floor_ms: u64,
    /// Number of stored charges. Zero means plain cooldown gating.
    pub max_charges: u32,
    /// Record the cooldown when the ability ends instead of when it
    /// activates (long channels usually want this).
    pub starts_on_end: bool,
}

// ============================================================================
// Damage / Healing
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DamageBlock {
    /// Base damage per channel at rank 0 / level 0.
    pub base: [f32; DamageType::COUNT],
    /// Added per combat level of the user.
    pub per_level: [f32; DamageType::COUNT],
    /// Half-width of the variance band, e.g. 0.1 rolls in [0.9, 1.1].
    pub variance: f32,
    /// Balance multiplier applied before player bonuses.
    pub tuning_score: f32,
    /// Flat damage added after the bonus multiplier.
    pub unmodified: [f32; DamageType::COUNT],
    pub can_crit: bool,
    /// Fraction of dealt damage returned to the user as healing.
    pub life_steal_pct: f32,
}

impl DamageBlock {
    pub fn has_any_base(&self) -> bool {
        self.base.iter().chain(self.per_level.iter()).chain(self.unmodified.iter()).any(|v| *v != 0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HealBlock {
    pub base: f32,
    /// Fraction of the target's max health restored.
    pub base_pct: f32,
    pub variance: f32,
}

/// Conditions applied to every affected target.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConditionSpec {
    pub condition: ConditionDefId,
    pub duration_ms: u64,
    pub chance: f32,
}

// ============================================================================
// Bounce
// ============================================================================

/// Chained delivery between targets.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BounceBlock {
    /// Number of additional hops after the first hit.
    pub count: u32,
    /// Search radius for the next hop.
    pub range: f32,
    /// Hop travel speed in units/second.
    pub speed: f32,
    /// Allow revisiting targets already hit by this payload.
    pub allow_repeats: bool,
}

// ============================================================================
// Extra Activation
// ============================================================================

/// Multi-tap abilities: N activations allowed before the cooldown lands.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExtraActivateBlock {
    pub activations_before_cooldown: u32,
    /// Idle time after which the tap window closes and cooldown starts.
    pub timeout_ms: u64,
}

// ============================================================================
// Definition
// ============================================================================

/// Complete authored description of one ability.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AbilityDefinition {
    pub id: AbilityId,
    pub name: String,
    pub activation: ActivationType,
    pub style: TargetingStyle,
    pub reach: TargetingReach,
    pub restrictions: Vec<TargetRestriction>,
    pub timing: TimingBlock,
    /// Maximum aim distance from the user.
    pub range: f32,
    /// Area footprint radius.
    pub radius: f32,
    pub costs: CostBlock,
    pub cooldown: CooldownBlock,
    pub damage: DamageBlock,
    pub healing: HealBlock,
    pub conditions: Vec<ConditionSpec>,
    pub bounce: Option<BounceBlock>,
    pub extra_activate: Option<ExtraActivateBlock>,
    pub events: Vec<EventEntry>,
    pub keywords: Vec<KeywordId>,
    /// Toggle: first activation turns on, second turns off.
    pub toggled: bool,
    /// Re-activates itself every active-phase duration until ended.
    pub recurring: bool,
    pub usable_while_dead: bool,
    /// Activating this ability does not break the user's stealth.
    pub preserves_stealth: bool,
}

impl AbilityDefinition {
    /// Minimal definition with everything zeroed; tests and loaders fill
    /// in the interesting blocks.
    pub fn new(id: AbilityId, name: impl Into<String>) -> Self {
        AbilityDefinition {
            id,
            name: name.into(),
            activation: ActivationType::InstantTargeted,
            style: TargetingStyle::default(),
            reach: TargetingReach::default(),
            restrictions: Vec::new(),
            timing: TimingBlock::default(),
            range: 0.0,
            radius: 0.0,
            costs: CostBlock::default(),
            cooldown: CooldownBlock::default(),
            damage: DamageBlock::default(),
            healing: HealBlock::default(),
            conditions: Vec::new(),
            bounce: None,
            extra_activate: None,
            events: Vec::new(),
            keywords: Vec::new(),
            toggled: false,
            recurring: false,
            usable_while_dead: false,
            preserves_stealth: false,
        }
    }

    pub fn has_keyword(&self, keyword: KeywordId) -> bool {
        self.keywords.contains(&keyword)
    }

    /// The ability runs a channel pipeline (start/loop/end phases).
    pub fn is_channeled(&self) -> bool {
        self.timing.channel_loop_ms > 0 || self.timing.channel_infinite
    }

    /// Distance at which application is still accepted: aim range plus
    /// a pad for the movement that happens between aim and activation.
    pub fn application_range(&self) -> f32 {
        const APPLICATION_PAD: f32 = 32.0;
        self.range + APPLICATION_PAD
    }

    /// Cooldowns and charges are mutually exclusive gating modes.
    pub fn uses_charges(&self) -> bool {
        self.cooldown.max_charges > 0
    }
}
