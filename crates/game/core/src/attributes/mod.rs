//! # Attribute Store
//!
//! Typed key-value storage for per-entity gameplay numbers.
//!
//! Every mutable number the engine reads or writes on an entity lives
//! here: health and resource pools, damage/crit bonus ratings, cooldown
//! bookkeeping, charge counts, toggle flags. Keys are an [`Attr`]
//! discriminant plus a `u32` parameter (an ability id, a damage type
//! index, a resource id) so one enum covers whole families of values.
//!
//! Storage is a `BTreeMap` rather than a hash map so iteration order is
//! deterministic, which matters because bonus aggregation sums over key
//! ranges.

mod store;

pub use store::AttrStore;

/// Parameter value meaning "applies to every damage type".
pub const PARAM_ALL: u32 = u32::MAX;

// ============================================================================
// Attribute Discriminants
// ============================================================================

/// Attribute families. The `param` half of an [`AttrId`] selects the
/// member: a damage type index for damage attributes, an ability id for
/// cooldown/charge attributes, a keyword or resource id elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
pub enum Attr {
    // ------------------------------------------------------------------
    // Vitals (param: resource id for endurance, 0 otherwise)
    // ------------------------------------------------------------------
    Health,
    HealthMax,
    Endurance,
    EnduranceMax,
    SecondaryResource,
    SecondaryResourceMax,
    CombatLevel,

    // ------------------------------------------------------------------
    // Damage bonus layers (param: damage type, keyword id, or ability id)
    // ------------------------------------------------------------------
    DamageMult,
    DamagePctBonus,
    DamageRating,
    DamageMultForAbility,
    DamagePctBonusForAbility,
    DamageRatingForAbility,
    DamageMultForKeyword,
    DamagePctBonusForKeyword,
    DamageRatingForKeyword,
    DamagePctBonusVsBosses,
    DamageRatingVsBosses,
    DamagePctWeaken,

    // ------------------------------------------------------------------
    // Critical hit layers (param: 0)
    // ------------------------------------------------------------------
    CritChancePctAdd,
    CritRatingBonus,
    CritDamageRating,
    CritDamagePctBonus,
    SuperCritChancePctAdd,
    SuperCritRatingBonus,

    // ------------------------------------------------------------------
    // Cooldowns and charges (param: ability id)
    // ------------------------------------------------------------------
    CooldownStartTime,
    CooldownDurationMs,
    CooldownSavedElapsedMs,
    ChargesAvailable,
    ChargesMax,
    CooldownPctModGlobal,
    CooldownPctModForAbility,
    CooldownPctModForKeyword,
    CooldownFlatModMsForAbility,
    CooldownFlatModMsForKeyword,

    // ------------------------------------------------------------------
    // Per-ability activation state (param: ability id)
    // ------------------------------------------------------------------
    ToggledOn,
    ActivationCount,

    // ------------------------------------------------------------------
    // Defensive / gating flags (param: ability id where noted)
    // ------------------------------------------------------------------
    ImmuneToAbility,
    Untargetable,
    /// Probability in [0, 1] of fully evading a hostile delivery.
    DodgeChance,
    /// Probability in [0, 1] of halving a hostile delivery.
    BlockChance,
}

// ============================================================================
// Keys and Values
// ============================================================================

/// Full attribute key: family discriminant plus parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttrId {
    pub attr: Attr,
    pub param: u32,
}

impl AttrId {
    pub const fn new(attr: Attr, param: u32) -> Self {
        AttrId { attr, param }
    }

    /// Key for an unparameterized attribute.
    pub const fn plain(attr: Attr) -> Self {
        AttrId { attr, param: 0 }
    }
}

impl From<Attr> for AttrId {
    fn from(attr: Attr) -> Self {
        AttrId::plain(attr)
    }
}

/// Stored attribute value. Integer and float attributes are kept as
/// separate variants so integer bookkeeping (timestamps, counts) never
/// round-trips through floating point.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AttrValue {
    Float(f32),
    Int(i64),
    Flag(bool),
}

impl AttrValue {
    pub fn as_f32(self) -> f32 {
        match self {
            AttrValue::Float(v) => v,
            AttrValue::Int(v) => v as f32,
            AttrValue::Flag(v) => {
                if v {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            AttrValue::Float(v) => v as i64,
            AttrValue::Int(v) => v,
            AttrValue::Flag(v) => v as i64,
        }
    }

    pub fn as_bool(self) -> bool {
        match self {
            AttrValue::Float(v) => v != 0.0,
            AttrValue::Int(v) => v != 0,
            AttrValue::Flag(v) => v,
        }
    }
}
