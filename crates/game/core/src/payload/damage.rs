//! Damage and healing computation.
//!
//! The pipeline mirrors how bonuses layer in the attribute store:
//!
//! 1. base + per-level scaling, widened into a variance band
//! 2. the tuning score (balance knob, applied before player bonuses)
//! 3. one combined multiplier: `1 + mult + pct bonuses + rating curve`
//! 4. flat unmodified damage, added after the multiplier
//! 5. per-target: a seeded roll inside the band, boss bonuses, weaken,
//!    and the crit / super-crit upgrade chain
//!
//! Steps 1-4 are user-sided and frozen into the payload's
//! [`DamageSnapshot`]; step 5 runs at delivery per target.

use crate::attributes::Attr;
use crate::def::{AbilityDefinition, DamageType};
use crate::env::{GameEnv, compute_seed, stream};
use crate::state::Actor;

use super::results::{PowerResults, ResultFlags};
use super::Payload;

// ============================================================================
// Snapshot
// ============================================================================

/// User-sided damage numbers frozen at application time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DamageSnapshot {
    /// Variance band per damage type, bonuses already applied.
    pub min: [f32; DamageType::COUNT],
    pub max: [f32; DamageType::COUNT],
    /// Extra multiplier-minus-one applied when the target is a boss.
    pub vs_boss_bonus: f32,
    /// Outgoing weaken factor in [0, 1].
    pub weaken_mult: f32,
    pub can_crit: bool,
    pub crit_rating: f32,
    pub crit_pct_add: f32,
    pub super_crit_rating: f32,
    pub super_crit_pct_add: f32,
    /// Multiplier applied to a critical result.
    pub crit_damage_mult: f32,
    /// Healing band (flat part).
    pub heal_min: f32,
    pub heal_max: f32,
    /// Fraction of the target's max health healed on top.
    pub heal_pct_of_max: f32,
}

impl DamageSnapshot {
    pub fn capture(def: &AbilityDefinition, user: &Actor, env: &GameEnv<'_>) -> Self {
        let attrs = &user.attrs;
        let level = attrs.i64(Attr::CombatLevel);

        // Percent and rating bonuses: global, per-ability, per-keyword.
        let mut pct = attrs.f32(Attr::DamagePctBonus)
            + attrs.f32_p(Attr::DamagePctBonusForAbility, def.id.0);
        let mut rating = attrs.f32(Attr::DamageRating)
            + attrs.f32_p(Attr::DamageRatingForAbility, def.id.0);
        for keyword in &def.keywords {
            pct += attrs.f32_p(Attr::DamagePctBonusForKeyword, keyword.0);
            rating += attrs.f32_p(Attr::DamageRatingForKeyword, keyword.0);
        }

        let rating_bonus = match env.tuning() {
            Ok(tuning) => tuning.damage_rating_mult(rating, level) - 1.0,
            Err(_) => 0.0,
        };
        let mult = (1.0 + attrs.f32(Attr::DamageMult) + pct + rating_bonus).max(0.0);

        let tuning_score = if def.damage.tuning_score != 0.0 { def.damage.tuning_score } else { 1.0 };
        let variance = def.damage.variance.clamp(0.0, 1.0);

        let mut min = [0.0; DamageType::COUNT];
        let mut max = [0.0; DamageType::COUNT];
        for i in 0..DamageType::COUNT {
            let base = def.damage.base[i] + def.damage.per_level[i] * level as f32;
            if base <= 0.0 && def.damage.unmodified[i] <= 0.0 {
                continue;
            }
            let scored = base * tuning_score;
            min[i] = (scored * (1.0 - variance) * mult + def.damage.unmodified[i]).max(0.0);
            max[i] = (scored * (1.0 + variance) * mult + def.damage.unmodified[i]).max(0.0);
        }

        let boss_rating = attrs.f32(Attr::DamageRatingVsBosses);
        let boss_rating_bonus = match env.tuning() {
            Ok(tuning) if boss_rating != 0.0 => tuning.damage_rating_mult(boss_rating, level) - 1.0,
            _ => 0.0,
        };

        let crit_mult = match env.tuning() {
            Ok(tuning) => tuning.crit_damage_mult(
                attrs.f32(Attr::CritDamageRating),
                attrs.f32(Attr::CritDamagePctBonus),
            ),
            Err(_) => 1.5,
        };

        let heal_variance = def.healing.variance.clamp(0.0, 1.0);

        DamageSnapshot {
            min,
            max,
            vs_boss_bonus: attrs.f32(Attr::DamagePctBonusVsBosses) + boss_rating_bonus,
            weaken_mult: (1.0 - attrs.f32(Attr::DamagePctWeaken)).clamp(0.0, 1.0),
            can_crit: def.damage.can_crit,
            crit_rating: attrs.f32(Attr::CritRatingBonus),
            crit_pct_add: attrs.f32(Attr::CritChancePctAdd),
            super_crit_rating: attrs.f32(Attr::SuperCritRatingBonus),
            super_crit_pct_add: attrs.f32(Attr::SuperCritChancePctAdd),
            crit_damage_mult: crit_mult,
            heal_min: def.healing.base * (1.0 - heal_variance),
            heal_max: def.healing.base * (1.0 + heal_variance),
            heal_pct_of_max: def.healing.base_pct,
        }
    }
}

// ============================================================================
// Per-Target Resolution
// ============================================================================

/// Roll the payload against one target. Pure given the payload, the
/// target's state, and the environment: the same inputs always produce
/// the same results.
pub fn results_for_target(
    payload: &Payload,
    target: &Actor,
    env: &GameEnv<'_>,
) -> PowerResults {
    let mut results = PowerResults::new(payload, target.id, target.position);
    let Ok(rng) = env.rng() else {
        return results;
    };
    let snapshot = &payload.damage;

    let hostile = payload.user_alliance != target.alliance;
    if hostile {
        results.flags |= ResultFlags::HOSTILE;

        // A dodge mitigates the whole delivery; a block halves it.
        let dodge = target.attrs.f32(Attr::DodgeChance);
        if dodge > 0.0 {
            let seed = compute_seed(payload.power_seed as u64, target.id.0, stream::DODGE);
            if rng.check(seed, dodge) {
                results.flags |= ResultFlags::DODGED | ResultFlags::NO_DAMAGE;
                return results;
            }
        }
        let block = target.attrs.f32(Attr::BlockChance);
        if block > 0.0 {
            let seed = compute_seed(payload.power_seed as u64, target.id.0, stream::BLOCK);
            if rng.check(seed, block) {
                results.flags |= ResultFlags::BLOCKED;
            }
        }
    }

    // Crit chain: one upgrade roll, then one more for super.
    let mut crit_mult = 1.0;
    if snapshot.can_crit && hostile {
        let target_level = target.attrs.i64(Attr::CombatLevel);
        if let Ok(tuning) = env.tuning() {
            let chance = tuning.crit_chance(
                snapshot.crit_rating,
                snapshot.crit_pct_add,
                payload.combat_level,
                target_level,
            );
            let crit_seed = compute_seed(payload.power_seed as u64, target.id.0, stream::CRIT);
            if rng.check(crit_seed, chance) {
                results.flags |= ResultFlags::CRITICAL;
                crit_mult = snapshot.crit_damage_mult;

                let super_chance = tuning.super_crit_chance(
                    snapshot.super_crit_rating,
                    snapshot.super_crit_pct_add,
                    payload.combat_level,
                    target_level,
                );
                let super_seed =
                    compute_seed(payload.power_seed as u64, target.id.0, stream::SUPER_CRIT);
                if rng.check(super_seed, super_chance) {
                    results.flags |= ResultFlags::SUPER_CRITICAL;
                    crit_mult *= snapshot.crit_damage_mult;
                }
            }
        }
    }

    let boss_mult =
        if target.rank.is_boss() { 1.0 + snapshot.vs_boss_bonus.max(0.0) } else { 1.0 };

    let mut any_damage = false;
    for i in 0..DamageType::COUNT {
        if snapshot.max[i] <= 0.0 {
            continue;
        }
        let seed = compute_seed(
            payload.power_seed as u64,
            target.id.0,
            stream::DAMAGE_VARIANCE + i as u32,
        );
        let rolled = rng.range_f32(seed, snapshot.min[i], snapshot.max[i]);
        let block_mult = if results.flags.contains(ResultFlags::BLOCKED) { 0.5 } else { 1.0 };
        let dealt = rolled * boss_mult * crit_mult * snapshot.weaken_mult * block_mult;
        if dealt > 0.0 {
            results.damage[i] = dealt;
            any_damage = true;
        }
    }
    if hostile && !any_damage {
        results.flags |= ResultFlags::NO_DAMAGE;
    }

    if snapshot.heal_max > 0.0 || snapshot.heal_pct_of_max > 0.0 {
        let seed = compute_seed(payload.power_seed as u64, target.id.0, stream::HEAL_VARIANCE);
        let flat = rng.range_f32(seed, snapshot.heal_min, snapshot.heal_max);
        let from_max = target.attrs.f32(Attr::HealthMax) * snapshot.heal_pct_of_max;
        results.healing = (flat + from_max).max(0.0);
    }

    results
}
