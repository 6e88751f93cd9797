//! Live tuning tables: balance curves and kill switches.

use game_core::def::AbilityId;
use game_core::env::TuningOracle;

/// Tuned balance constants, loaded from a TOML table.
///
/// The defaults reproduce the engine's built-in fallback curves, so an
/// empty tuning file changes nothing and individual knobs can be
/// overridden in isolation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct GameTuning {
    /// Abilities switched off without a content push.
    pub disabled_abilities: Vec<u32>,
    /// Rating needed per level for half effectiveness on the curves.
    pub rating_half_point_per_level: f32,
    /// Flat critical chance before rating.
    pub crit_chance_base: f32,
    /// Ceiling on crit and super-crit probability.
    pub crit_chance_cap: f32,
    /// Fraction of the saturating curve contributing to crit chance.
    pub crit_rating_scale: f32,
    pub super_crit_rating_scale: f32,
    /// Chance lost per level the target is above the attacker.
    pub level_delta_penalty: f32,
    /// Critical damage multiplier before rating.
    pub crit_damage_base: f32,
}

impl Default for GameTuning {
    fn default() -> Self {
        GameTuning {
            disabled_abilities: Vec::new(),
            rating_half_point_per_level: 40.0,
            crit_chance_base: 0.05,
            crit_chance_cap: 0.95,
            crit_rating_scale: 0.5,
            super_crit_rating_scale: 0.35,
            level_delta_penalty: 0.02,
            crit_damage_base: 1.5,
        }
    }
}

impl GameTuning {
    fn saturating_curve(&self, rating: f32, level: i64) -> f32 {
        let half = self.rating_half_point_per_level * level.max(1) as f32;
        let rating = rating.max(0.0);
        rating / (rating + half)
    }

    fn level_penalty(&self, user_level: i64, target_level: i64) -> f32 {
        self.level_delta_penalty * (target_level - user_level).max(0) as f32
    }
}

impl TuningOracle for GameTuning {
    fn ability_enabled(&self, ability: AbilityId) -> bool {
        !self.disabled_abilities.contains(&ability.0)
    }

    fn damage_rating_mult(&self, rating: f32, attacker_level: i64) -> f32 {
        1.0 + self.saturating_curve(rating, attacker_level)
    }

    fn crit_chance(&self, rating: f32, pct_add: f32, user_level: i64, target_level: i64) -> f32 {
        (self.crit_chance_base + self.saturating_curve(rating, user_level) * self.crit_rating_scale
            + pct_add
            - self.level_penalty(user_level, target_level))
        .clamp(0.0, self.crit_chance_cap)
    }

    fn super_crit_chance(
        &self,
        rating: f32,
        pct_add: f32,
        user_level: i64,
        target_level: i64,
    ) -> f32 {
        (self.saturating_curve(rating, user_level) * self.super_crit_rating_scale + pct_add
            - self.level_penalty(user_level, target_level))
        .clamp(0.0, self.crit_chance_cap)
    }

    fn crit_damage_mult(&self, rating: f32, pct_bonus: f32) -> f32 {
        self.crit_damage_base + self.saturating_curve(rating, 1) + pct_bonus
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_list_drives_the_kill_switch() {
        let tuning = GameTuning { disabled_abilities: vec![7], ..Default::default() };
        assert!(!tuning.ability_enabled(AbilityId(7)));
        assert!(tuning.ability_enabled(AbilityId(8)));
    }

    #[test]
    fn crit_chance_respects_the_configured_cap() {
        let tuning = GameTuning { crit_chance_cap: 0.5, ..Default::default() };
        let chance = tuning.crit_chance(1_000_000.0, 1.0, 60, 1);
        assert!(chance <= 0.5);
    }
}
