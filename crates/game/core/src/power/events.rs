//! Event table evaluation.
//!
//! Entries matching a lifecycle moment are chance-gated against the
//! activation's power seed and returned in authored order; the engine
//! executes the surviving actions. Entries with chance 1.0 never draw,
//! so adding a guaranteed entry does not shift other abilities' rolls.

use alloc::vec::Vec;

use crate::def::{AbilityDefinition, EventEntry, EventType};
use crate::env::{GameEnv, compute_seed, stream};
use crate::state::EntityId;

/// The entries of `def` that fire for `event` under this activation's
/// seed.
pub fn triggered_entries<'a>(
    def: &'a AbilityDefinition,
    event: EventType,
    user: EntityId,
    power_seed: u32,
    env: &GameEnv<'_>,
) -> Vec<&'a EventEntry> {
    let mut fired = Vec::new();
    for (index, entry) in def.events.iter().enumerate() {
        if entry.event != event {
            continue;
        }
        if entry.chance >= 1.0 {
            fired.push(entry);
            continue;
        }
        if entry.chance <= 0.0 {
            continue;
        }
        let Ok(rng) = env.rng() else {
            continue;
        };
        let seed = compute_seed(power_seed as u64, user.0, stream::EVENT_CHANCE + index as u32);
        if rng.check(seed, entry.chance) {
            fired.push(entry);
        }
    }
    fired
}

/// Derive the power seed of a follow-on activation from its parent's.
/// Keeping the derivation seeded (rather than reusing the parent seed)
/// stops a trigger chain from replaying the parent's rolls.
pub fn derive_trigger_seed(parent_seed: u32, child: crate::def::AbilityId, hop: u32) -> u32 {
    compute_seed(parent_seed as u64, child.0 as u64, stream::EVENT_CHANCE + 64 + hop) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::{AbilityId, EventAction};
    use crate::env::{Env, PcgRng};

    fn def_with_events() -> AbilityDefinition {
        let mut def = AbilityDefinition::new(AbilityId(5), "test-proc");
        def.events.push(EventEntry::always(EventType::OnEndPower, EventAction::UsePower {
            ability: AbilityId(6),
        }));
        def.events.push(EventEntry {
            event: EventType::OnContactTime,
            action: EventAction::GainSecondary { amount: 5.0 },
            chance: 0.5,
        });
        def.events.push(EventEntry {
            event: EventType::OnContactTime,
            action: EventAction::RefundEndurancePct { pct: 0.1 },
            chance: 0.0,
        });
        def
    }

    #[test]
    fn guaranteed_entries_fire_without_drawing() {
        let rng = PcgRng;
        let env: GameEnv<'_> = Env::new(None, None, None, None, Some(&rng));
        let def = def_with_events();
        let fired = triggered_entries(&def, EventType::OnEndPower, EntityId(1), 0, &env);
        assert_eq!(fired.len(), 1);
    }

    #[test]
    fn zero_chance_entries_never_fire() {
        let rng = PcgRng;
        let env: GameEnv<'_> = Env::new(None, None, None, None, Some(&rng));
        let def = def_with_events();
        for seed in 1..50u32 {
            let fired = triggered_entries(&def, EventType::OnContactTime, EntityId(1), seed, &env);
            assert!(!fired
                .iter()
                .any(|e| matches!(e.action, EventAction::RefundEndurancePct { .. })));
        }
    }

    #[test]
    fn chance_gates_are_seed_stable() {
        let rng = PcgRng;
        let env: GameEnv<'_> = Env::new(None, None, None, None, Some(&rng));
        let def = def_with_events();
        let a = triggered_entries(&def, EventType::OnContactTime, EntityId(1), 1234, &env).len();
        let b = triggered_entries(&def, EventType::OnContactTime, EntityId(1), 1234, &env).len();
        assert_eq!(a, b);
    }
}
