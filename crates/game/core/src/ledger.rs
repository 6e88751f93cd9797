//! # Cost / Cooldown Ledger
//!
//! Activation gating, resource costs, cooldown bookkeeping, and charge
//! replenishment.
//!
//! Cooldown state lives on the owner's attribute store (start time and
//! duration keyed by ability id) so it survives the instance being torn
//! down and can be reconciled after time spent out of the world. The
//! scheduler task that fires on expiry is transient and is rebuilt from
//! those attributes.
//!
//! Charges and cooldowns are two modes of the same gate: a charged
//! ability consumes a charge per activation and runs its cooldown as the
//! replenish timer; an uncharged ability is simply locked while its
//! cooldown runs.

use crate::attributes::{Attr, AttrStore};
use crate::def::{AbilityDefinition, AbilityId, well_known};
use crate::env::GameEnv;
use crate::power::PowerUseResult;
use crate::scheduler::{DeferredScheduler, PowerTask, TaskGroup, TaskHandle};
use crate::state::{Actor, EntityId, GameTime, Millis};

// ============================================================================
// Gating
// ============================================================================

/// The full activation gate, evaluated in a fixed order so the caller
/// always learns the most fundamental blocker first.
pub fn can_trigger(
    def: &AbilityDefinition,
    owner: &Actor,
    env: &GameEnv<'_>,
    now: GameTime,
) -> PowerUseResult {
    let Ok(tuning) = env.tuning() else {
        return PowerUseResult::GenericError;
    };
    if !tuning.ability_enabled(def.id) {
        return PowerUseResult::DisabledByConfig;
    }

    if owner.is_dead() && !def.usable_while_dead {
        return PowerUseResult::OwnerDead;
    }

    if let Ok(conditions) = env.conditions()
        && conditions.has_keyword(owner.id, well_known::SILENCE)
    {
        return PowerUseResult::RestrictedByCondition;
    }

    if def.uses_charges() {
        if owner.attrs.i64_p(Attr::ChargesAvailable, def.id.0) <= 0 {
            return PowerUseResult::InsufficientCharges;
        }
    } else if !cooldown_remaining(&owner.attrs, def.id, now).is_zero() {
        return PowerUseResult::Cooldown;
    }

    for (resource, cost) in &def.costs.endurance {
        if owner.attrs.f32_p(Attr::Endurance, resource.0) < *cost {
            return PowerUseResult::InsufficientEndurance;
        }
    }

    if def.costs.secondary > 0.0
        && !def.costs.secondary_optional
        && owner.attrs.f32(Attr::SecondaryResource) < def.costs.secondary
    {
        return PowerUseResult::InsufficientSecondaryResource;
    }

    if def.costs.health > 0.0 && owner.attrs.f32(Attr::Health) <= def.costs.health {
        return PowerUseResult::InsufficientEndurance;
    }

    PowerUseResult::Success
}

// ============================================================================
// Costs
// ============================================================================

/// Deduct the one-time activation costs. Callers run [`can_trigger`]
/// first; this only clamps, it does not re-validate.
pub fn pay_costs(def: &AbilityDefinition, attrs: &mut AttrStore) {
    for (resource, cost) in &def.costs.endurance {
        let next = (attrs.f32_p(Attr::Endurance, resource.0) - cost).max(0.0);
        attrs.set_f32_p(Attr::Endurance, resource.0, next);
    }
    if def.costs.secondary > 0.0 {
        let have = attrs.f32(Attr::SecondaryResource);
        attrs.set_f32(Attr::SecondaryResource, (have - def.costs.secondary).max(0.0));
    }
    if def.costs.health > 0.0 {
        let have = attrs.f32(Attr::Health);
        attrs.set_f32(Attr::Health, (have - def.costs.health).max(1.0));
    }
}

/// Charge one recurring-cost interval. Returns false when a pool ran
/// dry, which ends the channel or toggle.
pub fn pay_recurring(def: &AbilityDefinition, attrs: &mut AttrStore) -> bool {
    for (resource, cost) in &def.costs.endurance_recurring {
        let have = attrs.f32_p(Attr::Endurance, resource.0);
        if have < *cost {
            return false;
        }
        attrs.set_f32_p(Attr::Endurance, resource.0, have - cost);
    }
    true
}

/// Return a fraction of the one-time endurance cost (event action).
pub fn refund_endurance_pct(def: &AbilityDefinition, attrs: &mut AttrStore, pct: f32) {
    let pct = pct.clamp(0.0, 1.0);
    for (resource, cost) in &def.costs.endurance {
        let max = attrs.f32_p(Attr::EnduranceMax, resource.0);
        let next = attrs.f32_p(Attr::Endurance, resource.0) + cost * pct;
        let next = if max > 0.0 { next.min(max) } else { next };
        attrs.set_f32_p(Attr::Endurance, resource.0, next);
    }
}

// ============================================================================
// Cooldowns
// ============================================================================

/// Time left on an ability's cooldown. Zero when no cooldown is
/// recorded.
pub fn cooldown_remaining(attrs: &AttrStore, ability: AbilityId, now: GameTime) -> Millis {
    let duration = attrs.i64_p(Attr::CooldownDurationMs, ability.0);
    if duration <= 0 {
        return Millis::ZERO;
    }
    let start = attrs.i64_p(Attr::CooldownStartTime, ability.0) as u64;
    let end = GameTime(start + duration as u64);
    end.elapsed_since(now)
}

/// Effective cooldown duration: `(base + flat mods) * (1 + pct mods)`,
/// floored at the interrupt minimum when the activation was cut short,
/// and never negative.
pub fn compute_cooldown(def: &AbilityDefinition, attrs: &AttrStore, interrupted: bool) -> Millis {
    let mut flat = attrs.f32_p(Attr::CooldownFlatModMsForAbility, def.id.0);
    let mut pct = attrs.f32(Attr::CooldownPctModGlobal)
        + attrs.f32_p(Attr::CooldownPctModForAbility, def.id.0);
    for keyword in &def.keywords {
        flat += attrs.f32_p(Attr::CooldownFlatModMsForKeyword, keyword.0);
        pct += attrs.f32_p(Attr::CooldownPctModForKeyword, keyword.0);
    }

    let scaled = (def.cooldown.base_ms as f32 + flat) * (1.0 + pct);
    let mut duration = Millis::from_f32(scaled);
    if interrupted {
        duration = duration.max(Millis(def.cooldown.interrupt_floor_ms));
    }
    duration
}

/// Record a cooldown and schedule its expiry. Returns the duration and
/// the expiry task, or `None` if the effective duration was zero.
pub fn start_cooldown(
    def: &AbilityDefinition,
    attrs: &mut AttrStore,
    scheduler: &mut DeferredScheduler,
    group: TaskGroup,
    owner: EntityId,
    interrupted: bool,
) -> Option<(Millis, TaskHandle)> {
    let duration = compute_cooldown(def, attrs, interrupted);
    if duration.is_zero() {
        return None;
    }
    attrs.set_i64_p(Attr::CooldownStartTime, def.id.0, scheduler.now().0 as i64);
    attrs.set_i64_p(Attr::CooldownDurationMs, def.id.0, duration.0 as i64);
    attrs.remove(Attr::CooldownSavedElapsedMs, def.id.0);
    let handle =
        scheduler.schedule(duration, group, PowerTask::CooldownEnd { owner, ability: def.id });
    Some((duration, handle))
}

/// Clear all recorded cooldown state for an ability.
pub fn clear_cooldown(attrs: &mut AttrStore, ability: AbilityId) {
    attrs.remove(Attr::CooldownStartTime, ability.0);
    attrs.remove(Attr::CooldownDurationMs, ability.0);
    attrs.remove(Attr::CooldownSavedElapsedMs, ability.0);
}

/// Scale the remaining cooldown. `pct` below -1.0 clamps to a full
/// refund. Returns the rescheduled expiry task (the old one is
/// cancelled), or `None` if the cooldown finished as a result.
pub fn modify_cooldown_by_pct(
    attrs: &mut AttrStore,
    ability: AbilityId,
    pct: f32,
    scheduler: &mut DeferredScheduler,
    group: TaskGroup,
    owner: EntityId,
    expiry: Option<TaskHandle>,
) -> Option<TaskHandle> {
    let remaining = cooldown_remaining(attrs, ability, scheduler.now());
    if remaining.is_zero() {
        return expiry;
    }
    let pct = pct.max(-1.0);
    let adjusted = Millis::from_f32(remaining.0 as f32 * (1.0 + pct));
    reset_remaining(attrs, ability, adjusted, scheduler, group, owner, expiry)
}

/// Add or remove flat time on the remaining cooldown.
pub fn modify_cooldown_ms(
    attrs: &mut AttrStore,
    ability: AbilityId,
    delta_ms: i64,
    scheduler: &mut DeferredScheduler,
    group: TaskGroup,
    owner: EntityId,
    expiry: Option<TaskHandle>,
) -> Option<TaskHandle> {
    let remaining = cooldown_remaining(attrs, ability, scheduler.now());
    if remaining.is_zero() {
        return expiry;
    }
    let adjusted = remaining.0 as i64 + delta_ms;
    let adjusted = Millis(adjusted.max(0) as u64);
    reset_remaining(attrs, ability, adjusted, scheduler, group, owner, expiry)
}

fn reset_remaining(
    attrs: &mut AttrStore,
    ability: AbilityId,
    remaining: Millis,
    scheduler: &mut DeferredScheduler,
    group: TaskGroup,
    owner: EntityId,
    expiry: Option<TaskHandle>,
) -> Option<TaskHandle> {
    if let Some(handle) = expiry {
        scheduler.cancel(handle);
    }
    if remaining.is_zero() {
        // Fire the expiry path immediately so charge replenishment
        // still happens.
        return Some(scheduler.schedule(Millis::ZERO, group, PowerTask::CooldownEnd {
            owner,
            ability,
        }));
    }
    // Keep the recorded window consistent with the new expiry: same
    // start, duration covering elapsed + remaining.
    let start = attrs.i64_p(Attr::CooldownStartTime, ability.0) as u64;
    let elapsed = scheduler.now().elapsed_since(GameTime(start));
    attrs.set_i64_p(Attr::CooldownDurationMs, ability.0, (elapsed + remaining).0 as i64);
    Some(scheduler.schedule(remaining, group, PowerTask::CooldownEnd { owner, ability }))
}

// ============================================================================
// Charges
// ============================================================================

/// Seed the charge pool when an ability is first assigned.
pub fn grant_initial_charges(def: &AbilityDefinition, attrs: &mut AttrStore) {
    if def.uses_charges() && !attrs.has(Attr::ChargesMax, def.id.0) {
        attrs.set_i64_p(Attr::ChargesMax, def.id.0, def.cooldown.max_charges as i64);
        attrs.set_i64_p(Attr::ChargesAvailable, def.id.0, def.cooldown.max_charges as i64);
    }
}

/// Spend one charge for an activation. If no replenish cycle is running
/// yet, start one. Returns the new expiry task if one was scheduled.
pub fn consume_charge(
    def: &AbilityDefinition,
    attrs: &mut AttrStore,
    scheduler: &mut DeferredScheduler,
    group: TaskGroup,
    owner: EntityId,
) -> Option<(Millis, TaskHandle)> {
    debug_assert!(def.uses_charges());
    attrs.adjust_i64_p(Attr::ChargesAvailable, def.id.0, -1);
    if cooldown_remaining(attrs, def.id, scheduler.now()).is_zero() {
        start_cooldown(def, attrs, scheduler, group, owner, false)
    } else {
        None
    }
}

/// Cooldown expiry handler. For charged abilities this replenishes one
/// charge and restarts the cycle while below the cap; for plain
/// cooldowns it clears the record. Returns the next expiry task, if any.
pub fn on_cooldown_end(
    def: &AbilityDefinition,
    attrs: &mut AttrStore,
    scheduler: &mut DeferredScheduler,
    group: TaskGroup,
    owner: EntityId,
) -> Option<(Millis, TaskHandle)> {
    if !def.uses_charges() {
        clear_cooldown(attrs, def.id);
        return None;
    }

    let max = attrs.i64_p(Attr::ChargesMax, def.id.0);
    let available = attrs.i64_p(Attr::ChargesAvailable, def.id.0);
    let replenished = (available + 1).min(max);
    attrs.set_i64_p(Attr::ChargesAvailable, def.id.0, replenished);

    if replenished < max {
        clear_cooldown(attrs, def.id);
        start_cooldown(def, attrs, scheduler, group, owner, false)
    } else {
        clear_cooldown(attrs, def.id);
        None
    }
}

// ============================================================================
// Persistence / Reconciliation
// ============================================================================

/// Freeze a running cooldown before the owner leaves the world: record
/// elapsed time so the window can be rebuilt later. The expiry task is
/// cancelled by the caller's group teardown.
pub fn suspend_cooldown(attrs: &mut AttrStore, ability: AbilityId, now: GameTime) {
    let duration = attrs.i64_p(Attr::CooldownDurationMs, ability.0);
    if duration <= 0 {
        return;
    }
    let start = attrs.i64_p(Attr::CooldownStartTime, ability.0) as u64;
    let elapsed = now.elapsed_since(GameTime(start));
    attrs.set_i64_p(Attr::CooldownSavedElapsedMs, ability.0, elapsed.0 as i64);
    attrs.remove(Attr::CooldownStartTime, ability.0);
}

/// Rebuild cooldown state on reassignment, crediting `offline` time.
/// Charged abilities bank one replenish per full cycle elapsed while
/// away. Returns the rescheduled expiry task, if the window is still
/// open.
pub fn reconcile_cooldown(
    def: &AbilityDefinition,
    attrs: &mut AttrStore,
    scheduler: &mut DeferredScheduler,
    group: TaskGroup,
    owner: EntityId,
    offline: Millis,
) -> Option<(Millis, TaskHandle)> {
    let duration = attrs.i64_p(Attr::CooldownDurationMs, def.id.0);
    if duration <= 0 {
        return None;
    }
    let duration = duration as u64;
    let mut elapsed = attrs.i64_p(Attr::CooldownSavedElapsedMs, def.id.0) as u64 + offline.0;
    attrs.remove(Attr::CooldownSavedElapsedMs, def.id.0);

    if def.uses_charges() {
        let max = attrs.i64_p(Attr::ChargesMax, def.id.0);
        let mut available = attrs.i64_p(Attr::ChargesAvailable, def.id.0);
        while elapsed >= duration && available < max {
            available += 1;
            elapsed -= duration;
        }
        attrs.set_i64_p(Attr::ChargesAvailable, def.id.0, available);
        if available >= max {
            clear_cooldown(attrs, def.id);
            return None;
        }
    } else if elapsed >= duration {
        clear_cooldown(attrs, def.id);
        return None;
    }

    // Re-key the window off the current clock; only the remaining time
    // matters from here on.
    let now = scheduler.now();
    let remaining = Millis(duration - elapsed);
    attrs.set_i64_p(Attr::CooldownStartTime, def.id.0, now.0 as i64);
    attrs.set_i64_p(Attr::CooldownDurationMs, def.id.0, remaining.0 as i64);
    let handle =
        scheduler.schedule(remaining, group, PowerTask::CooldownEnd { owner, ability: def.id });
    Some((remaining, handle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::ResourceId;

    fn cooled_def(base_ms: u64) -> AbilityDefinition {
        let mut def = AbilityDefinition::new(AbilityId(7), "test-bolt");
        def.cooldown.base_ms = base_ms;
        def
    }

    #[test]
    fn cooldown_formula_applies_flat_then_pct() {
        let def = cooled_def(4000);
        let mut attrs = AttrStore::new();
        attrs.set_f32_p(Attr::CooldownFlatModMsForAbility, 7, 1000.0);
        attrs.set_f32(Attr::CooldownPctModGlobal, -0.5);
        assert_eq!(compute_cooldown(&def, &attrs, false), Millis(2500));
    }

    #[test]
    fn cooldown_never_goes_negative() {
        let def = cooled_def(1000);
        let mut attrs = AttrStore::new();
        attrs.set_f32(Attr::CooldownPctModGlobal, -3.0);
        assert_eq!(compute_cooldown(&def, &attrs, false), Millis::ZERO);
    }

    #[test]
    fn interrupt_floor_applies_only_when_interrupted() {
        let mut def = cooled_def(100);
        def.cooldown.interrupt_floor_ms = 1500;
        let attrs = AttrStore::new();
        assert_eq!(compute_cooldown(&def, &attrs, false), Millis(100));
        assert_eq!(compute_cooldown(&def, &attrs, true), Millis(1500));
    }

    #[test]
    fn start_and_expire_round_trip() {
        let def = cooled_def(5000);
        let mut attrs = AttrStore::new();
        let mut sched = DeferredScheduler::new();
        let group = sched.new_group();

        let (duration, _) =
            start_cooldown(&def, &mut attrs, &mut sched, group, EntityId(1), false).unwrap();
        assert_eq!(duration, Millis(5000));
        assert_eq!(cooldown_remaining(&attrs, def.id, GameTime(2000)), Millis(3000));

        let fired = sched.pop_due(GameTime(5000)).unwrap();
        assert!(matches!(fired.task, PowerTask::CooldownEnd { .. }));
        on_cooldown_end(&def, &mut attrs, &mut sched, group, EntityId(1));
        assert_eq!(cooldown_remaining(&attrs, def.id, GameTime(5000)), Millis::ZERO);
    }

    #[test]
    fn pct_modifier_clamps_to_full_refund() {
        let def = cooled_def(6000);
        let mut attrs = AttrStore::new();
        let mut sched = DeferredScheduler::new();
        let group = sched.new_group();
        let (_, expiry) =
            start_cooldown(&def, &mut attrs, &mut sched, group, EntityId(1), false).unwrap();

        let next = modify_cooldown_by_pct(
            &mut attrs,
            def.id,
            -5.0,
            &mut sched,
            group,
            EntityId(1),
            Some(expiry),
        );
        // Full refund fires the expiry path on the next drain.
        let fired = sched.pop_due(GameTime(0)).unwrap();
        assert_eq!(Some(fired.handle), next);
    }

    #[test]
    fn charges_replenish_one_cycle_at_a_time() {
        let mut def = cooled_def(3000);
        def.cooldown.max_charges = 3;
        let mut attrs = AttrStore::new();
        let mut sched = DeferredScheduler::new();
        let group = sched.new_group();
        grant_initial_charges(&def, &mut attrs);
        assert_eq!(attrs.i64_p(Attr::ChargesAvailable, 7), 3);

        consume_charge(&def, &mut attrs, &mut sched, group, EntityId(1));
        consume_charge(&def, &mut attrs, &mut sched, group, EntityId(1));
        assert_eq!(attrs.i64_p(Attr::ChargesAvailable, 7), 1);
        // Only the first consume starts a replenish cycle.
        assert_eq!(sched.pending_count(), 1);

        sched.pop_due(GameTime(3000)).unwrap();
        let next = on_cooldown_end(&def, &mut attrs, &mut sched, group, EntityId(1));
        assert_eq!(attrs.i64_p(Attr::ChargesAvailable, 7), 2);
        assert!(next.is_some(), "below cap, the cycle restarts");

        sched.pop_due(GameTime(6000)).unwrap();
        let next = on_cooldown_end(&def, &mut attrs, &mut sched, group, EntityId(1));
        assert_eq!(attrs.i64_p(Attr::ChargesAvailable, 7), 3);
        assert!(next.is_none(), "at cap, the cycle stops");
    }

    #[test]
    fn reconcile_credits_full_offline_cycles() {
        let mut def = cooled_def(2000);
        def.cooldown.max_charges = 3;
        let mut attrs = AttrStore::new();
        let mut sched = DeferredScheduler::new();
        let group = sched.new_group();
        grant_initial_charges(&def, &mut attrs);

        attrs.set_i64_p(Attr::ChargesAvailable, 7, 0);
        attrs.set_i64_p(Attr::CooldownDurationMs, 7, 2000);
        attrs.set_i64_p(Attr::CooldownSavedElapsedMs, 7, 500);

        // 500 saved + 4600 offline = 5100: two full cycles plus 1100ms
        // into the third.
        let restored =
            reconcile_cooldown(&def, &mut attrs, &mut sched, group, EntityId(1), Millis(4600));
        assert_eq!(attrs.i64_p(Attr::ChargesAvailable, 7), 2);
        let (remaining, _) = restored.unwrap();
        assert_eq!(remaining, Millis(900));
    }

    #[test]
    fn gating_prefers_cooldown_over_resources() {
        let mut def = cooled_def(5000);
        def.costs.endurance = alloc::vec![(ResourceId(0), 50.0)];
        let mut owner = Actor::new(EntityId(1), crate::math::Vec3::ZERO, crate::state::AllianceId(0));
        owner.attrs.set_f32(Attr::Health, 100.0);
        // No endurance at all, and a running cooldown.
        owner.attrs.set_i64_p(Attr::CooldownStartTime, 7, 0);
        owner.attrs.set_i64_p(Attr::CooldownDurationMs, 7, 5000);

        let tuning = crate::env::DefaultTuning;
        let rng = crate::env::PcgRng;
        let env: GameEnv<'_> =
            crate::env::Env::new(None, None, None, Some(&tuning), Some(&rng));
        assert_eq!(can_trigger(&def, &owner, &env, GameTime(1000)), PowerUseResult::Cooldown);
    }
}
