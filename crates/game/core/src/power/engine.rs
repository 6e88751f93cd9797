//! The engine facade: owns instances, the world, and the scheduler, and
//! dispatches every deferred task back into the matching subsystem.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use crate::attributes::Attr;
use crate::def::{AbilityDefinition, AbilityId, EventAction, EventType};
use crate::env::{GameEnv, compute_seed, stream};
use crate::error::PowerError;
use crate::ledger;
use crate::payload::{Payload, results_for_target, speed_to_delay};
use crate::scheduler::{DeferredScheduler, PowerTask, ScheduledTask, TaskHandle};
use crate::state::{EntityId, GameTime, Millis, World};
use crate::targeting;

use super::events::{derive_trigger_seed, triggered_entries};
use super::instance::{AbilityInstance, PowerPhase, replace_slot};
use super::{ActivationFlags, ActivationSettings, EndFlags, EngineNotice, PowerUseResult};

/// The ability activation and resolution engine.
///
/// Single-threaded and cooperative: every externally driven step
/// (`activate`, `end_power`, `tick`) runs to completion before the next
/// one starts, and all timed behavior is funneled through the owned
/// scheduler. The engine performs no I/O; facts worth broadcasting are
/// queued as [`EngineNotice`]s for the caller to drain.
#[derive(Debug, Default)]
pub struct PowerEngine {
    pub world: World,
    pub scheduler: DeferredScheduler,
    instances: BTreeMap<(EntityId, AbilityId), AbilityInstance>,
    notices: Vec<EngineNotice>,
}

impl PowerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Assignment
    // ------------------------------------------------------------------

    /// Give `owner` the ability: create its instance and seed charges.
    pub fn assign(
        &mut self,
        owner: EntityId,
        ability: AbilityId,
        env: &GameEnv<'_>,
    ) -> Result<(), PowerError> {
        let def = lookup_def(env, ability)?;
        let actor = self.world.actor_mut(owner).ok_or(PowerError::UnknownEntity(owner))?;
        ledger::grant_initial_charges(def, &mut actor.attrs);
        let group = self.scheduler.new_group();
        self.instances
            .entry((owner, ability))
            .or_insert_with(|| AbilityInstance::new(owner, ability, group));
        Ok(())
    }

    /// Remove the ability: end any activation, drop every pending task.
    /// Cooldown attributes stay on the owner for later reconciliation.
    pub fn unassign(&mut self, owner: EntityId, ability: AbilityId, env: &GameEnv<'_>) {
        self.end_power(owner, ability, EndFlags::UNASSIGN, env);
        if let Some(instance) = self.instances.remove(&(owner, ability)) {
            if let Some(actor) = self.world.actor_mut(owner) {
                ledger::suspend_cooldown(&mut actor.attrs, ability, self.scheduler.now());
            }
            self.scheduler.cancel_group(instance.group);
        }
    }

    /// Tear down every instance of an owner leaving the world, freezing
    /// cooldowns for reconciliation on return.
    pub fn exit_world(&mut self, owner: EntityId, env: &GameEnv<'_>) {
        let abilities: Vec<AbilityId> =
            self.instances.keys().filter(|(o, _)| *o == owner).map(|(_, a)| *a).collect();
        for ability in abilities {
            self.end_power(owner, ability, EndFlags::EXIT_WORLD | EndFlags::FORCE, env);
            if let Some(actor) = self.world.actor_mut(owner) {
                ledger::suspend_cooldown(&mut actor.attrs, ability, self.scheduler.now());
                actor.attrs.remove(Attr::ToggledOn, ability.0);
            }
            if let Some(instance) = self.instances.get_mut(&(owner, ability)) {
                self.scheduler.cancel_group(instance.group);
                instance.cooldown_task = None;
                instance.charge_task = None;
                instance.channel_task = None;
                instance.end_task = None;
                instance.recurring_task = None;
                instance.extra_timeout_task = None;
            }
        }
    }

    /// Rebuild cooldown windows after `offline` time away, crediting
    /// full charge cycles that elapsed meanwhile.
    pub fn reconcile(&mut self, owner: EntityId, offline: Millis, env: &GameEnv<'_>) {
        let abilities: Vec<AbilityId> =
            self.instances.keys().filter(|(o, _)| *o == owner).map(|(_, a)| *a).collect();
        for ability in abilities {
            let Ok(def) = lookup_def(env, ability) else {
                continue;
            };
            let Some(actor) = self.world.actor_mut(owner) else {
                continue;
            };
            let instance = match self.instances.get_mut(&(owner, ability)) {
                Some(instance) => instance,
                None => continue,
            };
            let restored = ledger::reconcile_cooldown(
                def,
                &mut actor.attrs,
                &mut self.scheduler,
                instance.group,
                owner,
                offline,
            );
            instance.cooldown_task = restored.map(|(_, handle)| handle);
        }
    }

    // ------------------------------------------------------------------
    // Activation
    // ------------------------------------------------------------------

    /// Attempt an activation. Any outcome except
    /// [`PowerUseResult::Success`] leaves all state untouched.
    pub fn activate(
        &mut self,
        owner: EntityId,
        ability: AbilityId,
        settings: ActivationSettings,
        env: &GameEnv<'_>,
    ) -> PowerUseResult {
        match self.try_activate(owner, ability, settings, env) {
            Ok(result) => {
                if !result.is_success() {
                    self.notices.push(EngineNotice::ActivationRejected { owner, ability, result });
                }
                result
            }
            Err(error) => {
                self.notices.push(EngineNotice::Fault { error });
                self.notices.push(EngineNotice::ActivationRejected {
                    owner,
                    ability,
                    result: PowerUseResult::GenericError,
                });
                PowerUseResult::GenericError
            }
        }
    }

    fn try_activate(
        &mut self,
        owner: EntityId,
        ability: AbilityId,
        mut settings: ActivationSettings,
        env: &GameEnv<'_>,
    ) -> Result<PowerUseResult, PowerError> {
        let def = lookup_def(env, ability)?;
        if !self.instances.contains_key(&(owner, ability)) {
            return Err(PowerError::NotAssigned { owner, ability });
        }
        let now = self.scheduler.now();

        // Toggle-off: second activation of a live toggle just ends it.
        // No costs, no cooldown.
        if def.toggled {
            let toggled_on = self
                .world
                .actor(owner)
                .is_some_and(|a| a.attrs.flag_p(Attr::ToggledOn, ability.0));
            if toggled_on {
                self.end_power(owner, ability, EndFlags::EXPLICIT_CANCEL | EndFlags::FORCE, env);
                return Ok(PowerUseResult::Success);
            }
        }

        {
            let instance = &self.instances[&(owner, ability)];
            // Refresh gate: a flat re-fire delay independent of cooldown.
            if def.timing.refresh_ms > 0
                && let Some(last) = instance.last_activation_at
                && now.elapsed_since(last) < Millis(def.timing.refresh_ms)
            {
                return Ok(PowerUseResult::Cooldown);
            }
            // A running activation inside its no-interrupt window
            // blocks re-entry outright; outside the window it gets
            // interrupted below, once every gate has passed.
            if instance.phase.is_active()
                && def.extra_activate.is_none()
                && instance.in_no_interrupt_window(now, EndFlags::INTERRUPTING)
            {
                return Ok(PowerUseResult::Cooldown);
            }
        }

        {
            let actor = self.world.actor(owner).ok_or(PowerError::UnknownEntity(owner))?;
            let gate = ledger::can_trigger(def, actor, env, now);
            if !gate.is_success() {
                return Ok(gate);
            }

            // Target validation happens against the live world before
            // any state is committed.
            settings.user_position = actor.position;
            if def.style.needs_target {
                match self.world.actor(settings.target) {
                    Some(aimed) if targeting::valid_target(def, actor, aimed, env) => {
                        settings.target_position = aimed.position;
                    }
                    _ => return Ok(PowerUseResult::BadTarget),
                }
            }
            if !settings.flags.contains(ActivationFlags::SKIP_RANGE_CHECK)
                && !targeting::within_application_range(
                    def,
                    actor.position,
                    settings.target_position,
                )
            {
                return Ok(PowerUseResult::BadTarget);
            }
        }

        // Gate passed: commit. A still-running previous activation is
        // interrupted first, then costs, the charge/cooldown ledger,
        // and the phase bring-up.
        if self.instances[&(owner, ability)].phase.is_active() && def.extra_activate.is_none() {
            self.end_power(owner, ability, EndFlags::INTERRUPTING | EndFlags::FORCE, env);
        }
        let group = self.instances[&(owner, ability)].group;
        {
            let started = {
                let actor =
                    self.world.actor_mut(owner).ok_or(PowerError::UnknownEntity(owner))?;
                ledger::pay_costs(def, &mut actor.attrs);

                if def.uses_charges() {
                    ledger::consume_charge(
                        def,
                        &mut actor.attrs,
                        &mut self.scheduler,
                        group,
                        owner,
                    )
                } else if def.extra_activate.is_none() && !def.cooldown.starts_on_end {
                    ledger::start_cooldown(
                        def,
                        &mut actor.attrs,
                        &mut self.scheduler,
                        group,
                        owner,
                        false,
                    )
                } else {
                    None
                }
            };
            if let Some((duration, handle)) = started {
                self.set_cooldown_task(owner, ability, Some(handle));
                self.notices.push(EngineNotice::CooldownStarted { owner, ability, duration });
            }

            // Hostile activations break stealth unless the ability is
            // built not to.
            if def.reach.targets_enemies
                && !def.preserves_stealth
                && let Ok(conditions) = env.conditions()
                && let Some(stealth) = conditions.stealth_condition(owner)
            {
                conditions.remove(stealth);
            }

            if def.toggled
                && let Some(actor) = self.world.actor_mut(owner)
            {
                actor.attrs.set_flag_p(Attr::ToggledOn, ability.0, true);
            }
        }

        // Multi-tap bookkeeping: cooldown lands when the tap budget is
        // spent or the window times out.
        if let Some(extra) = &def.extra_activate {
            let instance = self.instances.get_mut(&(owner, ability)).expect("instance checked");
            instance.activation_count += 1;
            if instance.activation_count >= extra.activations_before_cooldown {
                instance.activation_count = 0;
                replace_slot(&mut self.scheduler, &mut instance.extra_timeout_task, None);
                self.start_cooldown_now(owner, ability, def, false);
            } else {
                let handle = self.scheduler.schedule(
                    Millis(extra.timeout_ms),
                    group,
                    PowerTask::ExtraActivateTimeout { owner, ability },
                );
                let instance = self.instances.get_mut(&(owner, ability)).expect("instance checked");
                replace_slot(&mut self.scheduler, &mut instance.extra_timeout_task, Some(handle));
            }
        }

        {
            let instance = self.instances.get_mut(&(owner, ability)).expect("instance checked");
            instance.settings = Some(settings.clone());
            instance.last_activation_at = Some(now);
            instance.loops_done = 0;
        }

        self.notices.push(EngineNotice::Activated {
            owner,
            ability,
            target: settings.target,
            target_position: settings.target_position,
            fx_seed: settings.fx_seed,
            at: now,
        });
        if def.toggled {
            self.notices.push(EngineNotice::ToggleChanged { owner, ability, on: true });
        }

        if def.timing.charge_ms > 0 {
            let instance = self.instances.get_mut(&(owner, ability)).expect("instance checked");
            instance.phase = PowerPhase::Charging;
            instance.activated_at = now;
            let handle = self.scheduler.schedule(
                Millis(def.timing.charge_ms),
                group,
                PowerTask::ChargeComplete { owner, ability },
            );
            let instance = self.instances.get_mut(&(owner, ability)).expect("instance checked");
            replace_slot(&mut self.scheduler, &mut instance.charge_task, Some(handle));
        } else {
            self.begin_active_phase(owner, ability, def, env)?;
        }

        // Toggles with upkeep start their recurring cost clock.
        if def.toggled && !def.costs.endurance_recurring.is_empty() {
            let interval = Millis(def.costs.recurring_interval_ms.max(1));
            let handle =
                self.scheduler.schedule(interval, group, PowerTask::RecurringCost { owner, ability });
            let instance = self.instances.get_mut(&(owner, ability)).expect("instance checked");
            replace_slot(&mut self.scheduler, &mut instance.recurring_task, Some(handle));
        }

        self.run_events(def, EventType::OnActivate, owner, &settings, env);
        if def.toggled {
            self.run_events(def, EventType::OnToggleOn, owner, &settings, env);
        }

        Ok(PowerUseResult::Success)
    }

    /// Phase bring-up once any charge-up has completed.
    fn begin_active_phase(
        &mut self,
        owner: EntityId,
        ability: AbilityId,
        def: &AbilityDefinition,
        env: &GameEnv<'_>,
    ) -> Result<(), PowerError> {
        let now = self.scheduler.now();
        let group = self.instances[&(owner, ability)].group;
        {
            let instance = self.instances.get_mut(&(owner, ability)).expect("instance checked");
            instance.activated_at = now;
            instance.no_interrupt_until = now + Millis(def.timing.no_interrupt_pre_ms);
            replace_slot(&mut self.scheduler, &mut instance.charge_task, None);
        }

        self.apply_power(owner, ability, def, env)?;

        if def.is_channeled() {
            let instance = self.instances.get_mut(&(owner, ability)).expect("instance checked");
            instance.phase = PowerPhase::ChannelStarting;
            let handle = self.scheduler.schedule(
                Millis(def.timing.channel_start_ms),
                group,
                PowerTask::ChannelStart { owner, ability },
            );
            let instance = self.instances.get_mut(&(owner, ability)).expect("instance checked");
            replace_slot(&mut self.scheduler, &mut instance.channel_task, Some(handle));
        } else if def.timing.activation_ms == 0 && !def.toggled {
            // Instant abilities complete on the activation tick.
            let instance = self.instances.get_mut(&(owner, ability)).expect("instance checked");
            instance.phase = PowerPhase::Active;
            self.finalize_end(owner, ability, def, EndFlags::empty(), env);
        } else {
            let instance = self.instances.get_mut(&(owner, ability)).expect("instance checked");
            instance.phase = PowerPhase::Active;
            if !def.toggled {
                let end_at = now + Millis(def.timing.activation_ms);
                instance.scheduled_end_at = Some(end_at);
                let handle = self.scheduler.schedule(
                    Millis(def.timing.activation_ms),
                    group,
                    PowerTask::EndPower { owner, ability, flags: EndFlags::empty() },
                );
                let instance =
                    self.instances.get_mut(&(owner, ability)).expect("instance checked");
                replace_slot(&mut self.scheduler, &mut instance.end_task, Some(handle));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Application and delivery
    // ------------------------------------------------------------------

    /// Build the payload for the current activation and hand it to
    /// delivery, possibly after projectile travel.
    fn apply_power(
        &mut self,
        owner: EntityId,
        ability: AbilityId,
        def: &AbilityDefinition,
        env: &GameEnv<'_>,
    ) -> Result<(), PowerError> {
        let now = self.scheduler.now();
        let group = self.instances[&(owner, ability)].group;
        let settings = self.instances[&(owner, ability)]
            .settings
            .clone()
            .ok_or(PowerError::PhaseDesync { ability, phase: "apply-without-settings".into() })?;
        let user = self.world.actor(owner).ok_or(PowerError::UnknownEntity(owner))?;

        let mut aim = if settings.target.is_valid() {
            self.world.actor(settings.target).map_or(settings.target_position, |t| t.position)
        } else {
            settings.target_position
        };
        aim = targeting::scatter_aim(
            env,
            aim,
            def.style.random_position_radius,
            owner,
            settings.power_seed,
        );

        let payload = Payload::init(
            def,
            user,
            env,
            settings.target,
            aim,
            settings.power_seed,
            settings.fx_seed,
            now,
        );

        let travel = payload.travel_time(def.timing.projectile_speed);
        if travel.is_zero() {
            self.deliver_payload(payload, env)?;
        } else {
            self.scheduler.schedule(travel, group, PowerTask::DeliverPayload { payload });
        }
        Ok(())
    }

    /// Deliver a payload: resolve targets, roll and apply per-target
    /// results, then keep the chain going (beam slices, bounce hops).
    fn deliver_payload(&mut self, payload: Payload, env: &GameEnv<'_>) -> Result<(), PowerError> {
        let def = lookup_def(env, payload.ability)?;
        // The user may have despawned mid-flight; the payload dies with
        // them since shapes anchor on user state.
        if self.world.actor(payload.user).is_none() {
            return Ok(());
        }

        let inputs = targeting::ResolveInputs {
            def,
            user: payload.user,
            user_position: payload.user_position,
            aim_target: payload.target,
            aim_position: payload.target_position,
            power_seed: payload.power_seed,
            beam_slice: payload.beam_slice,
        };
        let targets = targeting::resolve_targets(&self.world, env, &inputs)?;
        let now = self.scheduler.now();

        let mut first_hit: Option<EntityId> = None;
        let mut life_steal_total = 0.0f32;
        for target_id in &targets {
            let Some(target) = self.world.actor(*target_id) else {
                continue;
            };
            let mut results = results_for_target(&payload, target, env);

            // Condition riders, chance-gated per target.
            if let Ok(conditions) = env.conditions() {
                for (index, spec) in payload.conditions.iter().enumerate() {
                    let apply = if spec.chance >= 1.0 {
                        true
                    } else if let Ok(rng) = env.rng() {
                        let seed = compute_seed(
                            payload.power_seed as u64,
                            target_id.0,
                            stream::CONDITION_CHANCE + index as u32,
                        );
                        rng.check(seed, spec.chance)
                    } else {
                        false
                    };
                    if apply {
                        conditions.apply(*target_id, spec, payload.ability, now);
                    }
                }
            }

            if payload.life_steal_pct > 0.0 {
                life_steal_total += results.total_damage() * payload.life_steal_pct;
            }

            let target = self.world.actor_mut(*target_id).expect("target existed above");
            results.apply_to(target);
            first_hit.get_or_insert(*target_id);

            self.notices.push(EngineNotice::ResultsApplied {
                owner: payload.user,
                ability: payload.ability,
                target: *target_id,
                damage: results.damage,
                healing: results.healing,
                flags: results.flags,
                at: now,
            });
        }

        if life_steal_total > 0.0
            && let Some(beneficiary) = self.world.actor_mut(payload.ultimate_owner)
        {
            let max = beneficiary.attrs.f32(Attr::HealthMax);
            let mut health = beneficiary.attrs.f32(Attr::Health) + life_steal_total;
            if max > 0.0 {
                health = health.min(max);
            }
            beneficiary.attrs.set_f32(Attr::Health, health);
        }

        if first_hit.is_some()
            && let Some(instance) = self.instances.get(&(payload.user, payload.ability))
            && let Some(settings) = instance.settings.clone()
        {
            self.run_events(def, EventType::OnContactTime, payload.user, &settings, env);
        }

        self.continue_beam_sweep(&payload, def, env);
        self.continue_bounce(payload, def, first_hit, env);
        Ok(())
    }

    /// Schedule the next beam sweep slice, if any remain.
    fn continue_beam_sweep(&mut self, payload: &Payload, def: &AbilityDefinition, _env: &GameEnv<'_>) {
        let Some(slice) = payload.beam_slice else {
            return;
        };
        let total_ms = targeting::sweep_duration_ms(def);
        let count = targeting::beam_slice_count(total_ms, def.timing.beam_slice_ms);
        if slice + 1 >= count {
            return;
        }
        let Some(instance) = self.instances.get(&(payload.user, payload.ability)) else {
            return;
        };
        // A cancelled sweep stops producing slices.
        if !instance.phase.is_active() {
            return;
        }
        let mut next = payload.clone();
        next.beam_slice = Some(slice + 1);
        self.scheduler.schedule(
            Millis(def.timing.beam_slice_ms),
            instance.group,
            PowerTask::DeliverPayload { payload: next },
        );
    }

    /// Retarget and schedule the next bounce hop, if the chain lives on.
    fn continue_bounce(
        &mut self,
        mut payload: Payload,
        def: &AbilityDefinition,
        hit: Option<EntityId>,
        env: &GameEnv<'_>,
    ) {
        let Some(hit) = hit else {
            return;
        };
        let Some(bounce) = &payload.bounce else {
            return;
        };
        if bounce.remaining <= 0 {
            return;
        }
        let hit_position =
            self.world.actor(hit).map_or(payload.target_position, |a| a.position);

        // Candidates around the entity just hit, excluding the chain's
        // history unless repeats are allowed.
        let Some(user) = self.world.actor(payload.user) else {
            return;
        };
        let candidates: Vec<EntityId> = self
            .world
            .actors()
            .filter(|c| c.id != hit)
            .filter(|c| bounce.allow_repeats || !bounce.previous_targets.contains(&c.id))
            .filter(|c| targeting::valid_target(def, user, c, env))
            .filter(|c| c.position.distance2d(hit_position) <= bounce.range + c.bounds_radius)
            .map(|c| c.id)
            .collect();
        if candidates.is_empty() {
            return;
        }

        let hop_index = bounce.previous_targets.len() as u32;
        let pick = match env.rng() {
            Ok(rng) => {
                let seed = compute_seed(
                    payload.power_seed as u64,
                    hit.0,
                    stream::BOUNCE_PICK + hop_index,
                );
                rng.below(seed, candidates.len() as u32) as usize
            }
            Err(_) => 0,
        };
        let next_id = candidates[pick];
        let next_position = self.world.actor(next_id).map_or(hit_position, |a| a.position);

        let speed = bounce.speed;
        payload.retarget_for_bounce(next_id, next_position);

        let Some(instance) = self.instances.get(&(payload.user, payload.ability)) else {
            return;
        };
        let delay = speed_to_delay(hit_position, next_position, speed);
        self.scheduler.schedule(delay, instance.group, PowerTask::DeliverPayload { payload });
    }

    // ------------------------------------------------------------------
    // Ending
    // ------------------------------------------------------------------

    /// Request the end of a running activation. Returns true when the
    /// end was accepted (possibly deferred past the minimum channel
    /// time), false when refused or nothing was running.
    pub fn end_power(
        &mut self,
        owner: EntityId,
        ability: AbilityId,
        flags: EndFlags,
        env: &GameEnv<'_>,
    ) -> bool {
        let Ok(def) = lookup_def(env, ability) else {
            return false;
        };
        let Some(instance) = self.instances.get_mut(&(owner, ability)) else {
            return false;
        };
        if !instance.phase.is_active() {
            return false;
        }
        let now = self.scheduler.now();

        if instance.in_no_interrupt_window(now, flags) {
            return false;
        }
        // Near the scheduled end an explicit cancel gains nothing and
        // only races the natural end; refuse it.
        if flags.contains(EndFlags::EXPLICIT_CANCEL)
            && !flags.contains(EndFlags::FORCE)
            && def.timing.no_interrupt_post_ms > 0
            && let Some(end_at) = instance.scheduled_end_at
            && now + Millis(def.timing.no_interrupt_post_ms) >= end_at
        {
            return false;
        }

        // Minimum channel time: defer the end, remembering why.
        if instance.phase.is_channeling()
            && !flags.contains(EndFlags::FORCE)
            && !flags.is_teardown()
            && !flags.contains(EndFlags::WAIT_FOR_MIN_TIME)
            && def.timing.channel_min_ms > 0
        {
            let served = instance.channel_elapsed(now);
            if served < Millis(def.timing.channel_min_ms) {
                let remaining = Millis(def.timing.channel_min_ms).saturating_sub(served);
                instance.phase = PowerPhase::MinTimeEnding;
                instance.pending_end_flags = Some(flags);
                let group = instance.group;
                let handle = self.scheduler.schedule(remaining, group, PowerTask::EndPower {
                    owner,
                    ability,
                    flags: flags | EndFlags::WAIT_FOR_MIN_TIME,
                });
                let instance =
                    self.instances.get_mut(&(owner, ability)).expect("instance checked");
                replace_slot(&mut self.scheduler, &mut instance.end_task, Some(handle));
                return true;
            }
        }

        // Channel wind-down: one more phase before the real end.
        if matches!(instance.phase, PowerPhase::Channeling | PowerPhase::MinTimeEnding)
            && !flags.is_teardown()
            && def.timing.channel_end_ms > 0
        {
            instance.phase = PowerPhase::LoopEnding;
            instance.pending_end_flags = Some(flags);
            let group = instance.group;
            let handle = self.scheduler.schedule(
                Millis(def.timing.channel_end_ms),
                group,
                PowerTask::EndPower { owner, ability, flags: flags | EndFlags::FORCE },
            );
            let instance = self.instances.get_mut(&(owner, ability)).expect("instance checked");
            replace_slot(&mut self.scheduler, &mut instance.end_task, Some(handle));
            return true;
        }

        self.finalize_end(owner, ability, def, flags, env);
        true
    }

    /// Unconditional teardown of the running activation: cancel pending
    /// transitions, settle the cooldown, fire end events.
    fn finalize_end(
        &mut self,
        owner: EntityId,
        ability: AbilityId,
        def: &AbilityDefinition,
        flags: EndFlags,
        env: &GameEnv<'_>,
    ) {
        let now = self.scheduler.now();
        let settings = {
            let Some(instance) = self.instances.get_mut(&(owner, ability)) else {
                return;
            };
            instance.cancel_transitions(&mut self.scheduler);
            instance.phase = PowerPhase::Inactive;
            instance.settings.clone()
        };

        let was_toggled_on = self
            .world
            .actor(owner)
            .is_some_and(|a| a.attrs.flag_p(Attr::ToggledOn, ability.0));
        if def.toggled && was_toggled_on {
            if let Some(actor) = self.world.actor_mut(owner) {
                actor.attrs.set_flag_p(Attr::ToggledOn, ability.0, false);
            }
            self.notices.push(EngineNotice::ToggleChanged { owner, ability, on: false });
            if !flags.is_teardown()
                && let Some(settings) = settings.as_ref()
            {
                self.run_events(def, EventType::OnToggleOff, owner, settings, env);
            }
        }

        if def.cooldown.starts_on_end && !def.uses_charges() && !flags.is_teardown() {
            self.start_cooldown_now(owner, ability, def, flags.is_interrupted());
        }

        if !flags.is_teardown()
            && let Some(settings) = settings.as_ref()
        {
            if !flags.is_interrupted() {
                self.run_events(def, EventType::OnEndPower, owner, settings, env);
            }
            self.run_events(def, EventType::OnPowerStopped, owner, settings, env);

            // Recurring abilities immediately queue their next round.
            if def.recurring && !flags.is_interrupted() && !def.toggled {
                let mut next = settings.clone();
                next.flags |= ActivationFlags::AUTO;
                next.power_seed = derive_trigger_seed(settings.power_seed, ability, 0);
                next.fx_seed = derive_trigger_seed(settings.fx_seed, ability, 1);
                if let Some(instance) = self.instances.get(&(owner, ability)) {
                    self.scheduler.schedule(
                        Millis::ZERO,
                        instance.group,
                        PowerTask::TriggeredActivation { owner, ability, settings: next },
                    );
                }
            }
        }

        self.notices.push(EngineNotice::Ended { owner, ability, flags, at: now });
    }

    fn start_cooldown_now(
        &mut self,
        owner: EntityId,
        ability: AbilityId,
        def: &AbilityDefinition,
        interrupted: bool,
    ) {
        let Some(instance) = self.instances.get(&(owner, ability)) else {
            return;
        };
        let group = instance.group;
        let Some(actor) = self.world.actor_mut(owner) else {
            return;
        };
        let started = ledger::start_cooldown(
            def,
            &mut actor.attrs,
            &mut self.scheduler,
            group,
            owner,
            interrupted,
        );
        if let Some((duration, handle)) = started {
            self.set_cooldown_task(owner, ability, Some(handle));
            self.notices.push(EngineNotice::CooldownStarted { owner, ability, duration });
        }
    }

    fn set_cooldown_task(&mut self, owner: EntityId, ability: AbilityId, next: Option<TaskHandle>) {
        if let Some(instance) = self.instances.get_mut(&(owner, ability)) {
            replace_slot(&mut self.scheduler, &mut instance.cooldown_task, next);
        }
    }

    // ------------------------------------------------------------------
    // Tick and dispatch
    // ------------------------------------------------------------------

    /// Advance simulation time to `to`, firing every task due on the
    /// way in deterministic order.
    pub fn tick(&mut self, to: GameTime, env: &GameEnv<'_>) {
        while let Some(scheduled) = self.scheduler.pop_due(to) {
            self.world.now = scheduled.due;
            self.dispatch(scheduled, env);
        }
        self.scheduler.advance_to(to);
        self.world.now = to;
    }

    fn dispatch(&mut self, scheduled: ScheduledTask, env: &GameEnv<'_>) {
        let handle = scheduled.handle;
        let outcome = match scheduled.task {
            PowerTask::ChargeComplete { owner, ability } => {
                self.on_charge_complete(owner, ability, handle, env)
            }
            PowerTask::ChannelStart { owner, ability } => {
                self.on_channel_start(owner, ability, handle, env)
            }
            PowerTask::ChannelLoop { owner, ability } => {
                self.on_channel_loop(owner, ability, handle, env)
            }
            PowerTask::EndPower { owner, ability, flags } => {
                if let Some(instance) = self.instances.get_mut(&(owner, ability))
                    && instance.end_task == Some(handle)
                {
                    instance.end_task = None;
                    instance.scheduled_end_at = None;
                }
                let flags =
                    if flags.contains(EndFlags::WAIT_FOR_MIN_TIME) { flags | EndFlags::FORCE } else { flags };
                self.end_power(owner, ability, flags, env);
                Ok(())
            }
            PowerTask::RecurringCost { owner, ability } => {
                self.on_recurring_cost(owner, ability, handle, env)
            }
            PowerTask::CooldownEnd { owner, ability } => {
                self.on_cooldown_end(owner, ability, handle, env)
            }
            PowerTask::ExtraActivateTimeout { owner, ability } => {
                self.on_extra_timeout(owner, ability, handle, env)
            }
            PowerTask::DeliverPayload { payload } => self.deliver_payload(payload, env),
            PowerTask::TriggeredActivation { owner, ability, settings } => {
                self.activate(owner, ability, settings, env);
                Ok(())
            }
        };
        if let Err(error) = outcome {
            self.notices.push(EngineNotice::Fault { error });
        }
    }

    fn on_charge_complete(
        &mut self,
        owner: EntityId,
        ability: AbilityId,
        handle: TaskHandle,
        env: &GameEnv<'_>,
    ) -> Result<(), PowerError> {
        let def = lookup_def(env, ability)?;
        let instance = self
            .instances
            .get_mut(&(owner, ability))
            .ok_or(PowerError::NotAssigned { owner, ability })?;
        if instance.phase != PowerPhase::Charging {
            return Err(PowerError::PhaseDesync { ability, phase: instance.phase.name().into() });
        }
        if instance.charge_task == Some(handle) {
            instance.charge_task = None;
        }
        self.begin_active_phase(owner, ability, def, env)?;
        if let Some(settings) = self.instances.get(&(owner, ability)).and_then(|i| i.settings.clone())
        {
            self.run_events(def, EventType::OnChargeComplete, owner, &settings, env);
        }
        Ok(())
    }

    fn on_channel_start(
        &mut self,
        owner: EntityId,
        ability: AbilityId,
        handle: TaskHandle,
        env: &GameEnv<'_>,
    ) -> Result<(), PowerError> {
        let def = lookup_def(env, ability)?;
        let now = self.scheduler.now();
        let instance = self
            .instances
            .get_mut(&(owner, ability))
            .ok_or(PowerError::NotAssigned { owner, ability })?;
        if instance.phase != PowerPhase::ChannelStarting {
            return Err(PowerError::PhaseDesync { ability, phase: instance.phase.name().into() });
        }
        instance.phase = PowerPhase::Channeling;
        instance.channel_started_at = now;
        let group = instance.group;
        if instance.channel_task == Some(handle) {
            instance.channel_task = None;
        }
        let next = self.scheduler.schedule(
            Millis(def.timing.channel_loop_ms.max(1)),
            group,
            PowerTask::ChannelLoop { owner, ability },
        );
        let instance = self.instances.get_mut(&(owner, ability)).expect("instance checked");
        replace_slot(&mut self.scheduler, &mut instance.channel_task, Some(next));
        Ok(())
    }

    fn on_channel_loop(
        &mut self,
        owner: EntityId,
        ability: AbilityId,
        handle: TaskHandle,
        env: &GameEnv<'_>,
    ) -> Result<(), PowerError> {
        let def = lookup_def(env, ability)?;
        {
            let instance = self
                .instances
                .get_mut(&(owner, ability))
                .ok_or(PowerError::NotAssigned { owner, ability })?;
            if !matches!(instance.phase, PowerPhase::Channeling) {
                // A deferred end may be waiting out its minimum time;
                // the loop just stops quietly then.
                return Ok(());
            }
            if instance.channel_task == Some(handle) {
                instance.channel_task = None;
            }
            instance.loops_done += 1;
        }

        // Upkeep per loop; an empty pool ends the channel.
        if !def.costs.endurance_recurring.is_empty() {
            let paid = match self.world.actor_mut(owner) {
                Some(actor) => ledger::pay_recurring(def, &mut actor.attrs),
                None => false,
            };
            if !paid {
                self.end_power(
                    owner,
                    ability,
                    EndFlags::NOT_ENOUGH_ENDURANCE | EndFlags::FORCE,
                    env,
                );
                return Ok(());
            }
        }

        // Channeled abilities re-apply every loop.
        self.apply_power(owner, ability, def, env)?;
        if let Some(settings) = self.instances.get(&(owner, ability)).and_then(|i| i.settings.clone())
        {
            self.run_events(def, EventType::OnChannelLoop, owner, &settings, env);
        }

        let done = {
            let instance = self.instances.get(&(owner, ability));
            let loops = instance.map_or(0, |i| i.loops_done);
            !def.timing.channel_infinite
                && def.timing.channel_loop_count > 0
                && loops >= def.timing.channel_loop_count
        };
        if done {
            self.end_power(owner, ability, EndFlags::CHANNEL_LOOP_END, env);
            return Ok(());
        }

        let Some(instance) = self.instances.get(&(owner, ability)) else {
            return Ok(());
        };
        if instance.phase != PowerPhase::Channeling {
            return Ok(());
        }
        let group = instance.group;
        let next = self.scheduler.schedule(
            Millis(def.timing.channel_loop_ms.max(1)),
            group,
            PowerTask::ChannelLoop { owner, ability },
        );
        let instance = self.instances.get_mut(&(owner, ability)).expect("instance checked");
        replace_slot(&mut self.scheduler, &mut instance.channel_task, Some(next));
        Ok(())
    }

    fn on_recurring_cost(
        &mut self,
        owner: EntityId,
        ability: AbilityId,
        handle: TaskHandle,
        env: &GameEnv<'_>,
    ) -> Result<(), PowerError> {
        let def = lookup_def(env, ability)?;
        {
            let instance = self
                .instances
                .get_mut(&(owner, ability))
                .ok_or(PowerError::NotAssigned { owner, ability })?;
            if !instance.phase.is_active() && !def.toggled {
                return Ok(());
            }
            if instance.recurring_task == Some(handle) {
                instance.recurring_task = None;
            }
        }
        let toggled_on = self
            .world
            .actor(owner)
            .is_some_and(|a| a.attrs.flag_p(Attr::ToggledOn, ability.0));
        if def.toggled && !toggled_on {
            return Ok(());
        }

        let paid = match self.world.actor_mut(owner) {
            Some(actor) => ledger::pay_recurring(def, &mut actor.attrs),
            None => false,
        };
        if !paid {
            self.end_power(owner, ability, EndFlags::NOT_ENOUGH_ENDURANCE | EndFlags::FORCE, env);
            return Ok(());
        }

        let Some(instance) = self.instances.get(&(owner, ability)) else {
            return Ok(());
        };
        let group = instance.group;
        let next = self.scheduler.schedule(
            Millis(def.costs.recurring_interval_ms.max(1)),
            group,
            PowerTask::RecurringCost { owner, ability },
        );
        let instance = self.instances.get_mut(&(owner, ability)).expect("instance checked");
        replace_slot(&mut self.scheduler, &mut instance.recurring_task, Some(next));
        Ok(())
    }

    fn on_cooldown_end(
        &mut self,
        owner: EntityId,
        ability: AbilityId,
        handle: TaskHandle,
        env: &GameEnv<'_>,
    ) -> Result<(), PowerError> {
        let def = lookup_def(env, ability)?;
        let group = match self.instances.get_mut(&(owner, ability)) {
            Some(instance) => {
                if instance.cooldown_task == Some(handle) {
                    instance.cooldown_task = None;
                }
                instance.group
            }
            None => return Ok(()),
        };
        let Some(actor) = self.world.actor_mut(owner) else {
            return Ok(());
        };
        let next =
            ledger::on_cooldown_end(def, &mut actor.attrs, &mut self.scheduler, group, owner);
        if let Some((_, next_handle)) = next {
            self.set_cooldown_task(owner, ability, Some(next_handle));
        } else {
            self.notices.push(EngineNotice::CooldownEnded { owner, ability });
        }
        Ok(())
    }

    fn on_extra_timeout(
        &mut self,
        owner: EntityId,
        ability: AbilityId,
        handle: TaskHandle,
        env: &GameEnv<'_>,
    ) -> Result<(), PowerError> {
        let def = lookup_def(env, ability)?;
        {
            let instance = self
                .instances
                .get_mut(&(owner, ability))
                .ok_or(PowerError::NotAssigned { owner, ability })?;
            if instance.extra_timeout_task == Some(handle) {
                instance.extra_timeout_task = None;
            }
            if instance.activation_count == 0 {
                return Ok(());
            }
            instance.activation_count = 0;
        }
        self.start_cooldown_now(owner, ability, def, false);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    fn run_events(
        &mut self,
        def: &AbilityDefinition,
        event: EventType,
        owner: EntityId,
        settings: &ActivationSettings,
        env: &GameEnv<'_>,
    ) {
        let entries: Vec<EventAction> =
            triggered_entries(def, event, owner, settings.power_seed, env)
                .into_iter()
                .map(|e| e.action.clone())
                .collect();
        for (hop, action) in entries.into_iter().enumerate() {
            self.run_event_action(def, action, owner, settings, hop as u32, env);
        }
    }

    fn run_event_action(
        &mut self,
        def: &AbilityDefinition,
        action: EventAction,
        owner: EntityId,
        settings: &ActivationSettings,
        hop: u32,
        env: &GameEnv<'_>,
    ) {
        match action {
            EventAction::UsePower { ability } | EventAction::ScheduleActivationAtPercent { ability, .. }
                if ability == def.id =>
            {
                // An ability must never raise itself; that way lies
                // unbounded recursion.
                self.notices.push(EngineNotice::Fault {
                    error: PowerError::SelfTrigger { ability },
                });
            }
            EventAction::UsePower { ability } => {
                self.schedule_trigger(def, ability, owner, settings, hop, Millis::ZERO);
            }
            EventAction::ScheduleActivationAtPercent { ability, delay_ms } => {
                self.schedule_trigger(def, ability, owner, settings, hop, Millis(delay_ms));
            }
            EventAction::ModifyCooldownByPct { ability, pct } => {
                let expiry = self.instances.get(&(owner, ability)).and_then(|i| i.cooldown_task);
                let Some(instance) = self.instances.get(&(owner, ability)) else {
                    return;
                };
                let group = instance.group;
                if let Some(actor) = self.world.actor_mut(owner) {
                    let next = ledger::modify_cooldown_by_pct(
                        &mut actor.attrs,
                        ability,
                        pct,
                        &mut self.scheduler,
                        group,
                        owner,
                        expiry,
                    );
                    self.set_cooldown_task(owner, ability, next);
                }
            }
            EventAction::ModifyCooldownMs { ability, delta_ms } => {
                let expiry = self.instances.get(&(owner, ability)).and_then(|i| i.cooldown_task);
                let Some(instance) = self.instances.get(&(owner, ability)) else {
                    return;
                };
                let group = instance.group;
                if let Some(actor) = self.world.actor_mut(owner) {
                    let next = ledger::modify_cooldown_ms(
                        &mut actor.attrs,
                        ability,
                        delta_ms,
                        &mut self.scheduler,
                        group,
                        owner,
                        expiry,
                    );
                    self.set_cooldown_task(owner, ability, next);
                }
            }
            EventAction::RefundEndurancePct { pct } => {
                if let Some(actor) = self.world.actor_mut(owner) {
                    ledger::refund_endurance_pct(def, &mut actor.attrs, pct);
                }
            }
            EventAction::EndPower { ability } => {
                self.end_power(owner, ability, EndFlags::EXPLICIT_CANCEL | EndFlags::FORCE, env);
            }
            EventAction::GrantCharge { ability } => {
                if let Some(actor) = self.world.actor_mut(owner) {
                    let max = actor.attrs.i64_p(Attr::ChargesMax, ability.0);
                    let have = actor.attrs.i64_p(Attr::ChargesAvailable, ability.0);
                    if have < max {
                        actor.attrs.set_i64_p(Attr::ChargesAvailable, ability.0, have + 1);
                    }
                }
            }
            EventAction::GainSecondary { amount } => {
                if let Some(actor) = self.world.actor_mut(owner) {
                    let max = actor.attrs.f32(Attr::SecondaryResourceMax);
                    let mut next = actor.attrs.f32(Attr::SecondaryResource) + amount;
                    if max > 0.0 {
                        next = next.min(max);
                    }
                    actor.attrs.set_f32(Attr::SecondaryResource, next);
                }
            }
        }
    }

    /// Queue a follow-on activation through the scheduler with derived
    /// seeds and inherited aim.
    fn schedule_trigger(
        &mut self,
        parent: &AbilityDefinition,
        child: AbilityId,
        owner: EntityId,
        settings: &ActivationSettings,
        hop: u32,
        delay: Millis,
    ) {
        let Some(instance) = self.instances.get(&(owner, child)) else {
            // Triggering an unassigned ability is authored-content
            // error, not a crash.
            self.notices.push(EngineNotice::Fault {
                error: PowerError::NotAssigned { owner, ability: child },
            });
            return;
        };
        let mut next = settings.clone();
        next.flags |= ActivationFlags::TRIGGERED;
        next.triggered_by = Some(parent.id);
        next.power_seed = derive_trigger_seed(settings.power_seed, child, hop * 2);
        next.fx_seed = derive_trigger_seed(settings.fx_seed, child, hop * 2 + 1);
        self.scheduler.schedule(delay, instance.group, PowerTask::TriggeredActivation {
            owner,
            ability: child,
            settings: next,
        });
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn phase(&self, owner: EntityId, ability: AbilityId) -> PowerPhase {
        self.instances.get(&(owner, ability)).map_or(PowerPhase::Inactive, |i| i.phase)
    }

    pub fn is_assigned(&self, owner: EntityId, ability: AbilityId) -> bool {
        self.instances.contains_key(&(owner, ability))
    }

    pub fn is_toggled_on(&self, owner: EntityId, ability: AbilityId) -> bool {
        self.world.actor(owner).is_some_and(|a| a.attrs.flag_p(Attr::ToggledOn, ability.0))
    }

    pub fn cooldown_remaining(&self, owner: EntityId, ability: AbilityId) -> Millis {
        self.world.actor(owner).map_or(Millis::ZERO, |a| {
            ledger::cooldown_remaining(&a.attrs, ability, self.scheduler.now())
        })
    }

    pub fn charges_available(&self, owner: EntityId, ability: AbilityId) -> i64 {
        self.world
            .actor(owner)
            .map_or(0, |a| a.attrs.i64_p(Attr::ChargesAvailable, ability.0))
    }

    /// Take everything queued for observers since the last drain.
    pub fn drain_notices(&mut self) -> Vec<EngineNotice> {
        core::mem::take(&mut self.notices)
    }
}

fn lookup_def<'a>(env: &GameEnv<'a>, ability: AbilityId) -> Result<&'a AbilityDefinition, PowerError> {
    env.definitions()
        .map_err(|_| PowerError::UnknownAbility(ability))?
        .ability(ability)
        .ok_or(PowerError::UnknownAbility(ability))
}
