//! Per-ability runtime state.
//!
//! An [`AbilityInstance`] exists per `(owner, ability)` assignment and
//! carries the phase machine plus the scheduler slots for its pending
//! transitions. All orchestration logic lives in the engine; the
//! instance only owns state and the invariants on it.

use crate::def::AbilityId;
use crate::scheduler::{DeferredScheduler, TaskGroup, TaskHandle};
use crate::state::{EntityId, GameTime};

use super::{ActivationSettings, EndFlags};

/// Phase machine of one ability instance.
///
/// ```text
/// Inactive -> [Charging ->] Active -> Inactive
/// Inactive -> [Charging ->] ChannelStarting -> Channeling
///     -> (MinTimeEnding | LoopEnding) -> Inactive
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PowerPhase {
    Inactive,
    /// Charge-up before application.
    Charging,
    /// The active window of a non-channeled ability.
    Active,
    /// Channel wind-up, no loop ticks yet.
    ChannelStarting,
    /// Channel loop running.
    Channeling,
    /// End requested before the minimum channel time; waiting it out.
    MinTimeEnding,
    /// Channel wind-down after the final loop.
    LoopEnding,
}

impl PowerPhase {
    pub fn is_active(self) -> bool {
        !matches!(self, PowerPhase::Inactive)
    }

    pub fn is_channeling(self) -> bool {
        matches!(
            self,
            PowerPhase::ChannelStarting
                | PowerPhase::Channeling
                | PowerPhase::MinTimeEnding
                | PowerPhase::LoopEnding
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            PowerPhase::Inactive => "inactive",
            PowerPhase::Charging => "charging",
            PowerPhase::Active => "active",
            PowerPhase::ChannelStarting => "channel-starting",
            PowerPhase::Channeling => "channeling",
            PowerPhase::MinTimeEnding => "min-time-ending",
            PowerPhase::LoopEnding => "loop-ending",
        }
    }
}

/// Runtime state of one assigned ability.
#[derive(Debug)]
pub struct AbilityInstance {
    pub owner: EntityId,
    pub ability: AbilityId,
    pub phase: PowerPhase,
    /// Cancellation group for every task this instance schedules.
    pub group: TaskGroup,

    /// Settings of the current (or most recent) activation.
    pub settings: Option<ActivationSettings>,
    /// When the current activation entered its first phase.
    pub activated_at: GameTime,
    /// When the channel loop started ticking.
    pub channel_started_at: GameTime,
    /// Taps consumed in the current extra-activation window.
    pub activation_count: u32,
    /// Channel loop iterations completed this activation.
    pub loops_done: u32,
    /// Most recent successful activation, for the refresh gate.
    pub last_activation_at: Option<GameTime>,

    /// End of the early no-interrupt window.
    pub no_interrupt_until: GameTime,
    /// When the scheduled natural end will fire, if one is scheduled.
    pub scheduled_end_at: Option<GameTime>,
    /// Flags of an end deferred by the minimum channel time.
    pub pending_end_flags: Option<EndFlags>,

    // One scheduler slot per transition kind. Scheduling a transition
    // always goes through `replace_slot`, which cancels the previous
    // task first, so at most one task per slot is ever pending.
    pub charge_task: Option<TaskHandle>,
    pub channel_task: Option<TaskHandle>,
    pub end_task: Option<TaskHandle>,
    pub recurring_task: Option<TaskHandle>,
    pub extra_timeout_task: Option<TaskHandle>,
    pub cooldown_task: Option<TaskHandle>,
}

impl AbilityInstance {
    pub fn new(owner: EntityId, ability: AbilityId, group: TaskGroup) -> Self {
        AbilityInstance {
            owner,
            ability,
            phase: PowerPhase::Inactive,
            group,
            settings: None,
            activated_at: GameTime::ZERO,
            channel_started_at: GameTime::ZERO,
            activation_count: 0,
            loops_done: 0,
            last_activation_at: None,
            no_interrupt_until: GameTime::ZERO,
            scheduled_end_at: None,
            pending_end_flags: None,
            charge_task: None,
            channel_task: None,
            end_task: None,
            recurring_task: None,
            extra_timeout_task: None,
            cooldown_task: None,
        }
    }

    /// Cancel every pending transition of this instance. Cooldown expiry
    /// is deliberately excluded: cooldowns outlive activations.
    pub fn cancel_transitions(&mut self, scheduler: &mut DeferredScheduler) {
        for slot in [
            &mut self.charge_task,
            &mut self.channel_task,
            &mut self.end_task,
            &mut self.recurring_task,
        ] {
            if let Some(handle) = slot.take() {
                scheduler.cancel(handle);
            }
        }
        self.scheduled_end_at = None;
        self.pending_end_flags = None;
    }

    /// Inside the post-activation window where ends are refused.
    pub fn in_no_interrupt_window(&self, now: GameTime, flags: EndFlags) -> bool {
        if flags.contains(EndFlags::FORCE) || flags.is_teardown() {
            return false;
        }
        now < self.no_interrupt_until
    }

    /// Channel time served so far.
    pub fn channel_elapsed(&self, now: GameTime) -> crate::state::Millis {
        now.elapsed_since(self.channel_started_at)
    }
}

/// Swap the task in a slot, cancelling whatever was there. The slot
/// invariant (at most one pending task per transition) lives here.
pub fn replace_slot(
    scheduler: &mut DeferredScheduler,
    slot: &mut Option<TaskHandle>,
    next: Option<TaskHandle>,
) {
    if let Some(old) = slot.take() {
        scheduler.cancel(old);
    }
    *slot = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::PowerTask;
    use crate::state::Millis;

    #[test]
    fn replace_slot_cancels_the_previous_task() {
        let mut sched = DeferredScheduler::new();
        let group = sched.new_group();
        let mut slot = None;

        let first = sched.schedule(Millis(100), group, PowerTask::CooldownEnd {
            owner: EntityId(1),
            ability: AbilityId(1),
        });
        replace_slot(&mut sched, &mut slot, Some(first));

        let second = sched.schedule(Millis(200), group, PowerTask::CooldownEnd {
            owner: EntityId(1),
            ability: AbilityId(1),
        });
        replace_slot(&mut sched, &mut slot, Some(second));

        assert!(!sched.is_pending(first), "old slot task must be cancelled");
        assert!(sched.is_pending(second));
        assert_eq!(slot, Some(second));
    }

    #[test]
    fn cancel_transitions_spares_the_cooldown() {
        let mut sched = DeferredScheduler::new();
        let group = sched.new_group();
        let mut instance = AbilityInstance::new(EntityId(1), AbilityId(1), group);

        let end = sched.schedule(Millis(100), group, PowerTask::EndPower {
            owner: EntityId(1),
            ability: AbilityId(1),
            flags: EndFlags::empty(),
        });
        let cooldown = sched.schedule(Millis(5000), group, PowerTask::CooldownEnd {
            owner: EntityId(1),
            ability: AbilityId(1),
        });
        instance.end_task = Some(end);
        instance.cooldown_task = Some(cooldown);

        instance.cancel_transitions(&mut sched);
        assert!(!sched.is_pending(end));
        assert!(sched.is_pending(cooldown));
        assert_eq!(instance.cooldown_task, Some(cooldown));
    }

    #[test]
    fn no_interrupt_window_yields_to_force_and_teardown() {
        let group = TaskGroup(1);
        let mut instance = AbilityInstance::new(EntityId(1), AbilityId(1), group);
        instance.no_interrupt_until = GameTime(500);

        assert!(instance.in_no_interrupt_window(GameTime(400), EndFlags::EXPLICIT_CANCEL));
        assert!(!instance.in_no_interrupt_window(GameTime(500), EndFlags::EXPLICIT_CANCEL));
        assert!(!instance.in_no_interrupt_window(GameTime(400), EndFlags::FORCE));
        assert!(!instance.in_no_interrupt_window(GameTime(400), EndFlags::EXIT_WORLD));
    }
}
