//! # Deferred Task Scheduler
//!
//! Min-heap of timed tasks driving every phase transition, payload
//! delivery, cooldown expiry, and follow-on activation in the engine.
//!
//! Tasks are a closed enum ([`PowerTask`]), not callbacks: the engine
//! dispatches each popped task back into the matching subsystem, which
//! keeps the full set of deferred behaviors visible in one place and the
//! whole structure serializable for inspection.
//!
//! # Ordering
//!
//! Tasks pop in `(due_time, insertion_sequence)` order, so two tasks due
//! on the same millisecond fire in the order they were scheduled. That
//! tiebreak is what keeps replays deterministic.
//!
//! # Cancellation
//!
//! Cancellation is lazy: `cancel` drops the task from the live map and
//! the heap entry is skipped when it surfaces. Every task belongs to a
//! [`TaskGroup`] (one per ability instance) so tearing down an instance
//! cancels its whole pending set at once.

use alloc::collections::{BTreeMap, BinaryHeap};
use core::cmp::Reverse;

use crate::def::AbilityId;
use crate::payload::Payload;
use crate::power::{ActivationSettings, EndFlags};
use crate::state::{EntityId, GameTime, Millis};

// ============================================================================
// Handles
// ============================================================================

/// Identifier of one scheduled task. Zero is never a live handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskHandle(pub u64);

impl TaskHandle {
    pub const INVALID: TaskHandle = TaskHandle(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Cancellation group. Each ability instance owns one group; all of its
/// pending tasks carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TaskGroup(pub u64);

// ============================================================================
// Tasks
// ============================================================================

/// Every deferred behavior the engine can schedule.
#[derive(Debug, Clone, PartialEq)]
pub enum PowerTask {
    /// Charge-up finished; move Charging -> Active and apply.
    ChargeComplete { owner: EntityId, ability: AbilityId },
    /// Channel wind-up finished; move ChannelStarting -> Channeling.
    ChannelStart { owner: EntityId, ability: AbilityId },
    /// One channel loop elapsed: charge recurring costs, re-apply, and
    /// schedule the next iteration.
    ChannelLoop { owner: EntityId, ability: AbilityId },
    /// Scheduled end of the active (or ending) phase.
    EndPower { owner: EntityId, ability: AbilityId, flags: EndFlags },
    /// Recurring cost tick for toggled abilities.
    RecurringCost { owner: EntityId, ability: AbilityId },
    /// Cooldown expired; replenish a charge or clear the gate.
    CooldownEnd { owner: EntityId, ability: AbilityId },
    /// Multi-tap window closed without further activations.
    ExtraActivateTimeout { owner: EntityId, ability: AbilityId },
    /// Deliver a resolved payload to its targets (projectile arrival,
    /// beam slice, bounce hop).
    DeliverPayload { payload: Payload },
    /// Follow-on activation requested by an event table or a recurring
    /// ability. Always deferred, never run inline.
    TriggeredActivation {
        owner: EntityId,
        ability: AbilityId,
        settings: ActivationSettings,
    },
}

/// A task popped from the heap, with its identity and due time.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTask {
    pub handle: TaskHandle,
    pub group: TaskGroup,
    pub due: GameTime,
    pub task: PowerTask,
}

#[derive(Debug, Clone)]
struct TaskEntry {
    due: GameTime,
    seq: u64,
    group: TaskGroup,
    task: PowerTask,
}

// ============================================================================
// Scheduler
// ============================================================================

/// Deterministic deferred task queue.
#[derive(Debug, Default)]
pub struct DeferredScheduler {
    /// Live tasks. The heap may hold stale handles; this map is the
    /// source of truth.
    tasks: BTreeMap<TaskHandle, TaskEntry>,
    heap: BinaryHeap<Reverse<(GameTime, u64, TaskHandle)>>,
    now: GameTime,
    next_handle: u64,
    next_seq: u64,
    next_group: u64,
}

impl DeferredScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> GameTime {
        self.now
    }

    /// Allocate a fresh cancellation group.
    pub fn new_group(&mut self) -> TaskGroup {
        self.next_group += 1;
        TaskGroup(self.next_group)
    }

    /// Schedule `task` to fire `delay` from now.
    pub fn schedule(&mut self, delay: Millis, group: TaskGroup, task: PowerTask) -> TaskHandle {
        self.next_handle += 1;
        self.next_seq += 1;
        let handle = TaskHandle(self.next_handle);
        let due = self.now + delay;
        self.tasks.insert(handle, TaskEntry { due, seq: self.next_seq, group, task });
        self.heap.push(Reverse((due, self.next_seq, handle)));
        handle
    }

    /// Cancel a pending task. Returns false if it already fired or was
    /// cancelled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        self.tasks.remove(&handle).is_some()
    }

    /// Cancel everything in a group. Returns how many tasks were
    /// dropped.
    pub fn cancel_group(&mut self, group: TaskGroup) -> usize {
        let doomed: alloc::vec::Vec<TaskHandle> = self
            .tasks
            .iter()
            .filter(|(_, e)| e.group == group)
            .map(|(h, _)| *h)
            .collect();
        for handle in &doomed {
            self.tasks.remove(handle);
        }
        doomed.len()
    }

    /// Move a pending task to a new due time, keeping its handle.
    pub fn reschedule(&mut self, handle: TaskHandle, delay: Millis) -> bool {
        let Some(entry) = self.tasks.get_mut(&handle) else {
            return false;
        };
        self.next_seq += 1;
        entry.due = self.now + delay;
        entry.seq = self.next_seq;
        let (due, seq) = (entry.due, entry.seq);
        self.heap.push(Reverse((due, seq, handle)));
        true
    }

    /// Remaining delay of a pending task.
    pub fn time_until(&self, handle: TaskHandle) -> Option<Millis> {
        self.tasks.get(&handle).map(|e| e.due.elapsed_since(self.now))
    }

    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.tasks.contains_key(&handle)
    }

    pub fn pending_count(&self) -> usize {
        self.tasks.len()
    }

    /// Pop the next task due at or before `until`, advancing the clock
    /// to its due time. Returns `None` when nothing else is due; callers
    /// then advance the clock to `until` themselves via [`advance_to`].
    ///
    /// [`advance_to`]: DeferredScheduler::advance_to
    pub fn pop_due(&mut self, until: GameTime) -> Option<ScheduledTask> {
        while let Some(Reverse((due, seq, handle))) = self.heap.peek().copied() {
            if due > until {
                return None;
            }
            self.heap.pop();
            // Stale heap entries: cancelled tasks, or superseded
            // positions of a rescheduled task.
            let live = match self.tasks.get(&handle) {
                Some(entry) => entry.due == due && entry.seq == seq,
                None => false,
            };
            if !live {
                continue;
            }
            let entry = self.tasks.remove(&handle).unwrap();
            self.now = self.now.max(due);
            return Some(ScheduledTask { handle, group: entry.group, due, task: entry.task });
        }
        None
    }

    /// Advance the clock with no task dispatch. `now` never moves
    /// backwards.
    pub fn advance_to(&mut self, now: GameTime) {
        self.now = self.now.max(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn end_task(n: u64) -> PowerTask {
        PowerTask::CooldownEnd { owner: EntityId(n), ability: AbilityId(1) }
    }

    #[test]
    fn pops_in_due_then_insertion_order() {
        let mut sched = DeferredScheduler::new();
        let group = sched.new_group();
        sched.schedule(Millis(50), group, end_task(1));
        sched.schedule(Millis(10), group, end_task(2));
        sched.schedule(Millis(10), group, end_task(3));

        let order: alloc::vec::Vec<u64> = core::iter::from_fn(|| sched.pop_due(GameTime(100)))
            .map(|t| match t.task {
                PowerTask::CooldownEnd { owner, .. } => owner.0,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(order, alloc::vec![2, 3, 1]);
        assert_eq!(sched.now(), GameTime(50));
    }

    #[test]
    fn cancelled_tasks_never_fire() {
        let mut sched = DeferredScheduler::new();
        let group = sched.new_group();
        let a = sched.schedule(Millis(10), group, end_task(1));
        sched.schedule(Millis(20), group, end_task(2));

        assert!(sched.cancel(a));
        assert!(!sched.cancel(a), "double cancel reports false");

        let fired = sched.pop_due(GameTime(100)).unwrap();
        assert_eq!(fired.due, GameTime(20));
        assert!(sched.pop_due(GameTime(100)).is_none());
    }

    #[test]
    fn group_cancellation_sweeps_pending_tasks() {
        let mut sched = DeferredScheduler::new();
        let doomed = sched.new_group();
        let kept = sched.new_group();
        sched.schedule(Millis(10), doomed, end_task(1));
        sched.schedule(Millis(20), doomed, end_task(2));
        sched.schedule(Millis(30), kept, end_task(3));

        assert_eq!(sched.cancel_group(doomed), 2);
        assert_eq!(sched.pending_count(), 1);
        assert_eq!(sched.pop_due(GameTime(100)).unwrap().due, GameTime(30));
    }

    #[test]
    fn reschedule_keeps_handle_and_moves_due_time() {
        let mut sched = DeferredScheduler::new();
        let group = sched.new_group();
        let handle = sched.schedule(Millis(10), group, end_task(1));
        assert!(sched.reschedule(handle, Millis(40)));
        assert_eq!(sched.time_until(handle), Some(Millis(40)));

        let fired = sched.pop_due(GameTime(100)).unwrap();
        assert_eq!(fired.handle, handle);
        assert_eq!(fired.due, GameTime(40));
        // The stale heap entry at t=10 must not produce a second fire.
        assert!(sched.pop_due(GameTime(100)).is_none());
    }

    #[test]
    fn pop_due_respects_the_horizon() {
        let mut sched = DeferredScheduler::new();
        let group = sched.new_group();
        sched.schedule(Millis(500), group, end_task(1));
        assert!(sched.pop_due(GameTime(499)).is_none());
        sched.advance_to(GameTime(499));
        assert!(sched.pop_due(GameTime(500)).is_some());
    }
}
