//! Live condition (buff/debuff) tracker.
//!
//! Implements [`ConditionOracle`] over an interior-mutability table so
//! the engine can attach and strip conditions through a shared
//! reference. Keyword meaning is data: each [`ConditionDefId`] is
//! registered with the keywords it carries, and the well-known stealth
//! and silence keywords get their hardwired engine behavior from there.

use std::collections::BTreeMap;
use std::sync::Mutex;

use game_core::def::{AbilityId, ConditionDefId, ConditionSpec, KeywordId, well_known};
use game_core::env::{ConditionHandle, ConditionOracle};
use game_core::{EntityId, GameTime, Millis};

/// One attached condition instance.
#[derive(Debug, Clone)]
struct LiveCondition {
    target: EntityId,
    condition: ConditionDefId,
    #[allow(dead_code)]
    source: AbilityId,
    /// Absolute expiry; `None` lasts until removed.
    expires_at: Option<GameTime>,
    /// Set while the owner is out of the world; expiry is frozen.
    paused_at: Option<GameTime>,
}

#[derive(Default)]
struct Inner {
    next_handle: u64,
    live: BTreeMap<ConditionHandle, LiveCondition>,
    /// Keywords carried by each condition definition.
    keywords: BTreeMap<ConditionDefId, Vec<KeywordId>>,
}

/// Runtime condition tracker.
pub struct ConditionTracker {
    inner: Mutex<Inner>,
}

impl ConditionTracker {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner::default()) }
    }

    /// Register the keywords a condition definition carries. Conditions
    /// applied before registration carry no keywords.
    pub fn define(&self, condition: ConditionDefId, keywords: Vec<KeywordId>) {
        let mut inner = self.inner.lock().unwrap();
        inner.keywords.insert(condition, keywords);
    }

    /// Number of live (unexpired, unpaused or paused) conditions on a
    /// target.
    pub fn count(&self, target: EntityId) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.live.values().filter(|c| c.target == target).count()
    }

    /// Drop every condition whose expiry has passed. Paused conditions
    /// never expire.
    pub fn expire(&self, now: GameTime) {
        let mut inner = self.inner.lock().unwrap();
        inner.live.retain(|_, c| {
            c.paused_at.is_some() || c.expires_at.is_none_or(|at| at > now)
        });
    }

    /// Freeze expiry for every condition on a target leaving the world.
    pub fn pause_all(&self, target: EntityId, now: GameTime) {
        let mut inner = self.inner.lock().unwrap();
        for condition in inner.live.values_mut() {
            if condition.target == target && condition.paused_at.is_none() {
                condition.paused_at = Some(now);
            }
        }
    }

    /// Resume frozen conditions, shifting expiry by the paused span.
    pub fn resume_all(&self, target: EntityId, now: GameTime) {
        let mut inner = self.inner.lock().unwrap();
        for condition in inner.live.values_mut() {
            if condition.target != target {
                continue;
            }
            if let Some(paused_at) = condition.paused_at.take()
                && let Some(expires_at) = condition.expires_at
            {
                let remaining = expires_at.elapsed_since(paused_at);
                condition.expires_at = Some(now + remaining);
            }
        }
    }

    fn condition_keywords<'a>(inner: &'a Inner, condition: ConditionDefId) -> &'a [KeywordId] {
        inner.keywords.get(&condition).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl Default for ConditionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ConditionOracle for ConditionTracker {
    fn apply(
        &self,
        target: EntityId,
        spec: &ConditionSpec,
        source: AbilityId,
        now: GameTime,
    ) -> Option<ConditionHandle> {
        if !target.is_valid() {
            return None;
        }
        let mut inner = self.inner.lock().unwrap();
        inner.next_handle += 1;
        let handle = ConditionHandle(inner.next_handle);
        let expires_at = (spec.duration_ms > 0).then(|| now + Millis(spec.duration_ms));
        inner.live.insert(
            handle,
            LiveCondition {
                target,
                condition: spec.condition,
                source,
                expires_at,
                paused_at: None,
            },
        );
        Some(handle)
    }

    fn remove(&self, handle: ConditionHandle) -> bool {
        let mut inner = self.inner.lock().unwrap();
        inner.live.remove(&handle).is_some()
    }

    fn remove_by_keyword(&self, target: EntityId, keyword: KeywordId) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let doomed: Vec<ConditionHandle> = inner
            .live
            .iter()
            .filter(|(_, c)| {
                c.target == target
                    && Self::condition_keywords(&inner, c.condition).contains(&keyword)
            })
            .map(|(&h, _)| h)
            .collect();
        for handle in &doomed {
            inner.live.remove(handle);
        }
        doomed.len()
    }

    fn stealth_condition(&self, target: EntityId) -> Option<ConditionHandle> {
        let inner = self.inner.lock().unwrap();
        inner
            .live
            .iter()
            .find(|(_, c)| {
                c.target == target
                    && Self::condition_keywords(&inner, c.condition)
                        .contains(&well_known::STEALTH)
            })
            .map(|(&h, _)| h)
    }

    fn has_keyword(&self, target: EntityId, keyword: KeywordId) -> bool {
        let inner = self.inner.lock().unwrap();
        inner.live.values().any(|c| {
            c.target == target && Self::condition_keywords(&inner, c.condition).contains(&keyword)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(condition: u32, duration_ms: u64) -> ConditionSpec {
        ConditionSpec { condition: ConditionDefId(condition), duration_ms, chance: 1.0 }
    }

    #[test]
    fn stealth_lookup_goes_through_keywords() {
        let tracker = ConditionTracker::new();
        tracker.define(ConditionDefId(7), vec![well_known::STEALTH]);

        let target = EntityId(3);
        assert!(tracker.stealth_condition(target).is_none());

        let handle = tracker
            .apply(target, &spec(7, 0), AbilityId(1), GameTime(0))
            .unwrap();
        assert_eq!(tracker.stealth_condition(target), Some(handle));

        assert!(tracker.remove(handle));
        assert!(tracker.stealth_condition(target).is_none());
    }

    #[test]
    fn remove_by_keyword_only_touches_matching_conditions() {
        let tracker = ConditionTracker::new();
        tracker.define(ConditionDefId(1), vec![well_known::SILENCE]);
        tracker.define(ConditionDefId(2), vec![KeywordId(99)]);

        let target = EntityId(5);
        tracker.apply(target, &spec(1, 0), AbilityId(1), GameTime(0));
        tracker.apply(target, &spec(2, 0), AbilityId(1), GameTime(0));

        assert_eq!(tracker.remove_by_keyword(target, well_known::SILENCE), 1);
        assert!(!tracker.has_keyword(target, well_known::SILENCE));
        assert!(tracker.has_keyword(target, KeywordId(99)));
    }

    #[test]
    fn pause_freezes_expiry_until_resume() {
        let tracker = ConditionTracker::new();
        let target = EntityId(8);
        tracker.apply(target, &spec(4, 1000), AbilityId(1), GameTime(0));

        tracker.pause_all(target, GameTime(400));
        tracker.expire(GameTime(5000));
        assert_eq!(tracker.count(target), 1);

        // 600ms were left when paused; they start counting again now.
        tracker.resume_all(target, GameTime(5000));
        tracker.expire(GameTime(5500));
        assert_eq!(tracker.count(target), 1);
        tracker.expire(GameTime(5601));
        assert_eq!(tracker.count(target), 0);
    }
}
