//! Per-observer event delivery with relevance filtering.
//!
//! The bus broadcasts everything to anyone listening on a topic; observer
//! channels instead deliver the subset of events a specific in-world
//! entity should hear about, as judged by an [`ObserverRelevance`]
//! policy. Typical use is one observer channel per connected client.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use game_core::math::Vec3;
use game_core::{Actor, EntityId, World};

use super::types::Event;

/// Decides whether an observer should receive an event anchored at
/// `origin`. Events without an anchor are delivered to everyone.
pub trait ObserverRelevance: Send + Sync {
    fn is_relevant(&self, observer: &Actor, origin: Option<Vec3>) -> bool;
}

/// Every event reaches every observer.
pub struct AlwaysRelevant;

impl ObserverRelevance for AlwaysRelevant {
    fn is_relevant(&self, _observer: &Actor, _origin: Option<Vec3>) -> bool {
        true
    }
}

/// Anchored events only reach observers within `radius` of the anchor.
pub struct ProximityRelevance {
    pub radius: f32,
}

impl ObserverRelevance for ProximityRelevance {
    fn is_relevant(&self, observer: &Actor, origin: Option<Vec3>) -> bool {
        match origin {
            Some(origin) => observer.position.distance2d(origin) <= self.radius,
            None => true,
        }
    }
}

/// Fans events out to registered observer channels.
pub struct ObserverFanOut {
    relevance: Arc<dyn ObserverRelevance>,
    observers: HashMap<EntityId, mpsc::UnboundedSender<Event>>,
}

impl ObserverFanOut {
    pub fn new(relevance: Arc<dyn ObserverRelevance>) -> Self {
        Self { relevance, observers: HashMap::new() }
    }

    /// Open an observer channel for an entity. A previous channel for
    /// the same entity is replaced.
    pub fn register(&mut self, observer: EntityId) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.insert(observer, tx);
        rx
    }

    pub fn unregister(&mut self, observer: EntityId) {
        self.observers.remove(&observer);
    }

    /// Deliver each event to every registered observer it is relevant
    /// for. Channels whose receiver is gone are dropped.
    pub fn fan_out(&mut self, world: &World, events: &[Event]) {
        if self.observers.is_empty() {
            return;
        }

        let mut closed: Vec<EntityId> = Vec::new();
        for event in events {
            let origin = event.origin(world);
            for (&id, tx) in &self.observers {
                let Some(actor) = world.actor(id) else {
                    continue;
                };
                if !self.relevance.is_relevant(actor, origin) {
                    continue;
                }
                if tx.send(event.clone()).is_err() {
                    closed.push(id);
                }
            }
        }
        for id in closed {
            self.observers.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::{ActivationEvent, Event};
    use game_core::def::AbilityId;
    use game_core::{AllianceId, GameTime};

    fn started_at(position: Vec3) -> Event {
        Event::Activation(ActivationEvent::Started {
            owner: EntityId(1),
            ability: AbilityId(10),
            target: EntityId(2),
            target_position: position,
            fx_seed: 0,
            at: GameTime(100),
        })
    }

    #[test]
    fn proximity_filters_far_observers() {
        let mut world = World::new();
        world.insert(Actor::new(EntityId(1), Vec3::ZERO, AllianceId(0)));
        world.insert(Actor::new(
            EntityId(2),
            Vec3 { x: 5000.0, y: 0.0, z: 0.0 },
            AllianceId(0),
        ));

        let mut fan = ObserverFanOut::new(Arc::new(ProximityRelevance { radius: 100.0 }));
        let mut near_rx = fan.register(EntityId(1));
        let mut far_rx = fan.register(EntityId(2));

        fan.fan_out(&world, &[started_at(Vec3 { x: 50.0, y: 0.0, z: 0.0 })]);

        assert!(near_rx.try_recv().is_ok());
        assert!(far_rx.try_recv().is_err());
    }

    #[test]
    fn dropped_receiver_is_pruned() {
        let mut world = World::new();
        world.insert(Actor::new(EntityId(1), Vec3::ZERO, AllianceId(0)));

        let mut fan = ObserverFanOut::new(Arc::new(AlwaysRelevant));
        let rx = fan.register(EntityId(1));
        drop(rx);

        fan.fan_out(&world, &[started_at(Vec3::ZERO)]);
        assert!(fan.observers.is_empty());
    }
}
