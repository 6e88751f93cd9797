//! Event bus and observer fan-out.
//!
//! Engine notices drained after each worker command become typed
//! [`Event`]s, published twice: topic-wide on the [`EventBus`] and
//! per-entity through [`ObserverFanOut`] relevance filtering.

mod bus;
mod observers;
mod types;

pub use bus::EventBus;
pub use observers::{AlwaysRelevant, ObserverFanOut, ObserverRelevance, ProximityRelevance};
pub use types::{ActivationEvent, CombatEvent, CooldownEvent, Event, FaultEvent, Topic};
