//! Async shell around the deterministic ability engine.
//!
//! The engine in `game-core` is synchronous and clock-free; this crate
//! supplies the things around it that a live service needs: a worker
//! task owning the [`game_core::PowerEngine`], a tick driver advancing
//! its clock, oracle implementations backed by `game-content` data, and
//! event fan-out to topic subscribers and relevance-filtered observers.
//!
//! Modules are organized by responsibility:
//! - [`runtime`] hosts the orchestrator and builder
//! - [`api`] exposes the types downstream clients interact with
//! - [`events`] provides the topic bus and per-observer delivery
//! - [`oracle`] implements the engine's oracle traits over live data
//! - [`telemetry`] wires up tracing for embedding binaries

pub mod api;
pub mod events;
pub mod oracle;
pub mod runtime;
pub mod telemetry;

mod workers;

pub use api::{Result, RuntimeError, RuntimeHandle};
pub use events::{
    ActivationEvent, AlwaysRelevant, CombatEvent, CooldownEvent, Event, EventBus, FaultEvent,
    ObserverFanOut, ObserverRelevance, ProximityRelevance, Topic,
};
pub use oracle::{ConditionTracker, OracleManager};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig};
pub use telemetry::init_tracing;
