//! # Game Core
//!
//! Deterministic ability activation and resolution engine.
//!
//! This crate owns everything between "a client asked to fire ability X"
//! and "these attribute deltas landed on these targets": the per-ability
//! phase state machine, seeded targeting resolution, payload/damage
//! computation, and the cost/cooldown/charge ledger.
//!
//! ## Architecture
//!
//! - [`state`] - entities, the world registry, and game time
//! - [`attributes`] - the typed per-entity attribute store
//! - [`def`] - immutable ability definitions (loaded by `game-content`)
//! - [`env`] - oracle traits the engine reads the outside world through
//! - [`scheduler`] - the deferred task heap driving every timed transition
//! - [`power`] - the ability instance state machine and the engine facade
//! - [`ledger`] - activation gating, costs, cooldowns, and charges
//! - [`targeting`] - AOE shape predicates and deterministic target resolution
//! - [`payload`] - damage/heal computation and per-target result delivery
//!
//! ## Determinism
//!
//! The engine performs no I/O and consults no wall clock. Every random
//! draw is derived from the two 32-bit seeds carried by an activation
//! request via [`env::compute_seed`] and the stateless [`env::PcgRng`],
//! so replaying the same inputs reproduces the same outputs bit-for-bit.
//!
//! ## `no_std` Support
//!
//! Like the rest of the simulation core this crate is `no_std` + `alloc`
//! compatible; the `std` feature (on by default) only widens error types.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod attributes;
pub mod def;
pub mod env;
pub mod error;
pub mod ledger;
pub mod math;
pub mod payload;
pub mod power;
pub mod scheduler;
pub mod state;
pub mod targeting;

pub use env::{Env, GameEnv, PcgRng};
pub use error::{CoreError, ErrorSeverity, PowerError};
pub use power::{
    ActivationSettings, EndFlags, EngineNotice, PowerEngine, PowerPhase, PowerUseResult,
};
pub use state::{Actor, AllianceId, EntityId, GameTime, Millis, World};
