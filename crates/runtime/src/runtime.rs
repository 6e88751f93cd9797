//! High-level runtime orchestrator.
//!
//! The runtime owns the simulation worker, wires up command/event
//! channels, and exposes a builder-based API for embedding the engine
//! behind an async shell.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use game_content::{AbilityCatalog, ContentFactory, GameTuning};
use game_core::env::GeometryOracle;
use game_core::{Actor, GameTime, Millis, PowerEngine};

use crate::api::{Result, RuntimeError, RuntimeHandle};
use crate::events::{AlwaysRelevant, EventBus, ObserverFanOut, ObserverRelevance};
use crate::oracle::OracleManager;
use crate::workers::{Command, SimulationWorker};

/// Runtime configuration shared across the orchestrator and worker.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Simulation milliseconds advanced per tick.
    pub tick_interval: Millis,
    /// Wall-clock pacing of [`Runtime::run`]; clamped to at least 1ms.
    pub tick_period: Duration,
    pub event_buffer_size: usize,
    pub command_buffer_size: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval: Millis(50),
            tick_period: Duration::from_millis(50),
            event_buffer_size: 100,
            command_buffer_size: 32,
        }
    }
}

/// Main runtime that drives the engine clock.
///
/// The runtime owns the worker; [`RuntimeHandle`] provides a cloneable
/// façade for clients.
pub struct Runtime {
    handle: RuntimeHandle,
    config: RuntimeConfig,
    clock: GameTime,
    worker_handle: JoinHandle<()>,
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Cloneable handle, shareable across clients and async tasks.
    pub fn handle(&self) -> RuntimeHandle {
        self.handle.clone()
    }

    pub fn now(&self) -> GameTime {
        self.clock
    }

    /// Advance the simulation by one tick interval.
    pub async fn step(&mut self) -> Result<GameTime> {
        self.clock += self.config.tick_interval;
        self.handle.advance_to(self.clock).await
    }

    /// Drive ticks continuously at the configured wall-clock pace.
    pub async fn run(&mut self) -> Result<()> {
        let mut interval = tokio::time::interval(self.config.tick_period.max(Duration::from_millis(1)));
        loop {
            interval.tick().await;
            self.step().await?;
        }
    }

    /// Shutdown the runtime gracefully.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.handle);
        self.worker_handle.await.map_err(RuntimeError::WorkerJoin)?;
        Ok(())
    }
}

/// Builder for [`Runtime`] with flexible configuration.
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    catalog: Option<AbilityCatalog>,
    tuning: GameTuning,
    content_dir: Option<PathBuf>,
    geometry: Option<Arc<dyn GeometryOracle>>,
    relevance: Arc<dyn ObserverRelevance>,
    actors: Vec<Actor>,
}

impl RuntimeBuilder {
    fn new() -> Self {
        Self {
            config: RuntimeConfig::default(),
            catalog: None,
            tuning: GameTuning::default(),
            content_dir: None,
            geometry: None,
            relevance: Arc::new(AlwaysRelevant),
            actors: Vec::new(),
        }
    }

    /// Override runtime configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use an already-loaded ability catalog.
    pub fn catalog(mut self, catalog: AbilityCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn tuning(mut self, tuning: GameTuning) -> Self {
        self.tuning = tuning;
        self
    }

    /// Load catalog and tuning from a data directory at build time.
    /// An explicit [`Self::catalog`] takes precedence.
    pub fn content_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.content_dir = Some(dir.into());
        self
    }

    /// Swap in a real collision/line-of-sight implementation.
    pub fn geometry(mut self, geometry: Arc<dyn GeometryOracle>) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Relevance policy for per-observer event channels.
    pub fn relevance(mut self, relevance: Arc<dyn ObserverRelevance>) -> Self {
        self.relevance = relevance;
        self
    }

    /// Actor present in the world from the start.
    pub fn actor(mut self, actor: Actor) -> Self {
        self.actors.push(actor);
        self
    }

    /// Build the runtime and spawn its worker.
    pub fn build(self) -> Result<Runtime> {
        let (catalog, tuning) = match (self.catalog, self.content_dir) {
            (Some(catalog), _) => (catalog, self.tuning),
            (None, Some(dir)) => {
                let factory = ContentFactory::new(dir);
                let catalog = factory.load_abilities().map_err(RuntimeError::Content)?;
                let tuning = factory.load_tuning().map_err(RuntimeError::Content)?;
                (catalog, tuning)
            }
            (None, None) => return Err(RuntimeError::MissingCatalog),
        };

        let mut oracles = OracleManager::new(catalog, tuning);
        if let Some(geometry) = self.geometry {
            oracles = oracles.with_geometry(geometry);
        }

        let mut engine = PowerEngine::new();
        for actor in self.actors {
            engine.world.insert(actor);
        }

        let (command_tx, command_rx) =
            mpsc::channel::<Command>(self.config.command_buffer_size);
        let bus = EventBus::with_capacity(self.config.event_buffer_size);
        let fan = ObserverFanOut::new(self.relevance);

        let handle = RuntimeHandle::new(command_tx, bus.clone());

        let worker = SimulationWorker::new(engine, oracles, command_rx, bus, fan);
        let worker_handle = tokio::spawn(async move {
            worker.run().await;
        });

        Ok(Runtime {
            handle,
            config: self.config,
            clock: GameTime::ZERO,
            worker_handle,
        })
    }
}
