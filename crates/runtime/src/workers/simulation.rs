//! Simulation worker that owns the authoritative [`PowerEngine`].
//!
//! Receives commands from [`crate::RuntimeHandle`], drives the engine,
//! and fans drained notices out through the event bus and per-observer
//! channels.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace, warn};

use game_core::def::AbilityId;
use game_core::power::ActivationSettings;
use game_core::{
    Actor, EndFlags, EntityId, GameTime, Millis, PowerEngine, PowerPhase, PowerUseResult, World,
};

use crate::api::Result;
use crate::events::{ActivationEvent, Event, EventBus, ObserverFanOut};
use crate::oracle::OracleManager;

/// Commands that can be sent to the simulation worker.
pub enum Command {
    /// Put an actor into the world registry.
    Spawn {
        actor: Box<Actor>,
        reply: oneshot::Sender<()>,
    },
    /// Grant an ability to an owner.
    Assign {
        owner: EntityId,
        ability: AbilityId,
        reply: oneshot::Sender<Result<()>>,
    },
    /// Take an ability away, ending any running activation.
    Unassign {
        owner: EntityId,
        ability: AbilityId,
        reply: oneshot::Sender<()>,
    },
    /// Request an activation.
    Activate {
        owner: EntityId,
        ability: AbilityId,
        settings: ActivationSettings,
        reply: oneshot::Sender<PowerUseResult>,
    },
    /// End a running activation.
    EndPower {
        owner: EntityId,
        ability: AbilityId,
        flags: EndFlags,
        reply: oneshot::Sender<bool>,
    },
    /// Advance simulation time, firing every due task on the way.
    AdvanceTo {
        to: GameTime,
        reply: oneshot::Sender<GameTime>,
    },
    /// Owner leaves the world: suspend cooldowns, pause conditions.
    ExitWorld {
        owner: EntityId,
        reply: oneshot::Sender<()>,
    },
    /// Owner returns after `offline` away: resume conditions, credit
    /// elapsed cooldown cycles.
    EnterWorld {
        owner: EntityId,
        offline: Millis,
        reply: oneshot::Sender<()>,
    },
    /// Open a relevance-filtered observer channel for an entity.
    RegisterObserver {
        observer: EntityId,
        reply: oneshot::Sender<mpsc::UnboundedReceiver<Event>>,
    },
    QueryPhase {
        owner: EntityId,
        ability: AbilityId,
        reply: oneshot::Sender<PowerPhase>,
    },
    QueryCooldown {
        owner: EntityId,
        ability: AbilityId,
        reply: oneshot::Sender<Millis>,
    },
    /// Read-only snapshot of the world registry.
    QueryWorld {
        reply: oneshot::Sender<World>,
    },
}

/// Background task that processes engine commands.
pub struct SimulationWorker {
    engine: PowerEngine,
    oracles: OracleManager,
    command_rx: mpsc::Receiver<Command>,
    bus: EventBus,
    fan: ObserverFanOut,
}

impl SimulationWorker {
    pub fn new(
        engine: PowerEngine,
        oracles: OracleManager,
        command_rx: mpsc::Receiver<Command>,
        bus: EventBus,
        fan: ObserverFanOut,
    ) -> Self {
        Self { engine, oracles, command_rx, bus, fan }
    }

    /// Main worker loop; runs until every handle is dropped.
    pub async fn run(mut self) {
        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd);
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Spawn { actor, reply } => {
                self.engine.world.insert(*actor);
                let _ = reply.send(());
            }
            Command::Assign { owner, ability, reply } => {
                let env = self.oracles.as_game_env();
                let result = self
                    .engine
                    .assign(owner, ability, &env)
                    .map_err(Into::into);
                let _ = reply.send(result);
            }
            Command::Unassign { owner, ability, reply } => {
                let env = self.oracles.as_game_env();
                self.engine.unassign(owner, ability, &env);
                let _ = reply.send(());
            }
            Command::Activate { owner, ability, settings, reply } => {
                let env = self.oracles.as_game_env();
                let result = self.engine.activate(owner, ability, settings, &env);
                let _ = reply.send(result);
            }
            Command::EndPower { owner, ability, flags, reply } => {
                let env = self.oracles.as_game_env();
                let ended = self.engine.end_power(owner, ability, flags, &env);
                let _ = reply.send(ended);
            }
            Command::AdvanceTo { to, reply } => {
                let span = tracing::debug_span!("tick", to = to.0);
                let _enter = span.enter();
                let env = self.oracles.as_game_env();
                self.engine.tick(to, &env);
                self.oracles.conditions().expire(to);
                let _ = reply.send(to);
            }
            Command::ExitWorld { owner, reply } => {
                let env = self.oracles.as_game_env();
                self.engine.exit_world(owner, &env);
                self.oracles
                    .conditions()
                    .pause_all(owner, self.engine.world.now);
                let _ = reply.send(());
            }
            Command::EnterWorld { owner, offline, reply } => {
                let env = self.oracles.as_game_env();
                self.oracles
                    .conditions()
                    .resume_all(owner, self.engine.world.now);
                self.engine.reconcile(owner, offline, &env);
                let _ = reply.send(());
            }
            Command::RegisterObserver { observer, reply } => {
                let _ = reply.send(self.fan.register(observer));
            }
            Command::QueryPhase { owner, ability, reply } => {
                let _ = reply.send(self.engine.phase(owner, ability));
            }
            Command::QueryCooldown { owner, ability, reply } => {
                let _ = reply.send(self.engine.cooldown_remaining(owner, ability));
            }
            Command::QueryWorld { reply } => {
                let _ = reply.send(self.engine.world.clone());
            }
        }

        self.flush_notices();
    }

    /// Convert drained notices into events, log them, and deliver both
    /// topic-wide and per-observer.
    fn flush_notices(&mut self) {
        let notices = self.engine.drain_notices();
        if notices.is_empty() {
            return;
        }

        let events: Vec<Event> = notices.into_iter().map(Event::from).collect();
        for event in &events {
            match event {
                Event::Activation(ActivationEvent::Started { owner, ability, at, .. }) => {
                    debug!(target: "runtime::worker", ?owner, ?ability, at = at.0, "ability activated");
                }
                Event::Activation(ActivationEvent::Rejected { owner, ability, result }) => {
                    debug!(target: "runtime::worker", ?owner, ?ability, %result, "activation rejected");
                }
                Event::Activation(ActivationEvent::Ended { owner, ability, flags, at }) => {
                    debug!(target: "runtime::worker", ?owner, ?ability, ?flags, at = at.0, "ability ended");
                }
                Event::Combat(_) | Event::Cooldown(_) | Event::Activation(_) => {
                    trace!(target: "runtime::worker", ?event, "engine event");
                }
                Event::Fault(fault) => {
                    warn!(target: "runtime::worker", error = %fault.error, "engine fault");
                }
            }
            self.bus.publish(event.clone());
        }
        self.fan.fan_out(&self.engine.world, &events);
    }
}
