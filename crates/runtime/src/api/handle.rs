//! Cloneable façade for issuing commands to the runtime.
//!
//! [`RuntimeHandle`] hides channel plumbing and offers async helpers
//! for granting abilities, requesting activations, advancing time, and
//! streaming events.

use tokio::sync::{broadcast, mpsc, oneshot};

use game_core::def::AbilityId;
use game_core::{
    ActivationSettings, Actor, EndFlags, EntityId, GameTime, Millis, PowerPhase, PowerUseResult,
    World,
};

use super::errors::{Result, RuntimeError};
use crate::events::{Event, EventBus, Topic};
use crate::workers::Command;

/// Client-facing handle to interact with the runtime.
#[derive(Clone)]
pub struct RuntimeHandle {
    command_tx: mpsc::Sender<Command>,
    event_bus: EventBus,
}

impl RuntimeHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<Command>, event_bus: EventBus) -> Self {
        Self { command_tx, event_bus }
    }

    async fn send<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(make(reply_tx))
            .await
            .map_err(|_| RuntimeError::CommandChannelClosed)?;
        reply_rx.await.map_err(RuntimeError::ReplyChannelClosed)
    }

    /// Put an actor into the world.
    pub async fn spawn(&self, actor: Actor) -> Result<()> {
        self.send(|reply| Command::Spawn { actor: Box::new(actor), reply }).await
    }

    /// Grant an ability to an owner.
    pub async fn assign(&self, owner: EntityId, ability: AbilityId) -> Result<()> {
        self.send(|reply| Command::Assign { owner, ability, reply }).await?
    }

    /// Take an ability away, ending any running activation.
    pub async fn unassign(&self, owner: EntityId, ability: AbilityId) -> Result<()> {
        self.send(|reply| Command::Unassign { owner, ability, reply }).await
    }

    /// Request an activation. The result code says whether it started;
    /// everything that happens afterwards arrives as events.
    pub async fn activate(
        &self,
        owner: EntityId,
        ability: AbilityId,
        settings: ActivationSettings,
    ) -> Result<PowerUseResult> {
        self.send(|reply| Command::Activate { owner, ability, settings, reply }).await
    }

    /// End a running activation. Returns whether an end was accepted.
    pub async fn end_power(
        &self,
        owner: EntityId,
        ability: AbilityId,
        flags: EndFlags,
    ) -> Result<bool> {
        self.send(|reply| Command::EndPower { owner, ability, flags, reply }).await
    }

    /// Advance simulation time to `to`, firing due tasks on the way.
    pub async fn advance_to(&self, to: GameTime) -> Result<GameTime> {
        self.send(|reply| Command::AdvanceTo { to, reply }).await
    }

    /// Owner leaves the world: cooldowns freeze, conditions pause.
    pub async fn exit_world(&self, owner: EntityId) -> Result<()> {
        self.send(|reply| Command::ExitWorld { owner, reply }).await
    }

    /// Owner returns after `offline` time away.
    pub async fn enter_world(&self, owner: EntityId, offline: Millis) -> Result<()> {
        self.send(|reply| Command::EnterWorld { owner, offline, reply }).await
    }

    /// Open a relevance-filtered event stream for one in-world entity.
    pub async fn observe(
        &self,
        observer: EntityId,
    ) -> Result<mpsc::UnboundedReceiver<Event>> {
        self.send(|reply| Command::RegisterObserver { observer, reply }).await
    }

    pub async fn phase(&self, owner: EntityId, ability: AbilityId) -> Result<PowerPhase> {
        self.send(|reply| Command::QueryPhase { owner, ability, reply }).await
    }

    pub async fn cooldown_remaining(
        &self,
        owner: EntityId,
        ability: AbilityId,
    ) -> Result<Millis> {
        self.send(|reply| Command::QueryCooldown { owner, ability, reply }).await
    }

    /// Read-only snapshot of the world registry.
    pub async fn world(&self) -> Result<World> {
        self.send(|reply| Command::QueryWorld { reply }).await
    }

    /// Subscribe to all events on one topic.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<Event> {
        self.event_bus.subscribe(topic)
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }
}
