//! Unified error types surfaced by the runtime API.

use thiserror::Error;
use tokio::sync::oneshot;

use game_core::PowerError;

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("simulation worker command channel closed")]
    CommandChannelClosed,

    #[error("simulation worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("simulation worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error(transparent)]
    Power(#[from] PowerError),

    #[error("failed to load content")]
    Content(#[source] anyhow::Error),

    #[error("runtime requires an ability catalog before building")]
    MissingCatalog,
}
