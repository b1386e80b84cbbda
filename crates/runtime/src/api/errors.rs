//! Unified error types surfaced by the runtime API.
//!
//! Wraps engine failures and worker coordination failures so clients can
//! bubble them up with consistent context.
use thiserror::Error;
use tokio::sync::oneshot;

use ability_core::{EngineError, ErrorSeverity, Fault};

pub type Result<T> = std::result::Result<T, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("unknown ability `{0}`")]
    UnknownAbility(String),

    #[error("simulation worker command channel closed")]
    CommandChannelClosed,

    #[error("simulation worker reply channel closed")]
    ReplyChannelClosed(#[source] oneshot::error::RecvError),

    #[error("simulation worker join failed")]
    WorkerJoin(#[source] tokio::task::JoinError),

    #[error("runtime requires an ability catalog before building")]
    MissingCatalog,
}

impl Fault for RuntimeError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Engine(err) => err.severity(),
            Self::UnknownAbility(_) | Self::MissingCatalog => ErrorSeverity::Validation,
            Self::CommandChannelClosed | Self::ReplyChannelClosed(_) => ErrorSeverity::Fatal,
            Self::WorkerJoin(_) => ErrorSeverity::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::Engine(err) => err.error_code(),
            Self::UnknownAbility(_) => "unknown_ability",
            Self::CommandChannelClosed => "command_channel_closed",
            Self::ReplyChannelClosed(_) => "reply_channel_closed",
            Self::WorkerJoin(_) => "worker_join",
            Self::MissingCatalog => "missing_catalog",
        }
    }
}
