//! Engine error type.

use std::io;

use thiserror::Error;

use tabfx_config::{ConfigError, ParamError, ParamId};
use tabfx_core::graph::GraphError;

use crate::session::SessionId;

/// Errors returned by the control API.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No session with this id was ever created.
    #[error("{0} not found")]
    SessionNotFound(SessionId),

    /// The session existed but has been closed.
    #[error("{0} is closed")]
    SessionClosed(SessionId),

    /// A parameter value was refused.
    #[error("invalid value for '{param}': {reason}")]
    InvalidParameter {
        /// Parameter being set.
        param: ParamId,
        /// Why it was refused.
        reason: ParamError,
    },

    /// Every session slot is in use.
    #[error("session limit of {limit} reached")]
    ResourceExhausted {
        /// Configured `max_sessions`.
        limit: usize,
    },

    /// A topology patch or compile failed.
    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    /// Invalid engine configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The render worker thread could not be started.
    #[error("failed to spawn render worker: {0}")]
    Spawn(#[source] io::Error),
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
