//! Error taxonomy for the engine's cross-component boundaries.
//!
//! Most intra-engine calls (registry, physics, command ingress) return a
//! typed status or `Option` rather than propagating an error — see §7 of
//! the design spec. `EngineError` exists for the handful of places where
//! `?`-propagation across a function boundary is the right idiom: bootstrap
//! ingest and the logger's relational transactions.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("allocation failed")]
    Allocation,

    #[error("relational sink busy, retrying")]
    BusyRetryable,

    #[error("relational sink error: {0}")]
    BusyFatal(String),

    #[error("environment data unavailable: {0}")]
    EnvUnavailable(String),

    #[error("clock read failed: {0}")]
    Clock(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
