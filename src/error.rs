//! Types for working with errors produced by sim-timers.

use thiserror::Error;

use crate::registry::TimerId;

/// Failure returned by a scheduled callback or a [`ScriptCompiler`](crate::ScriptCompiler).
pub type CallbackError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error type for all clock operations.
#[derive(Error, Debug)]
pub enum ClockError {
    /// Malformed or missing input to a scheduling, advancing or time-construction call.
    #[error("ClockError - InvalidArgument: {0}")]
    InvalidArgument(String),
    /// `advance` with a positive delta was called from inside an executing callback.
    #[error("ClockError - NestedAdvance: cannot advance from within a callback running at {at_ms}ms")]
    NestedAdvance { at_ms: u64 },
    /// A callback failed. The remainder of the batch was abandoned.
    #[error("ClockError - Callback: timer {id} failed at {at_ms}ms: {source}")]
    Callback {
        id: TimerId,
        at_ms: u64,
        #[source]
        source: CallbackError,
    },
    /// Callbacks kept rescheduling at one instant without time moving forward.
    #[error("ClockError - RunawayAdvance: gave up after {cycles} restarted cycles")]
    RunawayAdvance { cycles: u32 },
    #[error("ClockError - InvalidTime: {0}")]
    InvalidTime(String),
    #[error("ClockError - Compile: {0}")]
    Compile(#[source] CallbackError),
}

impl ClockError {
    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}
