use crate::{error::CallbackError, handle::ClockHandle, registry::TimerId};

/// What a scheduled callback returns. An `Err` aborts the running `advance`.
pub type CallbackResult = Result<(), CallbackError>;

type BoxedFn<C> = Box<dyn FnMut(&ExecutionScope<'_, C>) -> CallbackResult + Send>;

/// A compiled, invocable timer callback.
pub struct Callback<C = ()> {
    f: BoxedFn<C>,
}

impl<C> Callback<C> {
    pub fn new<F>(f: F) -> Self
    where
        F: FnMut(&ExecutionScope<'_, C>) -> CallbackResult + Send + 'static,
    {
        Self { f: Box::new(f) }
    }

    pub(crate) fn call(&mut self, scope: &ExecutionScope<'_, C>) -> CallbackResult {
        (self.f)(scope)
    }
}

impl<C> std::fmt::Debug for Callback<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callback").finish_non_exhaustive()
    }
}

/// What a callback sees while it runs.
///
/// The scope gives access to the clock that fired it (for nested scheduling,
/// cancellation and time queries) and to the execution context the clock was
/// constructed with.
pub struct ExecutionScope<'a, C = ()> {
    pub(crate) clock: &'a ClockHandle<C>,
    pub(crate) id: TimerId,
    pub(crate) at_ms: u64,
}

impl<'a, C> ExecutionScope<'a, C>
where
    C: Send + Sync + 'static,
{
    /// The clock this callback was scheduled on.
    pub fn clock(&self) -> &'a ClockHandle<C> {
        self.clock
    }

    /// The execution context injected at clock construction.
    pub fn context(&self) -> &'a C {
        self.clock.context()
    }

    /// Id of the timer being executed. Useful for self-cancellation.
    pub fn timer_id(&self) -> TimerId {
        self.id
    }

    /// Simulated instant this firing was due at.
    pub fn due_at_ms(&self) -> u64 {
        self.at_ms
    }
}

/// A callback as handed over by a host calling convention.
///
/// Only `Compiled` reaches the clock. `SourceText` must be resolved by a
/// [`ScriptCompiler`] first, see [`HostTimers`](crate::HostTimers).
pub enum CallbackSource<C = ()> {
    Compiled(Callback<C>),
    SourceText(String),
}

impl<C> std::fmt::Debug for CallbackSource<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallbackSource::Compiled(cb) => f.debug_tuple("Compiled").field(cb).finish(),
            CallbackSource::SourceText(src) => f.debug_tuple("SourceText").field(src).finish(),
        }
    }
}

/// Turns textual code fragments into invocable callbacks.
pub trait ScriptCompiler<C = ()>: Send + Sync {
    fn compile(&self, source: &str) -> Result<Callback<C>, CallbackError>;
}
