use std::sync::Arc;

use crate::{
    advance,
    callback::{Callback, CallbackResult, ExecutionScope},
    config::ClockConfig,
    error::ClockError,
    inner::ClockInner,
    registry::{TimerId, TimerKind},
};

/// A handle to a simulated clock and its pending timers.
///
/// This is the main interface of the crate. It's cheap to clone; all clones
/// share the same registry and the same notion of simulated time. Nothing
/// happens on its own: timers only fire from within [`advance`](Self::advance).
///
/// `C` is the execution context handed to every callback through its
/// [`ExecutionScope`]. It defaults to `()`.
///
/// ```rust
/// use sim_timers::ClockHandle;
/// use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
///
/// let clock = ClockHandle::new();
/// let fired = Arc::new(AtomicUsize::new(0));
///
/// let f = fired.clone();
/// clock.schedule_once(move |_| {
///     f.fetch_add(1, Ordering::SeqCst);
///     Ok(())
/// }, 10);
///
/// assert_eq!(clock.advance(9).unwrap(), 9);
/// assert_eq!(fired.load(Ordering::SeqCst), 0);
/// assert_eq!(clock.advance(1).unwrap(), 10);
/// assert_eq!(fired.load(Ordering::SeqCst), 1);
/// ```
pub struct ClockHandle<C = ()> {
    pub(crate) inner: Arc<ClockInner<C>>,
}

impl<C> Clone for ClockHandle<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl ClockHandle<()> {
    /// Create a clock reading host time from the system clock.
    pub fn new() -> Self {
        Self::with_config(ClockConfig::default())
    }

    pub fn with_config(config: ClockConfig) -> Self {
        Self::with_context(config, ())
    }
}

impl Default for ClockHandle<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> ClockHandle<C>
where
    C: Send + Sync + 'static,
{
    /// Create a clock whose callbacks run against `context`.
    pub fn with_context(config: ClockConfig, context: C) -> Self {
        Self {
            inner: Arc::new(ClockInner::new(config, context)),
        }
    }

    pub fn context(&self) -> &C {
        &self.inner.context
    }

    pub fn config(&self) -> &ClockConfig {
        &self.inner.config
    }

    /// Schedule `f` to run once, `delay_ms` after the effective current instant.
    pub fn schedule_once<F>(&self, f: F, delay_ms: u64) -> TimerId
    where
        F: FnMut(&ExecutionScope<'_, C>) -> CallbackResult + Send + 'static,
    {
        self.add(Callback::new(f), delay_ms, TimerKind::Once)
    }

    /// Schedule `f` to run every `period_ms`, the first time one period from
    /// the effective current instant.
    ///
    /// A zero period is rejected: it would fire infinitely often at one instant.
    pub fn schedule_repeating<F>(&self, f: F, period_ms: u64) -> Result<TimerId, ClockError>
    where
        F: FnMut(&ExecutionScope<'_, C>) -> CallbackResult + Send + 'static,
    {
        self.schedule(Callback::new(f), period_ms, TimerKind::Repeating)
    }

    /// Schedule an already constructed [`Callback`].
    pub fn schedule(
        &self,
        callback: Callback<C>,
        interval_ms: u64,
        kind: TimerKind,
    ) -> Result<TimerId, ClockError> {
        if kind == TimerKind::Repeating && interval_ms == 0 {
            return Err(ClockError::invalid_argument(
                "repeating period must be greater than zero",
            ));
        }
        Ok(self.add(callback, interval_ms, kind))
    }

    fn add(&self, callback: Callback<C>, interval_ms: u64, kind: TimerKind) -> TimerId {
        let mut core = self.inner.core.lock();
        core.state.interrupt();
        let added_at = core.state.effective_offset();
        let id = core.registry.add(callback, interval_ms, kind, added_at);
        tracing::trace!(%id, ?kind, interval_ms, added_at, "timer scheduled");
        id
    }

    /// Cancel a pending timer. Unknown or already finished ids are ignored.
    ///
    /// Cancelling only prevents future firings; an instance already collected
    /// for the running batch is skipped once its entry is gone.
    pub fn cancel(&self, id: TimerId) {
        let mut core = self.inner.core.lock();
        core.state.interrupt();
        if core.registry.remove(id) {
            tracing::trace!(%id, "timer cancelled");
        }
    }

    /// Advance simulated time by `delta_ms`, running every callback that
    /// becomes due in chronological order.
    ///
    /// Returns the cumulative simulated offset. A zero delta does not move
    /// time but still runs timers already due at the current instant, such
    /// as zero-delay one-shots. Use [`offset`](Self::offset) for a pure query.
    ///
    /// Fails with [`ClockError::NestedAdvance`] when called with a positive
    /// delta from within a running callback, and with
    /// [`ClockError::Callback`] when a callback returns an error. In both
    /// cases the clock stays usable.
    pub fn advance(&self, delta_ms: u64) -> Result<u64, ClockError> {
        advance::advance(self, delta_ms)
    }

    /// The effective simulated offset in milliseconds.
    ///
    /// Outside callbacks this is the total advanced so far; inside a callback
    /// it is the instant that callback was due at.
    pub fn offset(&self) -> u64 {
        self.inner.core.lock().state.effective_offset()
    }

    /// Discard every pending timer, restart ids and zero simulated time.
    pub fn reset(&self) {
        let mut core = self.inner.core.lock();
        core.registry.reset();
        core.state.reset();
        tracing::debug!("clock reset");
    }

    /// Number of timers still pending.
    pub fn pending_count(&self) -> usize {
        self.inner.core.lock().registry.len()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.inner.core.lock().registry.contains(id)
    }

    /// The earliest instant at which a pending timer would fire.
    pub fn next_due_at(&self) -> Option<u64> {
        let core = self.inner.core.lock();
        let now = core.state.effective_offset();
        core.registry.all().map(|e| e.next_due_after(now)).min()
    }

    /// Snapshot of all pending timers, in id order.
    pub fn pending(&self) -> Vec<PendingTimer> {
        let core = self.inner.core.lock();
        let now = core.state.effective_offset();
        core.registry
            .all()
            .map(|e| PendingTimer {
                id: e.id,
                kind: e.kind,
                interval_ms: e.interval_ms,
                added_at: e.added_at,
                next_due_at: e.next_due_after(now),
            })
            .collect()
    }
}

/// Read-only view of a pending timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTimer {
    pub id: TimerId,
    pub kind: TimerKind,
    pub interval_ms: u64,
    /// Effective instant at which the timer was scheduled.
    pub added_at: u64,
    pub next_due_at: u64,
}

impl<C> std::fmt::Debug for ClockHandle<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("ClockHandle")
            .field("offset", &core.state.effective_offset())
            .field("pending", &core.registry.len())
            .finish()
    }
}
