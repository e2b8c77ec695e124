use std::cmp::Reverse;

use crate::{
    callback::ExecutionScope,
    error::ClockError,
    handle::ClockHandle,
    inner::ClockInner,
    registry::{Registry, SharedCallback, TimerId, TimerKind},
};

/// One firing of a timer collected for the current advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DueInstance {
    at_ms: u64,
    interval_ms: u64,
    id: TimerId,
    kind: TimerKind,
}

impl DueInstance {
    // Due instant ASC, interval length DESC, registration order ASC.
    fn sort_key(&self) -> (u64, Reverse<u64>, TimerId) {
        (self.at_ms, Reverse(self.interval_ms), self.id)
    }
}

/// Queue every firing that falls inside `(start_ms, end_ms]`.
///
/// Repeating entries have their `last_run_at` moved forward as instances are
/// queued, so a later collection within the same advance never queues the
/// same firing twice. One-shots are re-queued on every collection until they
/// run; the presence check at execution time drops the duplicates.
fn collect<C>(
    registry: &mut Registry<C>,
    start_ms: u64,
    end_ms: u64,
    queue: &mut Vec<DueInstance>,
) {
    for entry in registry.all_mut() {
        let (id, interval_ms, kind) = (entry.id, entry.interval_ms, entry.kind);
        let mut push = |at_ms| {
            queue.push(DueInstance {
                at_ms,
                interval_ms,
                id,
                kind,
            })
        };

        if !entry.is_repeating() {
            if entry.first_run_at <= end_ms {
                push(entry.first_run_at);
            }
            continue;
        }

        if entry.last_run_at.is_none()
            && entry.first_run_at > start_ms
            && entry.first_run_at <= end_ms
        {
            entry.last_run_at = Some(entry.first_run_at);
            push(entry.first_run_at);
        }
        let mut base = entry.last_run_at.unwrap_or(entry.first_run_at);
        while let Some(next) = base
            .checked_add(entry.interval_ms)
            .filter(|next| *next <= end_ms)
        {
            entry.last_run_at = Some(next);
            push(next);
            base = next;
        }
    }
}

/// Releases the executing phase however the callback exits.
///
/// When unwinding from a panic the one-shot that was running is dropped as
/// well, so it does not fire again on the next advance.
struct ExecutionGuard<'a, C> {
    inner: &'a ClockInner<C>,
    generation: u64,
    instance: DueInstance,
    armed: bool,
}

impl<'a, C> ExecutionGuard<'a, C> {
    fn enter(inner: &'a ClockInner<C>, generation: u64, instance: DueInstance) -> Self {
        inner.core.lock().state.begin_execution(instance.at_ms);
        Self {
            inner,
            generation,
            instance,
            armed: true,
        }
    }

    /// Returns whether the callback scheduled or cancelled anything.
    fn finish(mut self) -> bool {
        self.armed = false;
        self.inner.core.lock().state.end_execution()
    }
}

impl<C> Drop for ExecutionGuard<'_, C> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut core = self.inner.core.lock();
        core.state.end_execution();
        if core.state.generation == self.generation && self.instance.kind == TimerKind::Once {
            core.registry.remove(self.instance.id);
        }
    }
}

enum Step {
    Continue,
    Restart,
    Stop,
}

#[cfg_attr(
    feature = "instrument",
    tracing::instrument(name = "sim_timers.advance", skip(clock), err)
)]
pub(crate) fn advance<C>(clock: &ClockHandle<C>, delta_ms: u64) -> Result<u64, ClockError>
where
    C: Send + Sync + 'static,
{
    let inner = &*clock.inner;
    let (start_ms, end_ms, generation) = {
        let mut core = inner.core.lock();
        if let Some(at_ms) = core.state.executing_at() {
            if delta_ms == 0 {
                return Ok(at_ms);
            }
            return Err(ClockError::NestedAdvance { at_ms });
        }
        let start_ms = core.state.advanced_ms;
        let end_ms = start_ms.checked_add(delta_ms).ok_or_else(|| {
            ClockError::invalid_argument("advancing would overflow the simulated clock")
        })?;
        core.state.advanced_ms = end_ms;
        (start_ms, end_ms, core.state.generation)
    };
    tracing::debug!(start_ms, end_ms, "advancing simulated clock");

    let mut queue = Vec::new();
    let mut cycles: u32 = 0;
    let mut executed: usize = 0;
    // Restarts since simulated execution time last moved forward.
    let mut stalled: u32 = 0;
    let mut stalled_at: Option<u64> = None;

    'cycles: loop {
        if let Some(max) = inner.config.max_cycles_per_advance {
            if stalled >= max {
                tracing::warn!(
                    cycles = stalled,
                    at_ms = stalled_at,
                    "advance kept restarting at one instant, giving up"
                );
                return Err(ClockError::RunawayAdvance { cycles: stalled });
            }
        }
        cycles = cycles.saturating_add(1);
        stalled += 1;

        let added = {
            let mut core = inner.core.lock();
            if core.state.generation != generation {
                break 'cycles;
            }
            let queued = queue.len();
            collect(&mut core.registry, start_ms, end_ms, &mut queue);
            queue.len() > queued
        };
        if added {
            // Sorted latest first so that `pop` yields the next instance to run.
            queue.sort_unstable_by_key(|instance| Reverse(instance.sort_key()));
        }

        while let Some(instance) = queue.pop() {
            match execute(clock, generation, instance)? {
                Step::Continue => executed += 1,
                Step::Restart => {
                    executed += 1;
                    if stalled_at.is_none_or(|at| instance.at_ms > at) {
                        stalled_at = Some(instance.at_ms);
                        stalled = 0;
                    }
                    tracing::trace!(at_ms = instance.at_ms, "batch interrupted, re-collecting");
                    continue 'cycles;
                }
                Step::Stop => break 'cycles,
            }
        }
        break;
    }

    let offset = inner.core.lock().state.effective_offset();
    tracing::debug!(offset, cycles, executed, "advance complete");
    Ok(offset)
}

fn execute<C>(
    clock: &ClockHandle<C>,
    generation: u64,
    instance: DueInstance,
) -> Result<Step, ClockError>
where
    C: Send + Sync + 'static,
{
    let inner = &*clock.inner;
    let callback: SharedCallback<C> = {
        let core = inner.core.lock();
        if core.state.generation != generation {
            return Ok(Step::Stop);
        }
        match core.registry.get(instance.id) {
            Some(entry) => entry.callback.clone(),
            // Cancelled earlier in this batch, possibly by itself.
            None => return Ok(Step::Continue),
        }
    };

    tracing::trace!(id = %instance.id, at_ms = instance.at_ms, "executing timer");
    let scope = ExecutionScope {
        clock,
        id: instance.id,
        at_ms: instance.at_ms,
    };
    let guard = ExecutionGuard::enter(inner, generation, instance);
    let result = callback.lock().call(&scope);
    let interrupted = guard.finish();

    let was_reset = {
        let mut core = inner.core.lock();
        let was_reset = core.state.generation != generation;
        if !was_reset && instance.kind == TimerKind::Once {
            core.registry.remove(instance.id);
        }
        was_reset
    };

    if let Err(source) = result {
        tracing::warn!(
            id = %instance.id,
            at_ms = instance.at_ms,
            "timer callback failed, abandoning batch"
        );
        return Err(ClockError::Callback {
            id: instance.id,
            at_ms: instance.at_ms,
            source,
        });
    }

    Ok(if was_reset {
        tracing::debug!("clock reset from within a callback, stopping advance");
        Step::Stop
    } else if interrupted {
        Step::Restart
    } else {
        Step::Continue
    })
}
