/// Reentrancy state of a clock.
///
/// `Advancing` is entered right before a due callback is invoked and left as
/// soon as it returns. Any schedule/cancel call made by the callback moves it
/// to `Interrupted`, which tells the advancer to re-collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Phase {
    #[default]
    Idle,
    Advancing {
        at_ms: u64,
    },
    Interrupted {
        at_ms: u64,
    },
}

#[derive(Debug, Default)]
pub(crate) struct ClockState {
    /// Cumulative simulated time advanced so far.
    pub advanced_ms: u64,
    pub phase: Phase,
    /// Bumped on every reset.
    pub generation: u64,
}

impl ClockState {
    /// The simulated instant that counts as "now".
    ///
    /// Inside a running callback this is the instant the callback was due at,
    /// not the end of the enclosing advance.
    pub fn effective_offset(&self) -> u64 {
        match self.phase {
            Phase::Idle => self.advanced_ms,
            Phase::Advancing { at_ms } | Phase::Interrupted { at_ms } => at_ms,
        }
    }

    pub fn executing_at(&self) -> Option<u64> {
        match self.phase {
            Phase::Idle => None,
            Phase::Advancing { at_ms } | Phase::Interrupted { at_ms } => Some(at_ms),
        }
    }

    pub fn begin_execution(&mut self, at_ms: u64) {
        self.phase = Phase::Advancing { at_ms };
    }

    /// Records a schedule or cancel made from within a running callback.
    pub fn interrupt(&mut self) {
        if let Phase::Advancing { at_ms } = self.phase {
            self.phase = Phase::Interrupted { at_ms };
        }
    }

    /// Returns to `Idle`, reporting whether the callback interrupted the batch.
    pub fn end_execution(&mut self) -> bool {
        let interrupted = matches!(self.phase, Phase::Interrupted { .. });
        self.phase = Phase::Idle;
        interrupted
    }

    pub fn reset(&mut self) {
        self.advanced_ms = 0;
        self.phase = Phase::Idle;
        self.generation += 1;
    }
}
