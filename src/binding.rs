//! The loosely typed, setTimeout-style calling convention.
//!
//! Hosts that expose timers to dynamically typed code receive arguments whose
//! presence and type are only known at runtime. [`HostTimers`] validates those
//! arguments, resolves source-text callbacks through an injected
//! [`ScriptCompiler`] and forwards to the typed [`ClockHandle`].

use chrono::{DateTime, Utc};

use std::sync::Arc;

use crate::{
    callback::{Callback, CallbackSource, ScriptCompiler},
    error::ClockError,
    handle::ClockHandle,
    registry::{TimerId, TimerKind},
    time::TimeArgs,
};

/// A value passed where a timer callback is expected.
#[derive(Debug)]
pub enum TimerArg<C = ()> {
    Callback(CallbackSource<C>),
    Number(f64),
}

impl<C> From<Callback<C>> for TimerArg<C> {
    fn from(callback: Callback<C>) -> Self {
        Self::Callback(CallbackSource::Compiled(callback))
    }
}

impl<C> From<&str> for TimerArg<C> {
    fn from(source: &str) -> Self {
        Self::Callback(CallbackSource::SourceText(source.to_owned()))
    }
}

impl<C> From<String> for TimerArg<C> {
    fn from(source: String) -> Self {
        Self::Callback(CallbackSource::SourceText(source))
    }
}

impl<C> From<f64> for TimerArg<C> {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl<C> TimerArg<C> {
    fn is_numeric(&self) -> bool {
        match self {
            TimerArg::Number(n) => !n.is_nan(),
            TimerArg::Callback(CallbackSource::SourceText(text)) => {
                text.trim().parse::<f64>().is_ok_and(|n| !n.is_nan())
            }
            TimerArg::Callback(CallbackSource::Compiled(_)) => false,
        }
    }
}

/// Timer operations with host argument semantics on top of a [`ClockHandle`].
pub struct HostTimers<C = ()> {
    clock: ClockHandle<C>,
    compiler: Option<Arc<dyn ScriptCompiler<C>>>,
}

impl<C> Clone for HostTimers<C> {
    fn clone(&self) -> Self {
        Self {
            clock: self.clock.clone(),
            compiler: self.compiler.clone(),
        }
    }
}

impl<C> HostTimers<C>
where
    C: Send + Sync + 'static,
{
    pub fn new(clock: ClockHandle<C>) -> Self {
        Self {
            clock,
            compiler: None,
        }
    }

    /// Accept source-text callbacks, compiling them with `compiler`.
    pub fn with_compiler(mut self, compiler: impl ScriptCompiler<C> + 'static) -> Self {
        self.compiler = Some(Arc::new(compiler));
        self
    }

    pub fn clock(&self) -> &ClockHandle<C> {
        &self.clock
    }

    pub fn set_timeout(
        &self,
        callback: Option<TimerArg<C>>,
        delay_ms: Option<f64>,
    ) -> Result<TimerId, ClockError> {
        self.schedule("setTimeout", TimerKind::Once, callback, delay_ms)
    }

    /// Without a period the callback runs once at the current instant, like a
    /// zero-delay timeout.
    pub fn set_interval(
        &self,
        callback: Option<TimerArg<C>>,
        period_ms: Option<f64>,
    ) -> Result<TimerId, ClockError> {
        self.schedule("setInterval", TimerKind::Repeating, callback, period_ms)
    }

    pub fn clear_timeout(&self, id: Option<TimerId>) {
        if let Some(id) = id {
            self.clock.cancel(id);
        }
    }

    pub fn clear_interval(&self, id: Option<TimerId>) {
        self.clear_timeout(id)
    }

    /// Advance by `ms`, or just report the effective offset when `ms` is absent.
    pub fn advance(&self, ms: Option<f64>) -> Result<u64, ClockError> {
        match ms {
            None => Ok(self.clock.offset()),
            Some(ms) if !ms.is_finite() || ms < 0.0 => Err(ClockError::invalid_argument(
                "'ms' argument must be a positive number",
            )),
            Some(ms) => self.clock.advance(ms as u64),
        }
    }

    pub fn reset(&self) {
        self.clock.reset()
    }

    pub fn date(&self, args: TimeArgs) -> Result<DateTime<Utc>, ClockError> {
        self.clock.date(args)
    }

    fn schedule(
        &self,
        op: &str,
        kind: TimerKind,
        callback: Option<TimerArg<C>>,
        ms: Option<f64>,
    ) -> Result<TimerId, ClockError> {
        let Some(arg) = callback else {
            return Err(ClockError::invalid_argument(format!(
                "Function {op} requires at least 1 parameter"
            )));
        };
        if ms.is_none() && arg.is_numeric() {
            return Err(ClockError::invalid_argument(format!(
                "useless {op} call (missing quotes around argument?)"
            )));
        }
        let source = match arg {
            TimerArg::Callback(source) => source,
            TimerArg::Number(_) => {
                return Err(ClockError::invalid_argument(format!(
                    "{op} callback must be invocable"
                )));
            }
        };
        let callback = self.resolve(source)?;
        match ms {
            None => self.clock.schedule(callback, 0, TimerKind::Once),
            Some(ms) => self.clock.schedule(callback, clamp_millis(ms), kind),
        }
    }

    fn resolve(&self, source: CallbackSource<C>) -> Result<Callback<C>, ClockError> {
        match source {
            CallbackSource::Compiled(callback) => Ok(callback),
            CallbackSource::SourceText(text) => {
                let compiler = self.compiler.as_ref().ok_or_else(|| {
                    ClockError::invalid_argument(
                        "source text callbacks need a ScriptCompiler to be configured",
                    )
                })?;
                compiler.compile(&text).map_err(ClockError::Compile)
            }
        }
    }
}

/// Negative and non-finite delays count as zero, fractions are dropped.
fn clamp_millis(ms: f64) -> u64 {
    if ms.is_finite() && ms > 0.0 {
        ms as u64
    } else {
        0
    }
}
