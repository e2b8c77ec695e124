use sim_timers::{
    Callback, CallbackError, ClockError, ClockHandle, HostTimers, ScriptCompiler, TimeArgs,
    TimeInput, TimerArg,
};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Understands exactly one statement: `count++`.
struct CountingCompiler {
    count: Arc<AtomicUsize>,
}

impl ScriptCompiler for CountingCompiler {
    fn compile(&self, source: &str) -> Result<Callback, CallbackError> {
        if source.trim() != "count++" {
            return Err(format!("unsupported source: {source}").into());
        }
        let count = self.count.clone();
        Ok(Callback::new(move |_| {
            count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
    }
}

fn counting_callback(count: &Arc<AtomicUsize>) -> TimerArg {
    let count = count.clone();
    Callback::<()>::new(move |_| {
        count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .into()
}

fn invalid_argument(result: Result<impl std::fmt::Debug, ClockError>) -> String {
    match result {
        Err(ClockError::InvalidArgument(msg)) => msg,
        other => panic!("expected InvalidArgument, got {other:?}"),
    }
}

#[test]
fn set_timeout_without_parameters_fails() {
    let timers = HostTimers::new(ClockHandle::new());
    assert_eq!(
        invalid_argument(timers.set_timeout(None, None)),
        "Function setTimeout requires at least 1 parameter"
    );
    assert_eq!(
        invalid_argument(timers.set_interval(None, Some(5.0))),
        "Function setInterval requires at least 1 parameter"
    );
}

#[test]
fn lone_numeric_argument_is_a_useless_call() {
    let timers = HostTimers::new(ClockHandle::new());
    assert_eq!(
        invalid_argument(timers.set_timeout(Some(TimerArg::Number(45.0)), None)),
        "useless setTimeout call (missing quotes around argument?)"
    );
    assert_eq!(
        invalid_argument(timers.set_interval(Some("45".into()), None)),
        "useless setInterval call (missing quotes around argument?)"
    );
    assert_eq!(timers.clock().pending_count(), 0);
}

#[test]
fn numeric_callback_with_delay_is_rejected() {
    let timers = HostTimers::new(ClockHandle::new());
    let msg = invalid_argument(timers.set_timeout(Some(TimerArg::Number(3.0)), Some(5.0)));
    assert_eq!(msg, "setTimeout callback must be invocable");
}

#[test]
fn callback_without_delay_runs_once_at_zero() {
    let timers = HostTimers::new(ClockHandle::new());
    let timeouts = Arc::new(AtomicUsize::new(0));
    let intervals = Arc::new(AtomicUsize::new(0));

    timers
        .set_timeout(Some(counting_callback(&timeouts)), None)
        .unwrap();
    timers
        .set_interval(Some(counting_callback(&intervals)), None)
        .unwrap();

    timers.advance(Some(5.0)).unwrap();
    timers.advance(Some(50.0)).unwrap();
    assert_eq!(timeouts.load(Ordering::SeqCst), 1);
    assert_eq!(intervals.load(Ordering::SeqCst), 1);
}

#[test]
fn set_interval_with_period_repeats() {
    let timers = HostTimers::new(ClockHandle::new());
    let count = Arc::new(AtomicUsize::new(0));

    timers
        .set_interval(Some(counting_callback(&count)), Some(5.0))
        .unwrap();
    timers.advance(Some(15.0)).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[test]
fn negative_delays_count_as_zero() {
    let timers = HostTimers::new(ClockHandle::new());
    let count = Arc::new(AtomicUsize::new(0));

    timers
        .set_timeout(Some(counting_callback(&count)), Some(-20.0))
        .unwrap();
    timers.advance(Some(1.0)).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn clear_accepts_missing_and_unknown_ids() {
    let timers = HostTimers::new(ClockHandle::new());
    let count = Arc::new(AtomicUsize::new(0));

    timers.clear_timeout(None);
    timers.clear_interval(None);
    timers.clear_interval(Some(7.into()));

    let timeout = timers
        .set_timeout(Some(counting_callback(&count)), Some(5.0))
        .unwrap();
    let interval = timers
        .set_interval(Some(counting_callback(&count)), Some(5.0))
        .unwrap();
    timers.clear_timeout(Some(timeout));
    timers.clear_interval(Some(interval));

    timers.advance(Some(15.0)).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn advance_validates_ms() {
    let timers = HostTimers::new(ClockHandle::new());
    for bad in [-1.0, f64::NAN, f64::INFINITY] {
        assert_eq!(
            invalid_argument(timers.advance(Some(bad))),
            "'ms' argument must be a positive number"
        );
    }
    assert_eq!(timers.advance(None).unwrap(), 0);
}

#[test]
fn advance_without_ms_reports_accumulation() {
    let timers = HostTimers::new(ClockHandle::new());
    timers.advance(Some(15.0)).unwrap();
    assert_eq!(timers.advance(None).unwrap(), 15);
    assert_eq!(timers.advance(None).unwrap(), 15);
    assert_eq!(timers.advance(Some(2.7)).unwrap(), 17);
}

#[test]
fn source_text_is_compiled_by_the_configured_compiler() {
    let count = Arc::new(AtomicUsize::new(0));
    let timers = HostTimers::new(ClockHandle::new()).with_compiler(CountingCompiler {
        count: count.clone(),
    });

    timers.set_interval(Some("count++".into()), Some(5.0)).unwrap();
    timers.advance(Some(15.0)).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[test]
fn compile_failures_surface_to_the_caller() {
    let timers = HostTimers::new(ClockHandle::new()).with_compiler(CountingCompiler {
        count: Arc::new(AtomicUsize::new(0)),
    });

    let result = timers.set_timeout(Some("launch()".into()), Some(1.0));
    assert!(matches!(result, Err(ClockError::Compile(_))));
}

#[test]
fn source_text_without_compiler_is_rejected() {
    let timers = HostTimers::new(ClockHandle::new());
    let result = timers.set_timeout(Some("count++".into()), Some(1.0));
    assert!(matches!(result, Err(ClockError::InvalidArgument(_))));
}

#[test]
fn reset_clears_scheduled_callbacks() {
    let timers = HostTimers::new(ClockHandle::new());
    let count = Arc::new(AtomicUsize::new(0));

    timers
        .set_timeout(Some(counting_callback(&count)), Some(5.0))
        .unwrap();
    timers
        .set_timeout(Some(counting_callback(&count)), Some(10.0))
        .unwrap();
    timers.reset();
    timers.advance(Some(11.0)).unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn date_with_one_argument_is_not_shifted() {
    let timers = HostTimers::new(ClockHandle::new());
    let before = timers
        .date(TimeArgs::Absolute(TimeInput::EpochMillis(699_769_876_987)))
        .unwrap();
    timers.advance(Some(200.0)).unwrap();
    let after = timers
        .date(TimeArgs::Absolute(TimeInput::EpochMillis(699_769_876_987)))
        .unwrap();

    assert_eq!(before, after);
    assert_eq!(before.timestamp_millis(), 699_769_876_987);
}

#[test]
fn zero_ms_advance_flushes_zero_delay_timeouts() {
    let timers = HostTimers::new(ClockHandle::new());
    let count = Arc::new(AtomicUsize::new(0));

    timers
        .set_timeout(Some(counting_callback(&count)), Some(0.0))
        .unwrap();
    assert_eq!(timers.advance(None).unwrap(), 0);
    assert_eq!(count.load(Ordering::SeqCst), 0);

    assert_eq!(timers.advance(Some(0.0)).unwrap(), 0);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
