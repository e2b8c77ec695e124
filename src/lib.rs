//! Deterministic simulated timers for testing time-dependent code.
//!
//! This crate replaces wall-clock timer facilities (delayed callbacks,
//! repeating callbacks, cancellation and "what time is it") with a virtual
//! clock that only moves when told to. Advancing the clock runs every callback
//! that became due, in the order real timers would have produced, including
//! callbacks scheduled, cancelled or querying time from inside other callbacks.
//!
//! # Overview
//!
//! The main type is [`ClockHandle`], a cheap-to-clone handle that provides:
//! - `schedule_once(callback, delay_ms)` / `schedule_repeating(callback, period_ms)`
//! - `cancel(id)`
//! - `advance(delta_ms)` - move simulated time forward and run what became due
//! - `offset()` - the effective simulated offset
//! - `now()` - host time shifted by the simulated offset
//! - `reset()`
//!
//! [`HostTimers`] layers the loosely typed setTimeout-style calling convention
//! (optional arguments, source-text callbacks) on top.
//!
//! # Ordering
//!
//! Firings due within one advance run by due instant; ties go to the longer
//! interval first, then to the earlier registration:
//!
//! ```rust
//! use sim_timers::ClockHandle;
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//!
//! let clock = ClockHandle::new();
//! let order = Arc::new(Mutex::new(Vec::new()));
//!
//! let o = order.clone();
//! clock.schedule_repeating(move |_| { o.lock().push('a'); Ok(()) }, 7).unwrap();
//! let o = order.clone();
//! clock.schedule_once(move |_| { o.lock().push('b'); Ok(()) }, 21);
//! let o = order.clone();
//! clock.schedule_repeating(move |_| { o.lock().push('c'); Ok(()) }, 14).unwrap();
//!
//! clock.advance(21).unwrap();
//! assert_eq!(*order.lock(), vec!['a', 'c', 'a', 'b', 'a']);
//! ```
//!
//! # Nested scheduling
//!
//! A callback sees simulated time as the instant it was due at, so timers it
//! schedules are relative to that instant and not to the end of the advance:
//!
//! ```rust
//! use sim_timers::ClockHandle;
//! use std::sync::Arc;
//! use parking_lot::Mutex;
//!
//! let clock = ClockHandle::new();
//! let seen = Arc::new(Mutex::new(Vec::new()));
//!
//! let s = seen.clone();
//! clock.schedule_once(move |scope| {
//!     let s = s.clone();
//!     scope.clock().schedule_once(move |scope| {
//!         s.lock().push(scope.clock().offset());
//!         Ok(())
//!     }, 3);
//!     Ok(())
//! }, 7);
//!
//! assert_eq!(clock.advance(100).unwrap(), 100);
//! assert_eq!(*seen.lock(), vec![10]);
//! ```

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![cfg_attr(feature = "fail-on-warnings", deny(clippy::all))]
#![forbid(unsafe_code)]

mod advance;
mod binding;
mod callback;
mod config;
pub mod error;
mod handle;
mod inner;
mod registry;
mod state;
mod time;

pub use binding::*;
pub use callback::*;
pub use config::*;
#[doc(inline)]
pub use error::*;
pub use handle::*;
pub use registry::{TimerId, TimerKind};
pub use time::*;
