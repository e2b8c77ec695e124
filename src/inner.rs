use parking_lot::Mutex;

use crate::{config::ClockConfig, registry::Registry, state::ClockState};

/// Mutable clock data, always accessed under one lock.
pub(crate) struct ClockCore<C> {
    pub registry: Registry<C>,
    pub state: ClockState,
}

pub(crate) struct ClockInner<C> {
    pub core: Mutex<ClockCore<C>>,
    pub config: ClockConfig,
    pub context: C,
}

impl<C> ClockInner<C> {
    pub fn new(config: ClockConfig, context: C) -> Self {
        Self {
            core: Mutex::new(ClockCore {
                registry: Registry::new(),
                state: ClockState::default(),
            }),
            config,
            context,
        }
    }
}
