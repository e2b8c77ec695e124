use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use std::{collections::BTreeMap, sync::Arc};

use crate::callback::Callback;

/// Identifier handed out for every scheduled timer.
///
/// Ids are strictly increasing and never reused until the clock is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(u64);

impl TimerId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TimerId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a timer fires once or periodically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    Once,
    Repeating,
}

pub(crate) type SharedCallback<C> = Arc<Mutex<Callback<C>>>;

/// A pending timer.
pub(crate) struct ScheduledEntry<C> {
    pub id: TimerId,
    pub callback: SharedCallback<C>,
    pub interval_ms: u64,
    pub added_at: u64,
    pub first_run_at: u64,
    pub last_run_at: Option<u64>,
    pub kind: TimerKind,
}

impl<C> ScheduledEntry<C> {
    pub fn is_repeating(&self) -> bool {
        self.kind == TimerKind::Repeating
    }

    /// The earliest instant after `after_ms` at which this entry would fire.
    ///
    /// Repeating entries fire on the grid `first_run_at + k * interval_ms`.
    /// The grid is used instead of `last_run_at`, which runs ahead of the
    /// current instant while a batch is executing. A firing due exactly at
    /// `after_ms` counts as done.
    pub fn next_due_after(&self, after_ms: u64) -> u64 {
        if self.kind == TimerKind::Once || self.first_run_at > after_ms {
            return self.first_run_at;
        }
        let steps = (after_ms - self.first_run_at) / self.interval_ms + 1;
        self.first_run_at.saturating_add(steps.saturating_mul(self.interval_ms))
    }
}

/// All pending timers of one clock, ordered by id.
pub(crate) struct Registry<C> {
    entries: BTreeMap<TimerId, ScheduledEntry<C>>,
    next_id: u64,
}

impl<C> Registry<C> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn add(
        &mut self,
        callback: Callback<C>,
        interval_ms: u64,
        kind: TimerKind,
        added_at: u64,
    ) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            ScheduledEntry {
                id,
                callback: Arc::new(Mutex::new(callback)),
                interval_ms,
                added_at,
                first_run_at: added_at.saturating_add(interval_ms),
                last_run_at: None,
                kind,
            },
        );
        id
    }

    pub fn remove(&mut self, id: TimerId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn get(&self, id: TimerId) -> Option<&ScheduledEntry<C>> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: TimerId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn all(&self) -> impl Iterator<Item = &ScheduledEntry<C>> {
        self.entries.values()
    }

    pub fn all_mut(&mut self) -> impl Iterator<Item = &mut ScheduledEntry<C>> {
        self.entries.values_mut()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.next_id = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Callback<()> {
        Callback::new(|_| Ok(()))
    }

    #[test]
    fn ids_are_monotonic_and_not_reused() {
        let mut registry = Registry::new();
        let a = registry.add(noop(), 5, TimerKind::Once, 0);
        let b = registry.add(noop(), 5, TimerKind::Once, 0);
        assert!(registry.remove(b));
        let c = registry.add(noop(), 5, TimerKind::Once, 0);

        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn remove_unknown_is_noop() {
        let mut registry = Registry::<()>::new();
        assert!(!registry.remove(TimerId::from(42)));
        let id = registry.add(noop(), 1, TimerKind::Once, 0);
        assert!(registry.remove(id));
        assert!(!registry.remove(id));
    }

    #[test]
    fn first_run_is_relative_to_added_at() {
        let mut registry = Registry::new();
        let id = registry.add(noop(), 3, TimerKind::Repeating, 7);
        let entry = registry.get(id).unwrap();
        assert_eq!(entry.first_run_at, 10);
        assert_eq!(entry.last_run_at, None);
        assert!(entry.is_repeating());
    }

    #[test]
    fn reset_restarts_id_counter() {
        let mut registry = Registry::new();
        registry.add(noop(), 1, TimerKind::Once, 0);
        registry.add(noop(), 1, TimerKind::Once, 0);
        registry.reset();
        assert_eq!(registry.len(), 0);
        let id = registry.add(noop(), 1, TimerKind::Once, 0);
        assert_eq!(id, TimerId::from(0));
    }

    #[test]
    fn next_due_after_for_intervals() {
        let mut registry = Registry::new();
        let id = registry.add(noop(), 5, TimerKind::Repeating, 0);
        assert_eq!(registry.get(id).unwrap().next_due_after(0), 5);

        registry.all_mut().for_each(|e| e.last_run_at = Some(10));
        let entry = registry.get(id).unwrap();
        assert_eq!(entry.next_due_after(10), 15);
        assert_eq!(entry.next_due_after(12), 15);
    }

    #[test]
    fn next_due_after_ignores_firings_collected_ahead() {
        let mut registry = Registry::new();
        let id = registry.add(noop(), 5, TimerKind::Repeating, 0);
        // A batch up to 20 has been collected while the firing at 5 runs.
        registry.all_mut().for_each(|e| e.last_run_at = Some(20));

        let entry = registry.get(id).unwrap();
        assert_eq!(entry.next_due_after(5), 10);
        assert_eq!(entry.next_due_after(20), 25);
    }
}
