//! Wake-up scheduling.
//!
//! The engine never sleeps. It asks a [`Scheduler`] to call back later by
//! name, and the host delivers those names to
//! [`TimerEngine::on_wake`](super::TimerEngine::on_wake). Delivery is
//! best-effort: a late or missing wake-up is reconciled from timestamps.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::clock::Clock;

/// One-shot wake-up at the end of the running segment.
pub const COMPLETE_ALARM: &str = "focus-complete";
/// Recurring wake-up that refreshes `remaining`.
pub const TICK_ALARM: &str = "focus-tick";

/// Host facility for named, delayed callbacks.
pub trait Scheduler: Send + Sync {
    fn schedule_once(&self, name: &str, delay_secs: u64);
    fn schedule_repeating(&self, name: &str, period_secs: u64);
    fn cancel(&self, name: &str);
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    due_ms: i64,
    period_ms: Option<i64>,
}

/// In-process [`Scheduler`] polled by the host loop.
///
/// Scheduling an existing name replaces it.
pub struct WakeQueue {
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl std::fmt::Debug for WakeQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WakeQueue")
            .field("pending", &self.pending())
            .finish_non_exhaustive()
    }
}

fn secs_to_ms(secs: u64) -> i64 {
    i64::try_from(secs).unwrap_or(i64::MAX / 1000).saturating_mul(1000)
}

impl WakeQueue {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Names whose due time has passed, earliest first.
    ///
    /// One-shot entries are removed; repeating entries are re-armed one
    /// period after now so a long gap fires them once, not once per
    /// missed period.
    pub fn due(&self) -> Vec<String> {
        let now = self.clock.now_ms();
        let mut entries = self.entries();
        let mut fired: Vec<(i64, String)> = entries
            .iter()
            .filter(|(_, e)| e.due_ms <= now)
            .map(|(name, e)| (e.due_ms, name.clone()))
            .collect();
        fired.sort();

        for (_, name) in &fired {
            let rearm = entries.get(name).and_then(|e| e.period_ms);
            match rearm {
                Some(period) => {
                    if let Some(entry) = entries.get_mut(name) {
                        entry.due_ms = now.saturating_add(period);
                    }
                }
                None => {
                    entries.remove(name);
                }
            }
        }
        fired.into_iter().map(|(_, name)| name).collect()
    }

    pub fn is_scheduled(&self, name: &str) -> bool {
        self.entries().contains_key(name)
    }

    /// Scheduled names, sorted.
    pub fn pending(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn next_due_ms(&self) -> Option<i64> {
        self.entries().values().map(|e| e.due_ms).min()
    }
}

impl Scheduler for WakeQueue {
    fn schedule_once(&self, name: &str, delay_secs: u64) {
        let due_ms = self.clock.now_ms().saturating_add(secs_to_ms(delay_secs));
        tracing::debug!(name, delay_secs, "wake-up scheduled");
        self.entries().insert(
            name.to_string(),
            Entry {
                due_ms,
                period_ms: None,
            },
        );
    }

    fn schedule_repeating(&self, name: &str, period_secs: u64) {
        let period = secs_to_ms(period_secs.max(1));
        let due_ms = self.clock.now_ms().saturating_add(period);
        tracing::debug!(name, period_secs, "repeating wake-up scheduled");
        self.entries().insert(
            name.to_string(),
            Entry {
                due_ms,
                period_ms: Some(period),
            },
        );
    }

    fn cancel(&self, name: &str) {
        self.entries().remove(name);
    }
}
