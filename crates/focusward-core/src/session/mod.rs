//! Focus sessions and their lifecycle.
//!
//! A [`Session`] is created when the timer starts, accumulates counters
//! while it runs, and is finalized exactly once by the
//! [`SessionManager`]. Field transitions live here so every writer goes
//! through the same small set of mutators.

mod manager;
mod reflection;
mod stats;

pub use manager::SessionManager;
pub use reflection::{Reflection, ReflectionPrompt};
pub use stats::{DailyStats, DayAggregate, QualityCounts, WeeklyData};

use serde::{Deserialize, Serialize};

use crate::scoring::{QualityLabel, SessionScore};

/// One focus attempt.
///
/// Numeric fields default to zero when a stored record lacks them, so a
/// partially written session still scores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub id: String,
    /// Epoch milliseconds.
    #[serde(default)]
    pub start_time: i64,
    /// Planned seconds; replaced by the actual duration on finalize.
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub tab_switch_count: u64,
    #[serde(default)]
    pub distraction_visits: u64,
    #[serde(default)]
    pub distraction_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_distraction_domain: Option<String>,
    #[serde(default)]
    pub interrupted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_label: Option<QualityLabel>,
    #[serde(default)]
    pub completed: bool,
}

impl Session {
    pub fn new(id: String, start_time: i64, duration: u64) -> Self {
        Self {
            id,
            start_time,
            duration,
            tab_switch_count: 0,
            distraction_visits: 0,
            distraction_seconds: 0,
            last_distraction_domain: None,
            interrupted: false,
            end_time: None,
            score: None,
            quality_label: None,
            completed: false,
        }
    }

    pub(crate) fn record_tab_switch(&mut self) {
        if self.completed {
            return;
        }
        self.tab_switch_count = self.tab_switch_count.saturating_add(1);
    }

    pub(crate) fn record_distraction_visit(&mut self, domain: &str) {
        if self.completed {
            return;
        }
        self.distraction_visits = self.distraction_visits.saturating_add(1);
        self.last_distraction_domain = Some(domain.to_string());
    }

    pub(crate) fn add_distraction_seconds(&mut self, secs: u64) {
        if self.completed {
            return;
        }
        self.distraction_seconds = self.distraction_seconds.saturating_add(secs);
    }

    /// Sticky: once set it is never cleared.
    pub(crate) fn mark_interrupted(&mut self) {
        if self.completed {
            return;
        }
        self.interrupted = true;
    }

    pub(crate) fn finalize(&mut self, end_time: i64, actual_duration: u64, result: SessionScore) {
        self.end_time = Some(end_time);
        self.duration = actual_duration;
        self.score = Some(result.score);
        self.quality_label = Some(result.quality_label);
        self.completed = true;
    }

    /// Whole minutes of focus, rounded half up.
    pub fn focus_minutes(&self) -> u64 {
        self.duration.saturating_add(30) / 60
    }

    /// Whole minutes spent on distracting sites, rounded half up.
    pub fn distraction_minutes(&self) -> u64 {
        self.distraction_seconds.saturating_add(30) / 60
    }
}
