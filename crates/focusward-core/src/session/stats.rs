//! Daily and weekly rollups of completed sessions.
//!
//! Both records are keyed by local calendar dates and replaced by a fresh
//! record when the stored key no longer matches the current day or week.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Session;
use crate::scoring::QualityLabel;

/// Totals for one local calendar day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyStats {
    /// `YYYY-MM-DD`, local time.
    pub date: String,
    pub total_focus_minutes: u64,
    pub sessions_completed: u64,
    pub tab_switches: u64,
    pub distraction_visits: u64,
    pub distraction_seconds: u64,
    /// Consecutive qualifying days before this one.
    pub streak: u64,
}

impl DailyStats {
    pub fn fresh(date: impl Into<String>, streak: u64) -> Self {
        Self {
            date: date.into(),
            streak,
            ..Self::default()
        }
    }

    /// Today's record given whatever was stored.
    ///
    /// A record from another day is replaced. Its streak carries forward
    /// (plus one) only when it is yesterday's and met `threshold_minutes`.
    pub fn rolled(stored: Self, today: &str, yesterday: &str, threshold_minutes: u64) -> Self {
        if stored.date == today {
            return stored;
        }
        let streak = if stored.date == yesterday && stored.total_focus_minutes >= threshold_minutes {
            stored.streak.saturating_add(1)
        } else {
            0
        };
        Self::fresh(today, streak)
    }

    pub fn record(&mut self, session: &Session) {
        self.total_focus_minutes = self.total_focus_minutes.saturating_add(session.focus_minutes());
        self.sessions_completed = self.sessions_completed.saturating_add(1);
        self.tab_switches = self.tab_switches.saturating_add(session.tab_switch_count);
        self.distraction_visits = self
            .distraction_visits
            .saturating_add(session.distraction_visits);
        self.distraction_seconds = self
            .distraction_seconds
            .saturating_add(session.distraction_seconds);
    }
}

/// Per-tier session counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QualityCounts {
    pub deep_work: u64,
    pub focused: u64,
    pub fragmented: u64,
    pub distracted: u64,
}

impl QualityCounts {
    pub fn increment(&mut self, label: QualityLabel) {
        let slot = match label {
            QualityLabel::DeepWork => &mut self.deep_work,
            QualityLabel::Focused => &mut self.focused,
            QualityLabel::Fragmented => &mut self.fragmented,
            QualityLabel::Distracted => &mut self.distracted,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn total(&self) -> u64 {
        self.deep_work + self.focused + self.fragmented + self.distracted
    }
}

/// One day inside a [`WeeklyData`] bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DayAggregate {
    pub focus_minutes: u64,
    pub distraction_minutes: u64,
    pub score_sum: u64,
    pub score_count: u64,
    pub quality: QualityCounts,
}

impl DayAggregate {
    pub fn average_score(&self) -> Option<f64> {
        (self.score_count > 0).then(|| self.score_sum as f64 / self.score_count as f64)
    }
}

/// Aggregates for one Monday-anchored local week.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeeklyData {
    /// `YYYY-MM-DD` of the week's Monday.
    pub week_start: String,
    pub days: BTreeMap<String, DayAggregate>,
}

impl WeeklyData {
    pub fn fresh(week_start: impl Into<String>) -> Self {
        Self {
            week_start: week_start.into(),
            days: BTreeMap::new(),
        }
    }

    /// The current week's bucket given whatever was stored.
    pub fn rolled(stored: Self, week_start: &str) -> Self {
        if stored.week_start == week_start {
            stored
        } else {
            Self::fresh(week_start)
        }
    }

    /// Fold a finalized session into `day`.
    pub fn record(&mut self, day: &str, session: &Session) {
        let entry = self.days.entry(day.to_string()).or_default();
        entry.focus_minutes = entry.focus_minutes.saturating_add(session.focus_minutes());
        entry.distraction_minutes = entry
            .distraction_minutes
            .saturating_add(session.distraction_minutes());
        if let Some(score) = session.score {
            entry.score_sum = entry.score_sum.saturating_add(u64::from(score));
            entry.score_count = entry.score_count.saturating_add(1);
        }
        if let Some(label) = session.quality_label {
            entry.quality.increment(label);
        }
    }

    pub fn total_focus_minutes(&self) -> u64 {
        self.days.values().map(|d| d.focus_minutes).sum()
    }
}
