//! Focus pattern aggregation and suggestions.
//!
//! Completed sessions are folded into hour-of-day and day-of-week buckets.
//! Suggestions are derived from those buckets plus the session history
//! and never mutate anything.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock;
use crate::error::Result;
use crate::session::Session;
use crate::storage::{Store, StoreExt, StoreKey};

const HOURS: usize = 24;
const DAYS: usize = 7;
const MAX_SUGGESTIONS: usize = 4;
const DISTRACTION_SPIKE_MINUTES: f64 = 5.0;
const TREND_WINDOW: usize = 3;
const TREND_THRESHOLD: f64 = 10.0;
const LONG_SESSION_SECS: u64 = 3600;
const LONG_SESSION_MIN_SAMPLE: usize = 4;
const LONG_SESSION_SHARE: f64 = 0.6;
const LONG_SESSION_SCORE_FLOOR: f64 = 65.0;

const DAY_NAMES: [&str; DAYS] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Hour and weekday buckets. Weekday 0 is Sunday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternStore {
    pub focus_by_hour: Vec<f64>,
    pub focus_by_day: Vec<f64>,
    pub distraction_by_hour: Vec<f64>,
    pub sessions_by_hour: Vec<f64>,
    pub score_by_hour: Vec<f64>,
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::empty()
    }
}

impl PatternStore {
    pub fn empty() -> Self {
        Self {
            focus_by_hour: vec![0.0; HOURS],
            focus_by_day: vec![0.0; DAYS],
            distraction_by_hour: vec![0.0; HOURS],
            sessions_by_hour: vec![0.0; HOURS],
            score_by_hour: vec![0.0; HOURS],
        }
    }

    /// Decode a stored record of any shape into exact-length, finite arrays.
    pub fn from_value(value: Option<&Value>) -> Self {
        let field = |name: &str, len: usize| normalize_array(value.and_then(|v| v.get(name)), len);
        Self {
            focus_by_hour: field("focusByHour", HOURS),
            focus_by_day: field("focusByDay", DAYS),
            distraction_by_hour: field("distractionByHour", HOURS),
            sessions_by_hour: field("sessionsByHour", HOURS),
            score_by_hour: field("scoreByHour", HOURS),
        }
    }

    /// Mean score of sessions started in `hour`.
    pub fn average_score_at(&self, hour: usize) -> Option<f64> {
        let count = *self.sessions_by_hour.get(hour)?;
        (count > 0.0).then(|| self.score_by_hour[hour] / count)
    }
}

fn normalize_array(raw: Option<&Value>, len: usize) -> Vec<f64> {
    let items = raw.and_then(Value::as_array);
    (0..len)
        .map(|i| {
            let number = match items.and_then(|a| a.get(i)) {
                Some(Value::Number(n)) => n.as_f64(),
                Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            number.filter(|n| n.is_finite()).unwrap_or(0.0)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestionKind {
    PeakHour,
    DistractionSpike,
    BestDay,
    ScoreTrend,
    LongSessions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub title: String,
    pub detail: String,
}

impl Suggestion {
    fn new(kind: SuggestionKind, title: String, detail: String) -> Self {
        Self { kind, title, detail }
    }
}

pub struct InsightsAggregator {
    store: Arc<dyn Store>,
}

impl std::fmt::Debug for InsightsAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InsightsAggregator").finish_non_exhaustive()
    }
}

impl InsightsAggregator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Fold a finished session into the pattern buckets.
    ///
    /// Sessions without a usable start time are skipped, never bucketed
    /// under the current hour.
    pub fn record_pattern(&self, session: &Session, score: u8) -> Result<bool> {
        if session.start_time <= 0 {
            tracing::warn!(session_id = %session.id, start_time = session.start_time, "session has no start time, pattern skipped");
            return Ok(false);
        }
        let Some((hour, weekday)) = clock::local_hour_and_weekday(session.start_time) else {
            tracing::warn!(session_id = %session.id, "start time out of range, pattern skipped");
            return Ok(false);
        };

        let focus = session.duration as f64 / 60.0;
        let distraction = session.distraction_seconds as f64 / 60.0;
        self.store.modify(StoreKey::PatternStore, &mut |raw| {
            let mut next = PatternStore::from_value(raw.as_ref());
            next.focus_by_hour[hour] += focus;
            next.focus_by_day[weekday] += focus;
            next.distraction_by_hour[hour] += distraction;
            next.sessions_by_hour[hour] += 1.0;
            next.score_by_hour[hour] += f64::from(score);
            Ok(serde_json::to_value(&next)?)
        })?;
        Ok(true)
    }

    pub fn patterns(&self) -> Result<PatternStore> {
        Ok(PatternStore::from_value(
            self.store.load(StoreKey::PatternStore)?.as_ref(),
        ))
    }

    /// Up to four suggestions. Read failures yield an empty list.
    pub fn generate_suggestions(&self) -> Vec<Suggestion> {
        let patterns = match self.patterns() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "pattern store unreadable");
                return Vec::new();
            }
        };
        let history: Vec<Session> = match self.store.get(StoreKey::SessionHistory, Vec::new()) {
            Ok(h) => h,
            Err(e) => {
                tracing::warn!(error = %e, "session history unreadable");
                return Vec::new();
            }
        };
        suggest(&patterns, &history)
    }
}

/// Index and value of the first maximum.
fn peak(values: &[f64]) -> Option<(usize, f64)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Pure suggestion rules, in priority order.
pub fn suggest(patterns: &PatternStore, history: &[Session]) -> Vec<Suggestion> {
    let mut out = Vec::new();

    if let Some((hour, minutes)) = peak(&patterns.focus_by_hour).filter(|(_, v)| *v > 0.0) {
        out.push(Suggestion::new(
            SuggestionKind::PeakHour,
            format!("Your peak focus hour is {hour:02}:00"),
            format!(
                "You have logged {} focus minutes starting around {hour:02}:00. Plan demanding work for that slot.",
                minutes.round()
            ),
        ));
    }

    if let Some((hour, minutes)) = peak(&patterns.distraction_by_hour)
        .filter(|(_, v)| *v > DISTRACTION_SPIKE_MINUTES)
    {
        out.push(Suggestion::new(
            SuggestionKind::DistractionSpike,
            format!("Distractions spike around {hour:02}:00"),
            format!(
                "{} minutes on distracting sites were logged in sessions started at {hour:02}:00. Consider blocking them then.",
                minutes.round()
            ),
        ));
    }

    if let Some((day, minutes)) = peak(&patterns.focus_by_day).filter(|(_, v)| *v > 0.0) {
        let name = DAY_NAMES[day];
        out.push(Suggestion::new(
            SuggestionKind::BestDay,
            format!("{name} is your most focused day"),
            format!("{} focus minutes so far on {name}s.", minutes.round()),
        ));
    }

    let scores: Vec<f64> = history
        .iter()
        .filter_map(|s| s.score)
        .map(f64::from)
        .collect();
    if scores.len() >= TREND_WINDOW * 2 {
        let split = scores.len() - TREND_WINDOW;
        let recent = mean(scores[split..].iter().copied());
        let prior = mean(scores[split - TREND_WINDOW..split].iter().copied());
        if let (Some(recent), Some(prior)) = (recent, prior) {
            let diff = recent - prior;
            if diff >= TREND_THRESHOLD {
                out.push(Suggestion::new(
                    SuggestionKind::ScoreTrend,
                    "Your focus is improving".to_string(),
                    format!(
                        "Your last {TREND_WINDOW} sessions averaged {recent:.0}, up from {prior:.0}."
                    ),
                ));
            } else if diff <= -TREND_THRESHOLD {
                out.push(Suggestion::new(
                    SuggestionKind::ScoreTrend,
                    "Your focus is slipping".to_string(),
                    format!(
                        "Your last {TREND_WINDOW} sessions averaged {recent:.0}, down from {prior:.0}."
                    ),
                ));
            }
        }
    }

    if history.len() >= LONG_SESSION_MIN_SAMPLE {
        let long: Vec<&Session> = history
            .iter()
            .filter(|s| s.duration >= LONG_SESSION_SECS)
            .collect();
        let share = long.len() as f64 / history.len() as f64;
        let long_mean = mean(long.iter().filter_map(|s| s.score).map(f64::from));
        if let Some(avg) = long_mean.filter(|avg| share > LONG_SESSION_SHARE && *avg < LONG_SESSION_SCORE_FLOOR) {
            out.push(Suggestion::new(
                SuggestionKind::LongSessions,
                "Try shorter sessions".to_string(),
                format!("Sessions of an hour or more average a score of {avg:.0}. Shorter blocks may hold focus better."),
            ));
        }
    }

    out.truncate(MAX_SUGGESTIONS);
    out
}
