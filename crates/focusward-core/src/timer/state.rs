use serde::{Deserialize, Serialize};

use crate::session::{ReflectionPrompt, Session};

/// Default session length, seconds.
pub const DEFAULT_DURATION_SECS: u64 = 25 * 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
}

/// The single persisted timer record.
///
/// `remaining` is a cache. While running, the truth is
/// `duration - (now - started_at) - elapsed_before_pause`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerState {
    #[serde(default)]
    pub status: TimerStatus,
    #[serde(default = "default_duration")]
    pub duration: u64,
    #[serde(default = "default_duration")]
    pub remaining: u64,
    /// Epoch milliseconds of the current run segment's start.
    #[serde(default)]
    pub started_at: Option<i64>,
    #[serde(default)]
    pub elapsed_before_pause: u64,
    #[serde(default)]
    pub current_session: Option<Session>,
    #[serde(default)]
    pub pending_reflection: Option<ReflectionPrompt>,
}

fn default_duration() -> u64 {
    DEFAULT_DURATION_SECS
}

impl TimerState {
    pub fn idle(duration: u64) -> Self {
        Self {
            status: TimerStatus::Idle,
            duration,
            remaining: duration,
            started_at: None,
            elapsed_before_pause: 0,
            current_session: None,
            pending_reflection: None,
        }
    }

    /// Seconds of focus counted at `now_ms`. Clock skew backwards counts as zero.
    pub fn elapsed_at(&self, now_ms: i64) -> u64 {
        let segment = match (self.status, self.started_at) {
            (TimerStatus::Running, Some(start)) => {
                u64::try_from(now_ms.saturating_sub(start).max(0) / 1000).unwrap_or(0)
            }
            _ => 0,
        };
        segment.saturating_add(self.elapsed_before_pause)
    }

    /// Wall-clock instant the running segment reaches `duration`.
    pub fn ends_at_ms(&self) -> Option<i64> {
        match (self.status, self.started_at) {
            (TimerStatus::Running, Some(start)) => {
                let left = self.duration.saturating_sub(self.elapsed_before_pause);
                let left_ms = i64::try_from(left).unwrap_or(i64::MAX).saturating_mul(1000);
                Some(start.saturating_add(left_ms))
            }
            _ => None,
        }
    }

    pub fn remaining_at(&self, now_ms: i64) -> u64 {
        self.duration.saturating_sub(self.elapsed_at(now_ms))
    }

    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    /// Return to idle, keeping the configured duration.
    pub(crate) fn settle_idle(&mut self) {
        self.status = TimerStatus::Idle;
        self.remaining = self.duration;
        self.started_at = None;
        self.elapsed_before_pause = 0;
    }
}

impl Default for TimerState {
    fn default() -> Self {
        Self::idle(DEFAULT_DURATION_SECS)
    }
}
