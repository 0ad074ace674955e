//! Typed messages between a presentation layer and the [`FocusService`].
//!
//! [`FocusService`]: crate::service::FocusService

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::events::TabId;
use crate::insights::{PatternStore, Suggestion};
use crate::session::{DailyStats, Reflection, Session, WeeklyData};
use crate::timer::TimerState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    /// Start a session; `None` or zero uses the configured duration.
    Start {
        #[serde(default)]
        duration: Option<u64>,
    },
    Pause,
    Resume,
    Reset,
    TabActivated {
        tab_id: TabId,
        #[serde(default)]
        url: Option<String>,
    },
    Navigated {
        tab_id: TabId,
        url: String,
    },
    /// A scheduler wake-up delivered by the host.
    Wake {
        name: String,
    },
    AddSite {
        site: String,
    },
    RemoveSite {
        site: String,
    },
    GetSites,
    GetWeekly,
    GetSessions,
    GetPatterns,
    GetSuggestions,
    SaveReflection {
        session_id: String,
        text: String,
    },
    SkipReflection {
        session_id: String,
    },
    GetReflections,
    GetState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Response {
    State {
        timer: TimerState,
        daily: DailyStats,
    },
    Sites {
        sites: Vec<String>,
    },
    Weekly {
        weekly: WeeklyData,
    },
    Sessions {
        sessions: Vec<Session>,
    },
    Patterns {
        patterns: PatternStore,
    },
    Suggestions {
        suggestions: Vec<Suggestion>,
    },
    Reflections {
        reflections: BTreeMap<String, Reflection>,
    },
}
