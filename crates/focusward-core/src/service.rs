//! The command service: wires the components together and is the error
//! boundary for the presentation layer.

use std::sync::Arc;

use crate::clock::Clock;
use crate::command::{Command, Response};
use crate::distraction::DistractionTracker;
use crate::error::Result;
use crate::events::{Event, EventBus, Hook};
use crate::insights::{InsightsAggregator, PatternStore};
use crate::session::{DailyStats, SessionManager};
use crate::storage::{migrations, Config, Store};
use crate::timer::{Scheduler, TimerEngine, TimerState};

/// Everything a host needs, built once per process.
///
/// [`handle`](Self::handle) never fails: errors are logged and answered
/// with the last valid state or an empty result.
pub struct FocusService {
    bus: Arc<EventBus>,
    sessions: Arc<SessionManager>,
    tracker: Arc<DistractionTracker>,
    insights: Arc<InsightsAggregator>,
    engine: TimerEngine,
    default_duration: u64,
}

impl std::fmt::Debug for FocusService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FocusService")
            .field("engine", &self.engine)
            .finish_non_exhaustive()
    }
}

fn or_log<T>(what: &str, result: Result<T>, fallback: impl FnOnce() -> T) -> T {
    result.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "{what} failed");
        fallback()
    })
}

impl FocusService {
    pub fn new(
        store: Arc<dyn Store>,
        scheduler: Arc<dyn Scheduler>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Self {
        if let Err(e) = migrations::migrate(store.as_ref()) {
            tracing::warn!(error = %e, "store migration failed, continuing with existing records");
        }

        let bus = Arc::new(EventBus::new());
        let sessions = Arc::new(SessionManager::new(
            store.clone(),
            bus.clone(),
            clock.clone(),
            &config.stats,
        ));
        let tracker = Arc::new(DistractionTracker::new(
            store.clone(),
            bus.clone(),
            clock.clone(),
            sessions.clone(),
            &config.sites.defaults,
        ));
        let insights = Arc::new(InsightsAggregator::new(store.clone()));

        let sink = insights.clone();
        bus.on(Hook::SessionEnd, move |event| {
            if let Event::SessionEnd { session } = event {
                sink.record_pattern(session, session.score.unwrap_or_default())?;
            }
            Ok(())
        });

        let engine = TimerEngine::new(
            store,
            bus.clone(),
            clock,
            scheduler,
            sessions.clone(),
            tracker.clone(),
            config.timer.clone(),
        );

        Self {
            bus,
            sessions,
            tracker,
            insights,
            engine,
            default_duration: config.timer.default_duration_secs,
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn tracker(&self) -> &DistractionTracker {
        &self.tracker
    }

    pub fn insights(&self) -> &InsightsAggregator {
        &self.insights
    }

    /// Cold-start reconciliation. Hosts call this once before any command.
    pub fn recover(&self) -> Response {
        self.transition("recover", |engine| engine.recover())
    }

    pub fn handle(&self, command: Command) -> Response {
        tracing::debug!(?command, "handling command");
        match command {
            Command::Start { duration } => {
                self.transition("start", |e| e.start(duration.unwrap_or(0)))
            }
            Command::Pause => self.transition("pause", TimerEngine::pause),
            Command::Resume => self.transition("resume", TimerEngine::resume),
            Command::Reset => self.transition("reset", TimerEngine::reset),
            Command::TabActivated { tab_id, url } => {
                self.transition("tab activation", |e| e.tab_activated(tab_id, url.as_deref()))
            }
            Command::Navigated { tab_id, url } => {
                self.transition("navigation", |e| e.navigated(tab_id, &url))
            }
            Command::Wake { name } => self.transition("wake-up", |e| e.on_wake(&name)),
            Command::SaveReflection { session_id, text } => {
                if let Err(e) = self.sessions.save_reflection(&session_id, &text) {
                    tracing::warn!(error = %e, session_id = %session_id, "reflection not saved");
                }
                self.state_response()
            }
            Command::SkipReflection { session_id } => {
                if let Err(e) = self.sessions.skip_reflection(&session_id) {
                    tracing::warn!(error = %e, session_id = %session_id, "reflection not skipped");
                }
                self.state_response()
            }
            Command::GetState => self.state_response(),
            Command::AddSite { site } => {
                let sites = self.tracker.add_site(&site).or_else(|e| {
                    tracing::warn!(error = %e, site = %site, "site not added");
                    self.tracker.sites()
                });
                Response::Sites {
                    sites: or_log("site list read", sites, Vec::new),
                }
            }
            Command::RemoveSite { site } => Response::Sites {
                sites: or_log("site removal", self.tracker.remove_site(&site), Vec::new),
            },
            Command::GetSites => Response::Sites {
                sites: or_log("site list read", self.tracker.sites(), Vec::new),
            },
            Command::GetWeekly => Response::Weekly {
                weekly: or_log("weekly read", self.sessions.weekly(), Default::default),
            },
            Command::GetSessions => Response::Sessions {
                sessions: or_log("history read", self.sessions.history(), Vec::new),
            },
            Command::GetPatterns => Response::Patterns {
                patterns: or_log("pattern read", self.insights.patterns(), PatternStore::empty),
            },
            Command::GetSuggestions => Response::Suggestions {
                suggestions: self.insights.generate_suggestions(),
            },
            Command::GetReflections => Response::Reflections {
                reflections: or_log("reflection read", self.sessions.reflections(), Default::default),
            },
        }
    }

    fn transition(&self, what: &str, f: impl FnOnce(&TimerEngine) -> Result<TimerState>) -> Response {
        let timer = f(&self.engine).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "{what} failed, answering with stored state");
            self.current_timer()
        });
        Response::State {
            timer,
            daily: self.current_daily(),
        }
    }

    fn state_response(&self) -> Response {
        Response::State {
            timer: self.current_timer(),
            daily: self.current_daily(),
        }
    }

    fn current_timer(&self) -> TimerState {
        or_log("timer read", self.engine.state(), || {
            TimerState::idle(self.default_duration)
        })
    }

    fn current_daily(&self) -> DailyStats {
        or_log("daily stats read", self.sessions.daily_stats(), DailyStats::default)
    }
}
