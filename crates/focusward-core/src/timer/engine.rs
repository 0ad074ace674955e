//! Timer engine implementation.
//!
//! The timer engine is a wall-clock-based state machine. It holds no
//! state of its own and runs no threads: every operation reads the
//! persisted [`TimerState`], applies one transition in a single
//! read-merge-write step, and asks the [`Scheduler`] for the next wake-up.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running <-> Paused
//! Running -> Idle   (complete or reset)
//! Paused  -> Idle   (reset)
//! ```
//!
//! Remaining time is always derived from `started_at` and
//! `elapsed_before_pause`, so a late wake-up or a cold start simply
//! recomputes it.

use std::sync::Arc;

use super::state::{TimerState, TimerStatus};
use super::wake::{Scheduler, COMPLETE_ALARM, TICK_ALARM};
use crate::clock::Clock;
use crate::distraction::DistractionTracker;
use crate::error::Result;
use crate::events::{Event, EventBus, TabId};
use crate::scoring::QualityLabel;
use crate::session::{ReflectionPrompt, SessionManager};
use crate::storage::{Store, StoreExt, StoreKey, TimerConfig};

pub struct TimerEngine {
    store: Arc<dyn Store>,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    sessions: Arc<SessionManager>,
    tracker: Arc<DistractionTracker>,
    config: TimerConfig,
}

impl std::fmt::Debug for TimerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TimerEngine {
    pub fn new(
        store: Arc<dyn Store>,
        bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn Scheduler>,
        sessions: Arc<SessionManager>,
        tracker: Arc<DistractionTracker>,
        config: TimerConfig,
    ) -> Self {
        Self {
            store,
            bus,
            clock,
            scheduler,
            sessions,
            tracker,
            config,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// The persisted timer record, idle when nothing is stored.
    pub fn state(&self) -> Result<TimerState> {
        self.store.get(
            StoreKey::TimerState,
            TimerState::idle(self.config.default_duration_secs),
        )
    }

    fn update<R>(&self, f: impl FnOnce(&mut TimerState) -> R) -> Result<R> {
        self.store.update(
            StoreKey::TimerState,
            TimerState::idle(self.config.default_duration_secs),
            f,
        )
    }

    fn arm(&self, remaining: u64) {
        self.scheduler.schedule_once(COMPLETE_ALARM, remaining);
        self.scheduler
            .schedule_repeating(TICK_ALARM, self.config.tick_interval_secs);
    }

    fn disarm(&self) {
        self.scheduler.cancel(COMPLETE_ALARM);
        self.scheduler.cancel(TICK_ALARM);
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// Start a new session of `duration` seconds. Zero means the
    /// configured default.
    pub fn start(&self, duration: u64) -> Result<TimerState> {
        let duration = if duration == 0 {
            tracing::warn!(
                default = self.config.default_duration_secs,
                "zero duration requested, using default"
            );
            self.config.default_duration_secs
        } else {
            duration
        };

        self.tracker.leave()?;
        let now = self.clock.now_ms();
        let session = self.sessions.create_session(duration, now);
        let session_id = session.id.clone();

        let state = self.update(|state| {
            if let Some(stale) = state.current_session.take() {
                tracing::warn!(session_id = %stale.id, "discarding unfinished session");
            }
            *state = TimerState {
                status: TimerStatus::Running,
                duration,
                remaining: duration,
                started_at: Some(now),
                elapsed_before_pause: 0,
                current_session: Some(session),
                pending_reflection: None,
            };
            state.clone()
        })?;
        self.arm(duration);

        tracing::info!(session_id = %session_id, duration, "timer started");
        self.bus.emit(&Event::SessionStart {
            session_id: session_id.clone(),
            duration,
            start_time: now,
        });
        self.bus.emit(&Event::FocusModeEnabled { session_id });
        Ok(state)
    }

    pub fn pause(&self) -> Result<TimerState> {
        let current = self.state()?;
        if !current.is_running() {
            return Ok(current);
        }
        self.tracker.leave()?;

        let now = self.clock.now_ms();
        let paused = self.update(|state| {
            if !state.is_running() {
                return false;
            }
            let elapsed = state.elapsed_at(now).min(state.duration);
            state.remaining = state.duration - elapsed;
            state.status = TimerStatus::Paused;
            state.elapsed_before_pause = elapsed;
            state.started_at = None;
            true
        })?;
        if !paused {
            return self.state();
        }
        self.disarm();
        self.sessions.mark_interrupted()?;
        let state = self.state()?;
        tracing::info!(remaining = state.remaining, "timer paused");
        Ok(state)
    }

    pub fn resume(&self) -> Result<TimerState> {
        let now = self.clock.now_ms();
        let resumed = self.update(|state| {
            if state.status != TimerStatus::Paused {
                return None;
            }
            state.status = TimerStatus::Running;
            state.started_at = Some(now);
            Some(state.clone())
        })?;
        let Some(state) = resumed else {
            return self.state();
        };
        self.arm(state.remaining);
        tracing::info!(remaining = state.remaining, "timer resumed");
        Ok(state)
    }

    /// Abandon the current session without scoring it.
    pub fn reset(&self) -> Result<TimerState> {
        self.disarm();
        self.tracker.leave()?;

        let (was_active, state) = self.update(|state| {
            let was_active = state.status != TimerStatus::Idle || state.current_session.is_some();
            state.current_session = None;
            state.settle_idle();
            (was_active, state.clone())
        })?;
        if was_active {
            tracing::info!("timer reset");
            self.bus.emit(&Event::FocusModeDisabled);
        }
        Ok(state)
    }

    /// Refresh `remaining` from the wall clock, completing when it hits zero.
    pub fn tick(&self) -> Result<TimerState> {
        let now = self.clock.now_ms();
        let state = self.update(|state| {
            if state.is_running() {
                state.remaining = state.remaining_at(now);
            }
            state.clone()
        })?;
        if !state.is_running() {
            return Ok(state);
        }

        self.bus.emit(&Event::Tick {
            remaining: state.remaining,
        });
        if state.remaining == 0 {
            return self.complete();
        }
        Ok(state)
    }

    /// Finalize the running session.
    ///
    /// The session is detached in the same step that moves the timer to
    /// idle, so a concurrent second call finds nothing to finalize.
    pub fn complete(&self) -> Result<TimerState> {
        self.disarm();
        match self.state()?.ends_at_ms() {
            Some(end) => self.tracker.leave_until(end)?,
            None => self.tracker.leave()?,
        };

        let now = self.clock.now_ms();
        let detached = self.update(|state| {
            let session = state.current_session.take()?;
            let actual = state.elapsed_at(now).min(state.duration);
            state.settle_idle();
            Some((session, actual))
        })?;
        let Some((session, actual)) = detached else {
            tracing::debug!("complete called without a session");
            return self.state();
        };

        let finished = self.sessions.complete_session(session, actual)?;
        let score = finished.score.unwrap_or_default();
        let prompt = ReflectionPrompt {
            session_id: finished.id.clone(),
            score,
            quality_label: finished
                .quality_label
                .unwrap_or_else(|| QualityLabel::from_score(score)),
            duration: finished.duration,
        };
        let state = self.update(|state| {
            state.pending_reflection = Some(prompt);
            state.clone()
        })?;

        self.bus.emit(&Event::FocusModeDisabled);
        Ok(state)
    }

    /// Reconcile after a cold start: complete an overdue session or
    /// re-arm the wake-ups of a running one.
    pub fn recover(&self) -> Result<TimerState> {
        let current = self.state()?;
        if !current.is_running() {
            return Ok(current);
        }

        let remaining = current.remaining_at(self.clock.now_ms());
        if remaining == 0 {
            tracing::info!("session ran out while away, completing");
            return self.complete();
        }
        let state = self.update(|state| {
            state.remaining = remaining;
            state.clone()
        })?;
        self.arm(remaining);
        tracing::debug!(remaining, "running timer recovered");
        Ok(state)
    }

    /// Dispatch a named wake-up from the scheduler.
    pub fn on_wake(&self, name: &str) -> Result<TimerState> {
        match name {
            TICK_ALARM => self.tick(),
            COMPLETE_ALARM => {
                let state = self.tick()?;
                if state.is_running() {
                    tracing::debug!(remaining = state.remaining, "completion wake-up fired early");
                    self.scheduler.schedule_once(COMPLETE_ALARM, state.remaining);
                }
                Ok(state)
            }
            other => {
                tracing::warn!(name = other, "ignoring unknown wake-up");
                self.state()
            }
        }
    }

    // ── Browser signals ──────────────────────────────────────────────

    /// A different tab became active.
    pub fn tab_activated(&self, tab_id: TabId, url: Option<&str>) -> Result<TimerState> {
        let current = self.state()?;
        if !current.is_running() {
            return Ok(current);
        }
        self.sessions.record_tab_switch()?;
        self.tracker.leave()?;
        if let Some(domain) = url.map(|u| self.tracker.check(u)).transpose()?.flatten() {
            self.tracker.enter(tab_id, &domain)?;
        }
        self.state()
    }

    /// A tab finished loading `url`.
    pub fn navigated(&self, tab_id: TabId, url: &str) -> Result<TimerState> {
        let current = self.state()?;
        if !current.is_running() {
            return Ok(current);
        }
        self.tracker.handle_navigation(tab_id, url)?;
        self.state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::Hook;
    use crate::storage::{MemoryStore, StatsConfig};
    use crate::timer::WakeQueue;
    use std::sync::Mutex;

    struct Fixture {
        engine: TimerEngine,
        clock: Arc<ManualClock>,
        queue: Arc<WakeQueue>,
        bus: Arc<EventBus>,
    }

    fn fixture() -> Fixture {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let bus = Arc::new(EventBus::new());
        let clock = Arc::new(ManualClock::new(1_800_000_000_000));
        let queue = Arc::new(WakeQueue::new(clock.clone()));
        let sessions = Arc::new(SessionManager::new(
            store.clone(),
            bus.clone(),
            clock.clone(),
            &StatsConfig::default(),
        ));
        let tracker = Arc::new(DistractionTracker::new(
            store.clone(),
            bus.clone(),
            clock.clone(),
            sessions.clone(),
            &["youtube.com".to_string()],
        ));
        let engine = TimerEngine::new(
            store,
            bus.clone(),
            clock.clone(),
            queue.clone(),
            sessions,
            tracker,
            TimerConfig::default(),
        );
        Fixture {
            engine,
            clock,
            queue,
            bus,
        }
    }

    #[test]
    fn start_arms_both_wake_ups_and_emits() {
        let f = fixture();
        let hooks = Arc::new(Mutex::new(Vec::new()));
        for hook in [Hook::SessionStart, Hook::FocusModeEnabled] {
            let hooks = hooks.clone();
            f.bus.on(hook, move |e| {
                hooks.lock().unwrap().push(e.hook());
                Ok(())
            });
        }
        let state = f.engine.start(300).unwrap();
        assert_eq!(state.status, TimerStatus::Running);
        assert_eq!(state.remaining, 300);
        assert!(state.current_session.is_some());
        assert_eq!(f.queue.pending(), vec![COMPLETE_ALARM.to_string(), TICK_ALARM.to_string()]);
        assert_eq!(*hooks.lock().unwrap(), vec![Hook::SessionStart, Hook::FocusModeEnabled]);
    }

    #[test]
    fn zero_duration_uses_configured_default() {
        let f = fixture();
        assert_eq!(f.engine.start(0).unwrap().duration, 1500);
    }

    #[test]
    fn guards_make_wrong_state_calls_no_ops() {
        let f = fixture();
        assert_eq!(f.engine.pause().unwrap().status, TimerStatus::Idle);
        assert_eq!(f.engine.resume().unwrap().status, TimerStatus::Idle);
        assert_eq!(f.engine.tick().unwrap().status, TimerStatus::Idle);
        f.engine.start(300).unwrap();
        assert_eq!(f.engine.resume().unwrap().status, TimerStatus::Running);
    }

    #[test]
    fn pause_banks_elapsed_and_cancels_wake_ups() {
        let f = fixture();
        f.engine.start(300).unwrap();
        f.clock.advance_ms(61_900);
        let state = f.engine.pause().unwrap();
        assert_eq!(state.status, TimerStatus::Paused);
        assert_eq!(state.elapsed_before_pause, 61);
        assert_eq!(state.remaining, 239);
        assert!(state.current_session.unwrap().interrupted);
        assert!(f.queue.pending().is_empty());

        f.clock.advance_secs(3600);
        let state = f.engine.resume().unwrap();
        assert_eq!(state.remaining, 239);
        assert_eq!(f.queue.pending().len(), 2);
    }

    #[test]
    fn reset_discards_session_without_history() {
        let f = fixture();
        f.engine.start(300).unwrap();
        f.clock.advance_secs(30);
        let state = f.engine.reset().unwrap();
        assert_eq!(state, TimerState::idle(300));
        assert!(f.engine.sessions.history().unwrap().is_empty());
        assert!(f.queue.pending().is_empty());
    }

    #[test]
    fn early_completion_wake_up_rearms() {
        let f = fixture();
        f.engine.start(300).unwrap();
        f.clock.advance_secs(100);
        let state = f.engine.on_wake(COMPLETE_ALARM).unwrap();
        assert_eq!(state.remaining, 200);
        assert!(f.queue.is_scheduled(COMPLETE_ALARM));
        f.queue.cancel(TICK_ALARM);
        assert_eq!(f.queue.next_due_ms(), Some(f.clock.now_ms() + 200_000));
    }

    #[test]
    fn completion_leaves_reflection_prompt() {
        let f = fixture();
        f.engine.start(300).unwrap();
        f.clock.advance_secs(301);
        let state = f.engine.on_wake(COMPLETE_ALARM).unwrap();
        assert_eq!(state.status, TimerStatus::Idle);
        assert!(state.current_session.is_none());
        let prompt = state.pending_reflection.unwrap();
        assert_eq!(prompt.score, 100);
        assert_eq!(prompt.duration, 300);
        assert!(f.queue.pending().is_empty());
        // A second completion finds nothing to finalize.
        f.engine.complete().unwrap();
        assert_eq!(f.engine.sessions.history().unwrap().len(), 1);
    }

    #[test]
    fn unknown_wake_up_is_ignored() {
        let f = fixture();
        f.engine.start(300).unwrap();
        assert_eq!(f.engine.on_wake("bogus").unwrap().status, TimerStatus::Running);
    }

    #[test]
    fn tab_signals_only_count_while_running() {
        let f = fixture();
        f.engine.tab_activated(1, Some("https://youtube.com")).unwrap();
        f.engine.start(300).unwrap();
        f.engine.tab_activated(1, Some("https://youtube.com/watch")).unwrap();
        f.clock.advance_secs(10);
        let state = f.engine.tab_activated(2, None).unwrap();
        let session = state.current_session.unwrap();
        assert_eq!(session.tab_switch_count, 2);
        assert_eq!(session.distraction_visits, 1);
        assert_eq!(session.distraction_seconds, 10);
    }
}
