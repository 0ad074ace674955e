//! # Focusward Core Library
//!
//! This library provides the core logic for Focusward, an attention-tracking
//! focus timer. Every operation is available through the standalone CLI
//! binary; a browser host drives the same library through typed commands.
//!
//! ## Architecture
//!
//! - **Timer Engine**: A wall-clock-based state machine. It owns no threads;
//!   the host delivers named wake-ups and browser signals
//! - **Sessions**: Scoring, finalization, history and daily/weekly rollups
//! - **Distraction Tracking**: One open interval on a distracting site at a time
//! - **Insights**: Hour/day focus patterns and suggestions
//! - **Storage**: A narrow key-value boundary backed by SQLite or memory,
//!   plus TOML configuration
//! - **Events**: A closed set of hooks with isolated plugin handlers
//!
//! ## Key Components
//!
//! - [`FocusService`]: Wires everything together and answers [`Command`]s
//! - [`TimerEngine`]: Core timer state machine
//! - [`SessionManager`]: Single writer for session records
//! - [`Database`]: SQLite persistence
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod command;
pub mod distraction;
pub mod error;
pub mod events;
pub mod insights;
pub mod scoring;
pub mod service;
pub mod session;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{Command, Response};
pub use distraction::{DistractionTracker, OpenInterval};
pub use error::{ConfigError, CoreError, StorageError, ValidationError};
pub use events::{Event, EventBus, Hook, Plugin};
pub use insights::{InsightsAggregator, PatternStore, Suggestion, SuggestionKind};
pub use scoring::{QualityLabel, SessionScore};
pub use service::FocusService;
pub use session::{DailyStats, Reflection, Session, SessionManager, WeeklyData};
pub use storage::{Config, Database, MemoryStore, Store, StoreExt, StoreKey};
pub use timer::{Scheduler, TimerEngine, TimerState, TimerStatus, WakeQueue};
