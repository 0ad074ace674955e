mod engine;
mod state;
mod wake;

pub use engine::TimerEngine;
pub use state::{TimerState, TimerStatus, DEFAULT_DURATION_SECS};
pub use wake::{Scheduler, WakeQueue, COMPLETE_ALARM, TICK_ALARM};
