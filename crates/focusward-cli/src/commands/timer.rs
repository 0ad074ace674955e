use chrono::{Duration, Local};
use clap::Subcommand;
use focusward_core::timer::TICK_ALARM;
use focusward_core::{Command, Response};
use serde::Serialize;

use super::{open, print_json, CliResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start a focus session
    Start {
        /// Session length in seconds (defaults to timer.default_duration_secs)
        #[arg(long, short)]
        duration: Option<u64>,
    },
    /// Pause the running session
    Pause,
    /// Resume a paused session
    Resume,
    /// Abandon the current session without scoring it
    Reset,
    /// Print current timer state as JSON
    Status,
    /// Refresh remaining time, completing the session when it is due
    Tick,
    /// Reconcile the stored timer after a restart
    Recover,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusView {
    #[serde(flatten)]
    response: Response,
    /// Local wall-clock time the running session ends.
    #[serde(skip_serializing_if = "Option::is_none")]
    ends_at: Option<String>,
}

pub fn run(action: TimerAction) -> CliResult {
    let ctx = open()?;
    let service = &ctx.service;

    let response = match action {
        TimerAction::Start { duration } => service.handle(Command::Start { duration }),
        TimerAction::Pause => service.handle(Command::Pause),
        TimerAction::Resume => service.handle(Command::Resume),
        TimerAction::Reset => service.handle(Command::Reset),
        TimerAction::Tick => service.handle(Command::Wake {
            name: TICK_ALARM.to_string(),
        }),
        // `open` already ran recovery; report what it left behind.
        TimerAction::Recover | TimerAction::Status => service.handle(Command::GetState),
    };

    let ends_at = match &response {
        Response::State { timer, .. } if timer.is_running() => {
            let remaining = i64::try_from(timer.remaining).unwrap_or(i64::MAX);
            Duration::try_seconds(remaining)
                .and_then(|d| Local::now().checked_add_signed(d))
                .map(|t| t.to_rfc3339())
        }
        _ => None,
    };
    print_json(&StatusView { response, ends_at })
}
