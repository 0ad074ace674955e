use clap::Subcommand;
use focusward_core::{Command, Response};

use super::{open, print_json, CliResult};

#[derive(Subcommand)]
pub enum StatsAction {
    /// Today's totals and streak
    Today,
    /// This week's per-day aggregates
    Week,
    /// Completed sessions, newest last
    Sessions {
        /// Only show the most recent N sessions
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Hour and weekday focus patterns
    Patterns,
    /// Suggestions derived from patterns and history
    Suggestions,
}

pub fn run(action: StatsAction) -> CliResult {
    let ctx = open()?;
    let service = &ctx.service;

    match action {
        StatsAction::Today => match service.handle(Command::GetState) {
            Response::State { daily, .. } => print_json(&daily)?,
            other => print_json(&other)?,
        },
        StatsAction::Week => print_json(&service.handle(Command::GetWeekly))?,
        StatsAction::Sessions { limit } => match service.handle(Command::GetSessions) {
            Response::Sessions { mut sessions } => {
                if let Some(limit) = limit {
                    let skip = sessions.len().saturating_sub(limit);
                    sessions.drain(..skip);
                }
                print_json(&sessions)?;
            }
            other => print_json(&other)?,
        },
        StatsAction::Patterns => print_json(&service.handle(Command::GetPatterns))?,
        StatsAction::Suggestions => print_json(&service.handle(Command::GetSuggestions))?,
    }
    Ok(())
}
