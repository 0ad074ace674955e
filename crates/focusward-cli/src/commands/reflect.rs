use clap::Subcommand;
use focusward_core::{Command, Response};

use super::{open, print_json, CliResult};

#[derive(Subcommand)]
pub enum ReflectAction {
    /// Save a note about a completed session
    Save {
        /// Note text
        text: String,
        /// Session to annotate (defaults to the pending prompt)
        #[arg(long)]
        session: Option<String>,
    },
    /// Dismiss the pending reflection prompt
    Skip {
        /// Session to dismiss (defaults to the pending prompt)
        #[arg(long)]
        session: Option<String>,
    },
    /// Print saved reflections as JSON
    List,
}

pub fn run(action: ReflectAction) -> CliResult {
    let ctx = open()?;
    let service = &ctx.service;

    let pending = || -> CliResult<String> {
        match service.handle(Command::GetState) {
            Response::State { timer, .. } => timer
                .pending_reflection
                .map(|p| p.session_id)
                .ok_or_else(|| "no pending reflection; pass --session".into()),
            _ => Err("unexpected response".into()),
        }
    };

    let response = match action {
        ReflectAction::Save { text, session } => {
            let session_id = match session {
                Some(id) => id,
                None => pending()?,
            };
            if text.trim().is_empty() {
                return Err("reflection text is empty".into());
            }
            service.handle(Command::SaveReflection { session_id, text })
        }
        ReflectAction::Skip { session } => {
            let session_id = match session {
                Some(id) => id,
                None => pending()?,
            };
            service.handle(Command::SkipReflection { session_id })
        }
        ReflectAction::List => service.handle(Command::GetReflections),
    };
    print_json(&response)
}
