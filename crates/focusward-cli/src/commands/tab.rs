use clap::Subcommand;
use focusward_core::Command;

use super::{open, print_json, CliResult};

#[derive(Subcommand)]
pub enum TabAction {
    /// A tab became active
    Activate {
        tab_id: i64,
        /// URL of the newly active tab, if known
        url: Option<String>,
    },
    /// A tab finished loading a URL
    Navigate { tab_id: i64, url: String },
}

pub fn run(action: TabAction) -> CliResult {
    let ctx = open()?;
    let response = match action {
        TabAction::Activate { tab_id, url } => {
            ctx.service.handle(Command::TabActivated { tab_id, url })
        }
        TabAction::Navigate { tab_id, url } => {
            ctx.service.handle(Command::Navigated { tab_id, url })
        }
    };
    print_json(&response)
}
