use clap::Subcommand;
use focusward_core::Command;

use super::{open, print_json, CliResult};

#[derive(Subcommand)]
pub enum SitesAction {
    /// Add a distracting site (e.g. "reddit.com" or a full URL)
    Add { site: String },
    /// Remove a site from the list
    Remove { site: String },
    /// Print the site list as JSON
    List,
}

pub fn run(action: SitesAction) -> CliResult {
    let ctx = open()?;
    let command = match action {
        SitesAction::Add { site } => Command::AddSite { site },
        SitesAction::Remove { site } => Command::RemoveSite { site },
        SitesAction::List => Command::GetSites,
    };
    print_json(&ctx.service.handle(command))
}
