use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "focusward", version, about = "Focusward attention-tracking focus timer")]
struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Browser tab signals
    Tab {
        #[command(subcommand)]
        action: commands::tab::TabAction,
    },
    /// Distracting site list
    Sites {
        #[command(subcommand)]
        action: commands::sites::SitesAction,
    },
    /// Session statistics and insights
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Post-session reflections
    Reflect {
        #[command(subcommand)]
        action: commands::reflect::ReflectAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// List registered plugins and hook subscriptions
    Plugins,
    /// Stay in the foreground and deliver timer wake-ups
    Watch(commands::watch::WatchArgs),
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // stdout carries JSON, so logs go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Tab { action } => commands::tab::run(action),
        Commands::Sites { action } => commands::sites::run(action),
        Commands::Stats { action } => commands::stats::run(action),
        Commands::Reflect { action } => commands::reflect::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Plugins => commands::plugins::run(),
        Commands::Watch(args) => commands::watch::run(args),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
