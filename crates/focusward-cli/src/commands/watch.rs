use std::time::Duration;

use clap::Args;
use focusward_core::{Command, TimerStatus};

use super::{open, CliResult, Context};

#[derive(Args)]
pub struct WatchArgs {
    /// How often to check for due wake-ups, in milliseconds
    #[arg(long, default_value = "1000")]
    interval_ms: u64,
    /// Exit once the timer is idle
    #[arg(long)]
    until_idle: bool,
}

/// Poll the wake-up queue until interrupted. Prints the recovered state,
/// then one JSON line per delivered wake-up.
pub fn run(args: WatchArgs) -> CliResult {
    let ctx = open()?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(watch(&ctx, &args))
}

async fn watch(ctx: &Context, args: &WatchArgs) -> CliResult {
    let mut interval = tokio::time::interval(Duration::from_millis(args.interval_ms.max(50)));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    tracing::info!(pending = ?ctx.queue.pending(), "watching timer");
    let recovered = ctx.service.handle(Command::GetState);
    println!("{}", serde_json::to_string(&recovered)?);

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut ctrl_c => {
                tracing::info!("interrupted");
                break;
            }
        }

        for name in ctx.queue.due() {
            let response = ctx.service.handle(Command::Wake { name });
            println!("{}", serde_json::to_string(&response)?);
        }

        if args.until_idle && ctx.service.engine().state()?.status == TimerStatus::Idle {
            break;
        }
    }
    Ok(())
}
