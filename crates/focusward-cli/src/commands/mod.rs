pub mod config;
pub mod plugins;
pub mod reflect;
pub mod sites;
pub mod stats;
pub mod tab;
pub mod timer;
pub mod watch;

use std::error::Error;
use std::sync::Arc;

use focusward_core::{
    Clock, Config, Database, FocusService, Hook, Plugin, Store, SystemClock, WakeQueue,
};
use serde::Serialize;

pub type CliResult<T = ()> = Result<T, Box<dyn Error>>;

/// An opened, recovered service plus the wake-up queue it schedules into.
pub struct Context {
    pub service: FocusService,
    pub queue: Arc<WakeQueue>,
}

/// Open the store and config, wire the service and reconcile the timer.
///
/// Every CLI invocation is a cold start, so `recover` always runs first.
pub fn open() -> CliResult<Context> {
    let config = Config::load()?;
    let store: Arc<dyn Store> = Arc::new(Database::open()?);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let queue = Arc::new(WakeQueue::new(clock.clone()));
    let service = FocusService::new(store, queue.clone(), clock, &config);
    service.bus().register(event_log_plugin());
    service.recover();
    Ok(Context { service, queue })
}

/// Built-in plugin that mirrors every event into the debug log.
fn event_log_plugin() -> Plugin {
    Hook::ALL
        .iter()
        .fold(Plugin::new("event-log", env!("CARGO_PKG_VERSION")), |plugin, hook| {
            plugin.on(hook.as_str(), |event| {
                tracing::debug!(?event, "event");
                Ok(())
            })
        })
}

pub fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
