use std::collections::BTreeMap;

use focusward_core::Hook;
use serde_json::json;

use super::{open, print_json, CliResult};

pub fn run() -> CliResult {
    let ctx = open()?;
    let bus = ctx.service.bus();
    let handlers: BTreeMap<&str, usize> = Hook::ALL
        .iter()
        .map(|hook| (hook.as_str(), bus.handler_count(*hook)))
        .collect();
    print_json(&json!({
        "plugins": bus.plugins(),
        "handlers": handlers,
    }))
}
