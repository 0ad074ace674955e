//! Lifecycle events and the synchronous event bus.
//!
//! Every observable state change produces an [`Event`]. Each event belongs
//! to exactly one [`Hook`]; handlers subscribe per hook, either as part of
//! a named [`Plugin`] or as internal subscribers holding a
//! [`SubscriptionToken`].
//!
//! Dispatch is synchronous and ordered by registration. A handler that
//! returns an error or panics is logged with its owner and hook, and the
//! remaining handlers still run. Failures never reach the emitter.

use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::scoring::QualityLabel;
use crate::session::Session;

// Handler isolation relies on unwinding.
#[cfg(panic = "abort")]
compile_error!("focusward-core must be built with panic = \"unwind\"");

/// Browser tab identifier as delivered by the host.
pub type TabId = i64;

/// The closed set of lifecycle hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Hook {
    SessionStart,
    SessionEnd,
    Distraction,
    ScoreCalculated,
    ReflectionSaved,
    FocusModeEnabled,
    FocusModeDisabled,
    Tick,
}

impl Hook {
    pub const ALL: [Hook; 8] = [
        Hook::SessionStart,
        Hook::SessionEnd,
        Hook::Distraction,
        Hook::ScoreCalculated,
        Hook::ReflectionSaved,
        Hook::FocusModeEnabled,
        Hook::FocusModeDisabled,
        Hook::Tick,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Hook::SessionStart => "session-start",
            Hook::SessionEnd => "session-end",
            Hook::Distraction => "distraction",
            Hook::ScoreCalculated => "score-calculated",
            Hook::ReflectionSaved => "reflection-saved",
            Hook::FocusModeEnabled => "focus-mode-enabled",
            Hook::FocusModeDisabled => "focus-mode-disabled",
            Hook::Tick => "tick",
        }
    }
}

impl std::fmt::Display for Hook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a hook name is not part of [`Hook::ALL`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown hook '{0}'")]
pub struct UnknownHook(pub String);

impl FromStr for Hook {
    type Err = UnknownHook;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hook::ALL
            .into_iter()
            .find(|hook| hook.as_str() == s)
            .ok_or_else(|| UnknownHook(s.to_string()))
    }
}

/// Payload delivered to hook handlers. One variant per [`Hook`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Event {
    SessionStart {
        session_id: String,
        duration: u64,
        start_time: i64,
    },
    /// Carries the finalized session.
    SessionEnd {
        session: Session,
    },
    Distraction {
        domain: String,
        tab_id: TabId,
    },
    ScoreCalculated {
        session_id: String,
        score: u8,
        quality_label: QualityLabel,
    },
    ReflectionSaved {
        session_id: String,
        text: String,
    },
    FocusModeEnabled {
        session_id: String,
    },
    FocusModeDisabled,
    Tick {
        remaining: u64,
    },
}

impl Event {
    pub fn hook(&self) -> Hook {
        match self {
            Event::SessionStart { .. } => Hook::SessionStart,
            Event::SessionEnd { .. } => Hook::SessionEnd,
            Event::Distraction { .. } => Hook::Distraction,
            Event::ScoreCalculated { .. } => Hook::ScoreCalculated,
            Event::ReflectionSaved { .. } => Hook::ReflectionSaved,
            Event::FocusModeEnabled { .. } => Hook::FocusModeEnabled,
            Event::FocusModeDisabled => Hook::FocusModeDisabled,
            Event::Tick { .. } => Hook::Tick,
        }
    }
}

/// Error a handler may report. Logged by the bus, never propagated.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A hook handler.
pub type Handler = Arc<dyn Fn(&Event) -> Result<(), HandlerError> + Send + Sync>;

/// Third-party observer: a name, a version and handlers keyed by hook name.
///
/// Hook names are plain strings because plugin descriptors come from
/// outside the crate; names outside [`Hook::ALL`] are skipped at
/// registration.
#[derive(Clone)]
pub struct Plugin {
    pub name: String,
    pub version: String,
    pub hooks: Vec<(String, Handler)>,
}

impl Plugin {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            hooks: Vec::new(),
        }
    }

    /// Builder-style handler registration.
    pub fn on<F>(mut self, hook: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.hooks.push((hook.into(), Arc::new(handler)));
        self
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("hooks", &self.hooks.iter().map(|(h, _)| h.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

/// Public view of a registered plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub hooks: Vec<Hook>,
}

/// Handle for removing an internal subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionToken(u64);

const INTERNAL_OWNER: &str = "internal";

struct Subscription {
    token: SubscriptionToken,
    owner: String,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_token: u64,
    handlers: HashMap<Hook, Vec<Subscription>>,
    plugins: BTreeMap<String, PluginInfo>,
}

impl Registry {
    fn push(&mut self, hook: Hook, owner: &str, handler: Handler) -> SubscriptionToken {
        self.next_token += 1;
        let token = SubscriptionToken(self.next_token);
        self.handlers.entry(hook).or_default().push(Subscription {
            token,
            owner: owner.to_string(),
            handler,
        });
        token
    }
}

/// Synchronous hook registry.
#[derive(Default)]
pub struct EventBus {
    registry: RwLock<Registry>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("plugins", &self.plugins())
            .finish_non_exhaustive()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. Returns `false` when the descriptor is missing
    /// a name or version, or a plugin with that name already exists.
    pub fn register(&self, plugin: Plugin) -> bool {
        let name = plugin.name.trim().to_string();
        let version = plugin.version.trim().to_string();
        if name.is_empty() || version.is_empty() {
            tracing::warn!(plugin = %plugin.name, "plugin rejected: name and version are required");
            return false;
        }

        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        if name == INTERNAL_OWNER || registry.plugins.contains_key(&name) {
            tracing::warn!(plugin = %name, "plugin rejected: name already taken");
            return false;
        }

        let mut hooks = Vec::new();
        for (hook_name, handler) in plugin.hooks {
            match hook_name.parse::<Hook>() {
                Ok(hook) => {
                    registry.push(hook, &name, handler);
                    hooks.push(hook);
                }
                Err(e) => {
                    tracing::warn!(plugin = %name, error = %e, "skipping handler for unknown hook");
                }
            }
        }

        tracing::info!(plugin = %name, version = %version, hooks = hooks.len(), "plugin registered");
        registry.plugins.insert(
            name.clone(),
            PluginInfo {
                name,
                version,
                hooks,
            },
        );
        true
    }

    /// Remove a plugin and all of its handlers.
    pub fn unregister(&self, name: &str) -> bool {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        if registry.plugins.remove(name).is_none() {
            return false;
        }
        for subscriptions in registry.handlers.values_mut() {
            subscriptions.retain(|s| s.owner != name);
        }
        true
    }

    /// Subscribe an internal handler.
    pub fn on<F>(&self, hook: Hook, handler: F) -> SubscriptionToken
    where
        F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        registry.push(hook, INTERNAL_OWNER, Arc::new(handler))
    }

    /// Remove an internal subscription. Returns `false` for unknown tokens.
    pub fn off(&self, token: SubscriptionToken) -> bool {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let mut removed = false;
        for subscriptions in registry.handlers.values_mut() {
            let before = subscriptions.len();
            subscriptions.retain(|s| s.token != token);
            removed |= subscriptions.len() != before;
        }
        removed
    }

    /// Dispatch `event` to every handler of its hook, in registration
    /// order. Returns the number of handlers invoked.
    pub fn emit(&self, event: &Event) -> usize {
        let hook = event.hook();
        // Snapshot so handlers can (un)subscribe or emit without deadlocking.
        let targets: Vec<(String, Handler)> = {
            let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
            registry
                .handlers
                .get(&hook)
                .map(|subs| {
                    subs.iter()
                        .map(|s| (s.owner.clone(), Arc::clone(&s.handler)))
                        .collect()
                })
                .unwrap_or_default()
        };

        for (owner, handler) in &targets {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(plugin = %owner, hook = %hook, error = %e, "hook handler failed");
                }
                Err(panic) => {
                    let message = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    tracing::error!(plugin = %owner, hook = %hook, panic = %message, "hook handler panicked");
                }
            }
        }
        targets.len()
    }

    /// Registered plugins, sorted by name.
    pub fn plugins(&self) -> Vec<PluginInfo> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry.plugins.values().cloned().collect()
    }

    /// Number of handlers currently subscribed to `hook`.
    pub fn handler_count(&self, hook: Hook) -> usize {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry.handlers.get(&hook).map(Vec::len).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Handler) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let make = {
            let log = Arc::clone(&log);
            move |tag: &str| -> Handler {
                let log = Arc::clone(&log);
                let tag = tag.to_string();
                Arc::new(move |_event: &Event| {
                    log.lock().unwrap().push(tag.clone());
                    Ok::<(), HandlerError>(())
                })
            }
        };
        (log, make)
    }

    #[test]
    fn hook_names_round_trip() {
        for hook in Hook::ALL {
            assert_eq!(hook.as_str().parse::<Hook>().unwrap(), hook);
        }
        assert!("session-paused".parse::<Hook>().is_err());
    }

    #[test]
    fn event_serializes_with_kebab_type_and_camel_fields() {
        let json = serde_json::to_value(Event::Distraction {
            domain: "reddit.com".into(),
            tab_id: 7,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "distraction", "domain": "reddit.com", "tabId": 7})
        );
    }

    #[test]
    fn register_rejects_duplicates_and_missing_fields() {
        let bus = EventBus::new();
        assert!(bus.register(Plugin::new("logger", "1.0")));
        assert!(!bus.register(Plugin::new("logger", "2.0")));
        assert!(!bus.register(Plugin::new("", "1.0")));
        assert!(!bus.register(Plugin::new("nameless-version", "  ")));
        assert_eq!(bus.plugins().len(), 1);
    }

    #[test]
    fn unknown_hooks_are_skipped_not_fatal() {
        let bus = EventBus::new();
        let plugin = Plugin::new("p", "0.1")
            .on("tick", |_| Ok(()))
            .on("session-paused", |_| Ok(()));
        assert!(bus.register(plugin));
        assert_eq!(bus.plugins()[0].hooks, vec![Hook::Tick]);
        assert_eq!(bus.handler_count(Hook::Tick), 1);
    }

    #[test]
    fn emit_runs_in_registration_order_and_counts() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.on(Hook::Tick, {
            let h = make("first");
            move |e| h(e)
        });
        let mut plugin = Plugin::new("second", "1");
        plugin.hooks.push(("tick".into(), make("second")));
        bus.register(plugin);
        bus.on(Hook::Tick, {
            let h = make("third");
            move |e| h(e)
        });

        assert_eq!(bus.emit(&Event::Tick { remaining: 10 }), 3);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
        assert_eq!(bus.emit(&Event::FocusModeDisabled), 0);
    }

    #[test]
    fn failing_handlers_are_isolated() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        bus.register(Plugin::new("erring", "1").on("session-end", |_| Err("nope".into())));
        bus.register(Plugin::new("panicking", "1").on("session-end", |_| panic!("handler blew up")));
        let mut ok = Plugin::new("ok", "1");
        ok.hooks.push(("session-end".into(), make("ok")));
        bus.register(ok);

        let event = Event::SessionEnd {
            session: Session::new("s1".into(), 1_000, 60),
        };
        assert_eq!(bus.emit(&event), 3);
        assert_eq!(*log.lock().unwrap(), vec!["ok"]);
    }

    #[test]
    fn release_profile_keeps_unwinding() {
        let manifest = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/../../Cargo.toml"))
            .unwrap();
        let workspace: toml::Value = toml::from_str(&manifest).unwrap();
        let release_panic = workspace
            .get("profile")
            .and_then(|p| p.get("release"))
            .and_then(|r| r.get("panic"))
            .and_then(toml::Value::as_str);
        assert_ne!(release_panic, Some("abort"));
    }

    #[test]
    fn off_and_unregister_remove_handlers() {
        let bus = EventBus::new();
        let token = bus.on(Hook::Tick, |_| Ok(()));
        bus.register(Plugin::new("p", "1").on("tick", |_| Ok(())));
        assert_eq!(bus.handler_count(Hook::Tick), 2);

        assert!(bus.off(token));
        assert!(!bus.off(token));
        assert!(bus.unregister("p"));
        assert!(!bus.unregister("p"));
        assert_eq!(bus.emit(&Event::Tick { remaining: 0 }), 0);
    }

    #[test]
    fn handlers_may_subscribe_during_dispatch() {
        let bus = Arc::new(EventBus::new());
        let inner = Arc::clone(&bus);
        bus.on(Hook::Tick, move |_| {
            inner.on(Hook::Tick, |_| Ok(()));
            Ok(())
        });
        assert_eq!(bus.emit(&Event::Tick { remaining: 1 }), 1);
        assert_eq!(bus.emit(&Event::Tick { remaining: 1 }), 2);
    }
}
