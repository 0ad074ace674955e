//! Distraction tracking.
//!
//! At most one distraction interval is open at a time. It is persisted
//! under [`StoreKey::DistractionInterval`] so a restart between entering
//! and leaving a distracting site still credits the elapsed time.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::clock::Clock;
use crate::error::{Result, ValidationError};
use crate::events::{Event, EventBus, TabId};
use crate::session::SessionManager;
use crate::storage::{Store, StoreExt, StoreKey};

/// Normalize a user-entered site to a bare lowercase host.
///
/// Accepts `"https://www.YouTube.com/feed"`, `"reddit.com"` and the like.
/// Returns `None` when no host can be extracted.
pub fn normalize_site(raw: &str) -> Option<String> {
    let trimmed = raw.trim().to_lowercase();
    if trimmed.is_empty() {
        return None;
    }
    let host = host_of(&trimmed)?;
    let valid = !host.starts_with('.')
        && !host.ends_with('.')
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    valid.then_some(host)
}

/// Host of `url` with any leading `www.` removed. URLs without a scheme
/// are read as `https`.
pub fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url)
        .ok()
        .filter(|u| u.host_str().is_some())
        .or_else(|| Url::parse(&format!("https://{}", url.trim())).ok())?;
    let host = parsed.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    (!host.is_empty()).then_some(host)
}

/// The entry of `sites` that `url` falls under, if any.
///
/// A host matches a site when it equals it or is a subdomain of it.
pub fn matching_site<'a>(url: &str, sites: &'a [String]) -> Option<&'a str> {
    let host = host_of(url)?;
    sites
        .iter()
        .map(String::as_str)
        .find(|site| host == *site || host.ends_with(&format!(".{site}")))
}

pub fn is_distracting(url: &str, sites: &[String]) -> bool {
    matching_site(url, sites).is_some()
}

/// The currently open distraction interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInterval {
    /// Epoch milliseconds.
    pub start: i64,
    pub tab_id: TabId,
    pub domain: String,
}

pub struct DistractionTracker {
    store: Arc<dyn Store>,
    bus: Arc<EventBus>,
    clock: Arc<dyn Clock>,
    sessions: Arc<SessionManager>,
    default_sites: Vec<String>,
}

impl std::fmt::Debug for DistractionTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DistractionTracker")
            .field("default_sites", &self.default_sites)
            .finish_non_exhaustive()
    }
}

impl DistractionTracker {
    pub fn new(
        store: Arc<dyn Store>,
        bus: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        sessions: Arc<SessionManager>,
        default_sites: &[String],
    ) -> Self {
        let mut defaults: Vec<String> = Vec::new();
        for site in default_sites.iter().filter_map(|s| normalize_site(s)) {
            if !defaults.contains(&site) {
                defaults.push(site);
            }
        }
        Self {
            store,
            bus,
            clock,
            sessions,
            default_sites: defaults,
        }
    }

    // ── Intervals ────────────────────────────────────────────────────

    pub fn open_interval(&self) -> Result<Option<OpenInterval>> {
        self.store.get(StoreKey::DistractionInterval, None)
    }

    /// Open an interval on `domain` for `tab_id`, closing any open one.
    ///
    /// Returns `false` without opening anything when no session is active.
    pub fn enter(&self, tab_id: TabId, domain: &str) -> Result<bool> {
        self.leave()?;
        if !self.sessions.record_distraction_visit(domain)? {
            tracing::debug!(domain, "no active session, distraction ignored");
            return Ok(false);
        }
        let interval = OpenInterval {
            start: self.clock.now_ms(),
            tab_id,
            domain: domain.to_string(),
        };
        self.store.set(StoreKey::DistractionInterval, &Some(interval))?;
        tracing::debug!(domain, tab_id, "distraction interval opened");
        self.bus.emit(&Event::Distraction {
            domain: domain.to_string(),
            tab_id,
        });
        Ok(true)
    }

    /// Close the open interval and credit its length to the session.
    ///
    /// Returns the seconds credited, or `None` when nothing was open.
    pub fn leave(&self) -> Result<Option<u64>> {
        self.leave_until(self.clock.now_ms())
    }

    /// Like [`leave`](Self::leave), but time past `until_ms` is not credited.
    pub fn leave_until(&self, until_ms: i64) -> Result<Option<u64>> {
        if self.open_interval()?.is_none() {
            return Ok(None);
        }
        let taken = self
            .store
            .update(StoreKey::DistractionInterval, None::<OpenInterval>, Option::take)?;
        let Some(interval) = taken else {
            return Ok(None);
        };
        let end = self.clock.now_ms().min(until_ms);
        let delta = end.saturating_sub(interval.start).max(0);
        let secs = u64::try_from(delta.saturating_add(500) / 1000).unwrap_or(0);
        self.sessions.add_distraction_seconds(secs)?;
        tracing::debug!(domain = %interval.domain, secs, "distraction interval closed");
        Ok(Some(secs))
    }

    /// React to `tab_id` loading `url`.
    ///
    /// The interval stays open while the tab stays on the same distracting
    /// host. Anything else closes it, and a distracting destination opens a
    /// new one. Returns whether an interval is open afterwards.
    pub fn handle_navigation(&self, tab_id: TabId, url: &str) -> Result<bool> {
        let target = self.check(url)?;
        if let (Some(open), Some(domain)) = (self.open_interval()?, target.as_deref()) {
            if open.tab_id == tab_id && open.domain == domain {
                return Ok(true);
            }
        }
        self.leave()?;
        match target {
            Some(domain) => self.enter(tab_id, &domain),
            None => Ok(false),
        }
    }

    /// Host of `url` when it is on the distraction list.
    pub fn check(&self, url: &str) -> Result<Option<String>> {
        let sites = self.sites()?;
        Ok(matching_site(url, &sites).and_then(|_| host_of(url)))
    }

    // ── Site list ────────────────────────────────────────────────────

    /// The stored site list, seeded from the configured defaults the
    /// first time it is read.
    pub fn sites(&self) -> Result<Vec<String>> {
        self.store.update(StoreKey::DistractionSiteList, None::<Vec<String>>, |slot| {
            slot.get_or_insert_with(|| self.default_sites.clone()).clone()
        })
    }

    pub fn add_site(&self, raw: &str) -> Result<Vec<String>> {
        let site = normalize_site(raw).ok_or_else(|| ValidationError::InvalidDomain(raw.to_string()))?;
        let defaults = self.default_sites.clone();
        self.store.update(StoreKey::DistractionSiteList, None::<Vec<String>>, |slot| {
            let list = slot.get_or_insert(defaults);
            if list.contains(&site) {
                tracing::debug!(site = %site, "site already listed");
            } else {
                tracing::info!(site = %site, "site added");
                list.push(site);
            }
            list.clone()
        })
    }

    pub fn remove_site(&self, raw: &str) -> Result<Vec<String>> {
        let site = normalize_site(raw).unwrap_or_else(|| raw.trim().to_lowercase());
        let defaults = self.default_sites.clone();
        self.store.update(StoreKey::DistractionSiteList, None::<Vec<String>>, |slot| {
            let list = slot.get_or_insert(defaults);
            list.retain(|s| *s != site);
            list.clone()
        })
    }
}
