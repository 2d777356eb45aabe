use std::collections::HashMap;
use std::time::Instant;

use chromiumoxide::Page;
use chromiumoxide_cdp::cdp::browser_protocol::browser::BrowserContextId;

/// A single outstanding context, as tracked by the registry. Dropped from
/// the map the instant it is released (explicitly or by the reaper) — there
/// is no tombstone, so a second release of the same id simply finds nothing
/// and is reported as `UnknownContext`.
#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub id: String,
    pub browser_id: u64,
    pub browser_context_id: BrowserContextId,
    pub acquired_at: Instant,
    pub deadline: Instant,
}

/// What a successful acquisition yields: the context id the caller should
/// use for `release_context`, plus the first page opened within it.
pub struct AcquiredContext {
    pub context_id: String,
    pub page: Page,
}

/// The index of live contexts keyed by context id, plus the monotonic
/// sequence counter that makes ids unique for the process lifetime.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    contexts: HashMap<String, ContextEntry>,
    next_seq: u64,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a fresh id of the form `context-<browser id>-<seq>` and
    /// register the entry under it.
    pub fn register(
        &mut self,
        browser_id: u64,
        browser_context_id: BrowserContextId,
        deadline: Instant,
    ) -> ContextEntry {
        let seq = self.next_seq;
        self.next_seq += 1;
        let id = format!("context-{browser_id}-{seq}");
        let entry = ContextEntry {
            id: id.clone(),
            browser_id,
            browser_context_id,
            acquired_at: Instant::now(),
            deadline,
        };
        self.contexts.insert(id, entry.clone());
        entry
    }

    /// Remove and return the entry for `context_id`, if any is still live.
    pub fn take(&mut self, context_id: &str) -> Option<ContextEntry> {
        self.contexts.remove(context_id)
    }

    pub fn get(&self, context_id: &str) -> Option<&ContextEntry> {
        self.contexts.get(context_id)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Ids of every entry whose deadline has already passed.
    pub fn expired(&self, now: Instant) -> Vec<String> {
        self.contexts
            .values()
            .filter(|entry| entry.deadline <= now)
            .map(|entry| entry.id.clone())
            .collect()
    }

    /// Ids of every entry whose registration predates `now - max_age` —
    /// used only by the health check as a watchdog on the reaper, never to
    /// drive reclamation directly.
    pub fn older_than(&self, now: Instant, max_age: std::time::Duration) -> Vec<String> {
        self.contexts
            .values()
            .filter(|entry| now.duration_since(entry.acquired_at) > max_age)
            .map(|entry| entry.id.clone())
            .collect()
    }

    pub fn remove_all_for_browser(&mut self, browser_id: u64) -> Vec<ContextEntry> {
        let ids: Vec<String> = self
            .contexts
            .values()
            .filter(|entry| entry.browser_id == browser_id)
            .map(|entry| entry.id.clone())
            .collect();
        ids.into_iter()
            .filter_map(|id| self.contexts.remove(&id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn dummy_context_id() -> BrowserContextId {
        BrowserContextId::from("ctx-test".to_string())
    }

    #[test]
    fn ids_are_unique_and_ordered() {
        let mut registry = ContextRegistry::new();
        let now = Instant::now();
        let a = registry.register(1, dummy_context_id(), now);
        let b = registry.register(1, dummy_context_id(), now);
        assert_ne!(a.id, b.id);
        assert_eq!(a.id, "context-1-0");
        assert_eq!(b.id, "context-1-1");
    }

    #[test]
    fn take_is_single_use() {
        let mut registry = ContextRegistry::new();
        let entry = registry.register(1, dummy_context_id(), Instant::now());
        assert!(registry.take(&entry.id).is_some());
        assert!(registry.take(&entry.id).is_none());
    }

    #[test]
    fn expired_lists_only_past_deadline_entries() {
        let mut registry = ContextRegistry::new();
        let now = Instant::now();
        let past = now.checked_sub(Duration::from_secs(1)).unwrap();
        let future = now + Duration::from_secs(60);
        let expired_entry = registry.register(1, dummy_context_id(), past);
        let live_entry = registry.register(1, dummy_context_id(), future);
        let expired_ids = registry.expired(now);
        assert!(expired_ids.contains(&expired_entry.id));
        assert!(!expired_ids.contains(&live_entry.id));
    }
}
