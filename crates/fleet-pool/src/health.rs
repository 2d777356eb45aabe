use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::PoolConfig;
use crate::handle::{BrowserHandle, HandleState};
use crate::registry::ContextRegistry;

/// Read-only snapshot of pool state for observability endpoints.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PoolStats {
    pub total_browsers: usize,
    pub active_browsers: usize,
    pub total_contexts: usize,
    pub active_contexts: usize,
    pub average_contexts_per_browser: f64,
    pub oldest_browser_age: Duration,
    pub total_usage_count: u64,
}

/// Result of `check_health`: whether the pool looks sane plus any specific
/// violations found.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HealthReport {
    pub healthy: bool,
    pub issues: Vec<String>,
    pub stats: PoolStats,
}

pub(crate) fn compute_stats(handles: &[Arc<BrowserHandle>], registry: &ContextRegistry) -> PoolStats {
    let now = Instant::now();
    let total_browsers = handles.len();
    let active_browsers = handles
        .iter()
        .filter(|h| h.state() == HandleState::Ready)
        .count();
    let total_contexts = registry.len();
    let oldest_browser_age = handles
        .iter()
        .map(|h| now.duration_since(h.created_at))
        .max()
        .unwrap_or_default();
    let total_usage_count = handles.iter().map(|h| h.usage_count()).sum();
    let average_contexts_per_browser = if total_browsers == 0 {
        0.0
    } else {
        total_contexts as f64 / total_browsers as f64
    };

    PoolStats {
        total_browsers,
        active_browsers,
        total_contexts,
        active_contexts: total_contexts,
        average_contexts_per_browser,
        oldest_browser_age,
        total_usage_count,
    }
}

/// A pool is healthy iff no context has outlived `2 * context_timeout`
/// (which, with a functioning reaper, should never happen — this is a
/// watchdog on the reaper, not a reclamation trigger), no handle has
/// outlived `max_browser_age`, and the pool can still serve at least one
/// more acquisition (it already has a handle, or `max_browsers` leaves room
/// to create one).
pub(crate) fn check_health(
    handles: &[Arc<BrowserHandle>],
    registry: &ContextRegistry,
    config: &PoolConfig,
) -> HealthReport {
    let now = Instant::now();
    let mut issues = Vec::new();

    let stuck_contexts = registry.older_than(now, config.context_timeout * 2);
    for context_id in &stuck_contexts {
        issues.push(format!(
            "context {context_id} has outlived 2x the context timeout; reaper may be stalled"
        ));
    }

    for handle in handles {
        if now.duration_since(handle.created_at) > config.max_browser_age {
            issues.push(format!(
                "browser {} has exceeded max_browser_age",
                handle.id
            ));
        }
        if handle.state() == HandleState::Dead {
            issues.push(format!("browser {} is dead but still in the handle list", handle.id));
        }
    }

    if handles.is_empty() && config.max_browsers == 0 {
        issues.push("no browser handles exist and max_browsers is 0, so none can ever be created".to_string());
    }

    let stats = compute_stats(handles, registry);
    HealthReport {
        healthy: issues.is_empty(),
        issues,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_pool_with_room_to_grow_is_healthy() {
        let config = PoolConfig::default();
        let report = check_health(&[], &ContextRegistry::new(), &config);
        assert!(report.healthy);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn empty_pool_with_no_room_to_grow_is_unhealthy() {
        let config = PoolConfig {
            max_browsers: 0,
            ..Default::default()
        };
        let report = check_health(&[], &ContextRegistry::new(), &config);
        assert!(!report.healthy);
        assert_eq!(report.issues.len(), 1);
    }
}
