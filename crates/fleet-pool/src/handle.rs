use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::Instant;

use anyhow::Context;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use chromiumoxide_cdp::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide_cdp::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::PoolConfig;
use crate::error::PoolError;

/// Fixed browser launch arguments: a Docker-friendly, automation-hardened
/// flag set. Not configurable because the pool's own stealth and resource
/// guarantees depend on them.
const LAUNCH_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-gpu",
    "--disable-blink-features=AutomationControlled",
    "--disable-web-security",
    "--disable-extensions",
    "--disable-default-apps",
    "--disable-sync",
    "--disable-translate",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-renderer-backgrounding",
    "--memory-pressure-off",
    "--no-first-run",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Ready,
    Draining,
    Dead,
}

impl HandleState {
    fn to_u8(self) -> u8 {
        match self {
            HandleState::Ready => 0,
            HandleState::Draining => 1,
            HandleState::Dead => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => HandleState::Ready,
            1 => HandleState::Draining,
            _ => HandleState::Dead,
        }
    }
}

/// A single CDP browser context opened on a handle's underlying process.
pub struct OpenContext {
    pub browser_context_id: BrowserContextId,
    pub page: Page,
}

/// Supervises one headless browser process and the contexts opened on it.
///
/// Owns a unique temp profile directory (the underlying Chrome process
/// refuses to share a `SingletonLock` across processes, so every handle
/// needs its own `--user-data-dir` even though contexts within one handle
/// are multiplexed over a single process), a background task draining the
/// CDP event handler, and a running tally of lifetime usage.
///
/// Every mutable field is a plain atomic rather than hidden behind a mutex:
/// `chromiumoxide`'s `Browser` is itself safe to drive concurrently from
/// many tasks (that concurrency is the entire point of using spider_chrome's
/// high-throughput CDP client), so a handle can serve several `open_context`
/// calls in flight at once without the pool's coarse lock ever being held
/// across an await.
pub struct BrowserHandle {
    pub id: u64,
    browser: Browser,
    _handler_task: JoinHandle<()>,
    _temp_dir: TempDir,
    pub created_at: Instant,
    usage_count: AtomicU64,
    active_count: AtomicU32,
    consecutive_open_failures: AtomicU32,
    state: AtomicU8,
}

impl std::fmt::Debug for BrowserHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrowserHandle")
            .field("id", &self.id)
            .field("created_at", &self.created_at)
            .field("usage_count", &self.usage_count.load(Ordering::Relaxed))
            .field("active_count", &self.active_count.load(Ordering::Relaxed))
            .field("state", &self.state())
            .finish()
    }
}

impl BrowserHandle {
    /// Launch the underlying process. The temp-dir/config/launch sequence is
    /// composed internally with `anyhow` (each step's failure reason matters
    /// only as a string for the log line and the one `BrowserLaunchFailed`
    /// the caller sees); `anyhow::Error` never crosses this function's
    /// boundary.
    pub async fn launch(id: u64, config: &PoolConfig) -> Result<Self, PoolError> {
        Self::launch_inner(id, config)
            .await
            .map_err(|e| PoolError::BrowserLaunchFailed { reason: e.to_string() })
    }

    async fn launch_inner(id: u64, config: &PoolConfig) -> anyhow::Result<Self> {
        let temp_dir = TempDir::new().context("failed to create temp profile dir")?;

        let mut builder = BrowserConfig::builder()
            .args(LAUNCH_ARGS.iter().map(|s| s.to_string()))
            .user_data_dir(temp_dir.path());
        if !config.headless {
            builder = builder.with_head();
        }
        let browser_config = builder.build().map_err(|e| anyhow::anyhow!("invalid browser config: {e}"))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("failed to launch browser process")?;

        let handler_task = tokio::spawn(async move {
            use futures::StreamExt;
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    warn!(error = %err, "browser handler event error");
                }
            }
        });

        debug!(browser_id = id, "browser handle launched");

        Ok(Self {
            id,
            browser,
            _handler_task: handler_task,
            _temp_dir: temp_dir,
            created_at: Instant::now(),
            usage_count: AtomicU64::new(0),
            active_count: AtomicU32::new(0),
            consecutive_open_failures: AtomicU32::new(0),
            state: AtomicU8::new(HandleState::Ready.to_u8()),
        })
    }

    pub fn state(&self) -> HandleState {
        HandleState::from_u8(self.state.load(Ordering::Relaxed))
    }

    pub fn active_count(&self) -> u32 {
        self.active_count.load(Ordering::Relaxed)
    }

    pub fn usage_count(&self) -> u64 {
        self.usage_count.load(Ordering::Relaxed)
    }

    pub fn has_capacity(&self, max_contexts_per_browser: usize) -> bool {
        self.state() == HandleState::Ready
            && (self.active_count() as usize) < max_contexts_per_browser
    }

    /// Reserve a slot before doing any I/O, so a concurrent selection scan
    /// sees this handle as one context fuller immediately rather than after
    /// the (potentially slow) context-open round trip completes.
    pub(crate) fn reserve_slot(&self) {
        self.active_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Undo a reservation that did not pan out (the open itself failed).
    pub(crate) fn release_slot(&self) {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
    }

    /// Open a new isolated browsing context and a first page within it,
    /// injecting the stealth init script before the page can run any script
    /// of its own. The caller must have already called [`reserve_slot`] for
    /// this handle before entering this method.
    pub async fn open_context(&self, init_script: &str) -> Result<OpenContext, PoolError> {
        let create_context = self
            .browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| {
                self.record_open_failure();
                PoolError::ContextOpenFailed {
                    browser_id: self.id,
                    reason: e.to_string(),
                }
            })?;
        let browser_context_id = create_context.result.browser_context_id;

        let target_params = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(browser_context_id.clone())
            .build()
            .map_err(|e| PoolError::ContextOpenFailed {
                browser_id: self.id,
                reason: e,
            })?;

        let target_id = self.browser.execute(target_params).await.map_err(|e| {
            self.record_open_failure();
            PoolError::ContextOpenFailed {
                browser_id: self.id,
                reason: e.to_string(),
            }
        })?;

        let page = self
            .browser
            .get_page(target_id.result.target_id)
            .await
            .map_err(|e| {
                self.record_open_failure();
                PoolError::ContextOpenFailed {
                    browser_id: self.id,
                    reason: e.to_string(),
                }
            })?;

        if let Err(e) = page.evaluate_on_new_document(init_script).await {
            warn!(browser_id = self.id, error = %e, "failed to inject stealth init script");
        }

        self.consecutive_open_failures.store(0, Ordering::Relaxed);
        self.usage_count.fetch_add(1, Ordering::Relaxed);

        Ok(OpenContext {
            browser_context_id,
            page,
        })
    }

    /// Best-effort close; errors are logged, never propagated, matching the
    /// "release never fails once the id is recognized" contract.
    pub async fn close_context(&self, browser_context_id: BrowserContextId) {
        if let Err(e) = self
            .browser
            .execute(DisposeBrowserContextParams::new(browser_context_id))
            .await
        {
            warn!(browser_id = self.id, error = %e, "failed to dispose browser context");
        }
        self.active_count.fetch_sub(1, Ordering::Relaxed);
    }

    fn record_open_failure(&self) {
        self.release_slot();
        let failures = self.consecutive_open_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= 2 {
            self.drain();
        }
    }

    pub fn drain(&self) {
        if self.state() == HandleState::Ready {
            warn!(browser_id = self.id, "handle draining");
            self.state.store(HandleState::Draining.to_u8(), Ordering::Relaxed);
        }
    }

    pub fn mark_dead(&self) {
        self.state.store(HandleState::Dead.to_u8(), Ordering::Relaxed);
    }

    pub async fn shutdown(&self) {
        self.mark_dead();
        if let Err(e) = self.browser.close().await {
            error!(browser_id = self.id, error = %e, "error closing browser on shutdown");
        }
    }

    /// True once the underlying CDP connection has disconnected — used by
    /// the reaper to detect crashes between sweeps.
    pub async fn is_connected(&self) -> bool {
        tokio::time::timeout(std::time::Duration::from_millis(500), self.browser.pages())
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn launch_args_disable_automation_controlled_flag() {
        assert!(LAUNCH_ARGS.contains(&"--disable-blink-features=AutomationControlled"));
    }

    #[test]
    fn launch_args_are_headless_friendly() {
        assert!(LAUNCH_ARGS.contains(&"--no-sandbox"));
        assert!(LAUNCH_ARGS.contains(&"--disable-dev-shm-usage"));
    }

    #[test]
    fn handle_state_roundtrips_through_u8() {
        for state in [HandleState::Ready, HandleState::Draining, HandleState::Dead] {
            assert_eq!(HandleState::from_u8(state.to_u8()), state);
        }
    }
}
