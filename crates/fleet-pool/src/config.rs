use std::time::Duration;

/// Tunables for a [`crate::PoolCoordinator`]. All fields have defaults that
/// match a single-node, moderate-traffic deployment; override only what a
/// specific deployment needs.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Hard cap on the number of browser processes the pool will run at once.
    pub max_browsers: usize,
    /// Hard cap on concurrently open contexts per browser process.
    pub max_contexts_per_browser: usize,
    /// A context not explicitly released within this duration is reclaimed
    /// by the reaper.
    pub context_timeout: Duration,
    /// How long `acquire_context` will suspend a caller when the pool is
    /// fully saturated before returning `PoolExhausted`.
    pub wait_timeout: Duration,
    /// A browser handle is torn down once its lifetime usage count reaches
    /// this value and it has no active contexts.
    pub recycle_uses: u64,
    /// Interval between reaper sweeps.
    pub reaper_interval: Duration,
    /// Used only by `check_health`: a handle older than this is reported as
    /// an issue. Not itself enforced by the reaper — recycling is driven by
    /// `recycle_uses`, not age.
    pub max_browser_age: Duration,
    /// Whether browsers are launched headless. Always `true` outside tests;
    /// exposed for integration tests that want to watch a real window.
    pub headless: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_browsers: 4,
            max_contexts_per_browser: 4,
            context_timeout: Duration::from_secs(30),
            wait_timeout: Duration::from_secs(5),
            recycle_uses: 50,
            reaper_interval: Duration::from_secs(10),
            max_browser_age: Duration::from_secs(30 * 60),
            headless: true,
        }
    }
}

/// Per-request overrides layered onto a generated stealth profile plus the
/// CDP-level context options that aren't part of a fingerprint.
#[derive(Debug, Clone, Default)]
pub struct ContextOverrides {
    pub profile: fleet_stealth::ProfileOverrides,
    pub is_mobile: bool,
    pub has_touch: bool,
    pub offline: bool,
    pub http_credentials: Option<HttpCredentials>,
    pub geolocation: Option<Geolocation>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct HttpCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy)]
pub struct Geolocation {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: f64,
}
