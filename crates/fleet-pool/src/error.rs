use thiserror::Error;

/// The public error taxonomy for every pool operation.
///
/// Internal helpers compose fallible steps with `anyhow::Result` and map
/// into one of these variants at the public boundary — callers never see a
/// bare `anyhow::Error`.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No browser handle had capacity, the handle cap was already reached,
    /// and the wait deadline elapsed before one freed up.
    #[error("pool exhausted: no context became available within the wait timeout")]
    PoolExhausted,

    /// The pool has begun or completed shutdown and rejects new work.
    #[error("pool is shutting down")]
    PoolShuttingDown,

    /// A new browser process failed to start.
    #[error("failed to launch browser process: {reason}")]
    BrowserLaunchFailed { reason: String },

    /// A browser handle could not open a new context.
    #[error("browser {browser_id} failed to open a context: {reason}")]
    ContextOpenFailed { browser_id: u64, reason: String },

    /// The caller supplied a context id that the registry has no record of
    /// (never issued, already released, or reclaimed by the reaper).
    #[error("unknown context id: {context_id}")]
    UnknownContext { context_id: String },

    /// The owning browser process crashed or disconnected.
    #[error("browser {browser_id} crashed")]
    BrowserCrashed { browser_id: u64 },

    /// The caller's cancellation signal fired before a slot became available.
    #[error("acquisition was cancelled before a context became available")]
    Cancelled,
}

pub type PoolResult<T> = Result<T, PoolError>;
