use serde::{Deserialize, Serialize};

/// A viewport size and device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
}

/// The WebGL vendor/renderer pair a profile reports through
/// `getParameter(UNMASKED_VENDOR_WEBGL)` / `getParameter(UNMASKED_RENDERER_WEBGL)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebGlIdentity {
    pub vendor: &'static str,
    pub renderer: &'static str,
}

/// A fully resolved, immutable fingerprint for one browsing context.
///
/// Everything a caller needs to make a context look like an ordinary browser:
/// the identity fields applied to the context at creation time, the headers
/// sent on every request, and the init script run before any page script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StealthProfile {
    pub user_agent: String,
    pub viewport: Viewport,
    pub locale: String,
    pub timezone: String,
    pub webgl: WebGlIdentity,
    pub extra_headers: Vec<(String, String)>,
}

/// Per-request overrides layered onto a generated [`StealthProfile`]: a base
/// value with `Option<T>` fields callers can punch holes in, rather than a
/// builder type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    pub user_agent: Option<String>,
    pub viewport: Option<Viewport>,
    pub locale: Option<String>,
    pub timezone: Option<String>,
    pub webgl: Option<WebGlIdentity>,
    pub extra_headers: Option<Vec<(String, String)>>,
}

impl StealthProfile {
    /// Apply a fresh jitter to a base viewport: ±5% on each axis
    /// independently, rounded to the nearest pixel.
    pub(crate) fn jitter_viewport(base: Viewport, sign_w: i32, sign_h: i32, pct_w: f64, pct_h: f64) -> Viewport {
        let dw = (base.width as f64 * pct_w * 0.05) as i64 * sign_w as i64;
        let dh = (base.height as f64 * pct_h * 0.05) as i64 * sign_h as i64;
        Viewport {
            width: (base.width as i64 + dw).max(1) as u32,
            height: (base.height as i64 + dh).max(1) as u32,
            device_scale_factor: base.device_scale_factor,
        }
    }
}
