//! Static fingerprint allowlists.
//!
//! Kept small and hand-curated on purpose — a huge list of user agents drawn
//! from live traffic logs is a maintenance burden and doesn't meaningfully
//! improve evasion over a handful of current, plausible builds.

use crate::profile::{Viewport, WebGlIdentity};

pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
];

pub const VIEWPORTS: &[Viewport] = &[
    Viewport { width: 1920, height: 1080, device_scale_factor: 1.0 },
    Viewport { width: 1366, height: 768, device_scale_factor: 1.0 },
    Viewport { width: 1536, height: 864, device_scale_factor: 1.0 },
    Viewport { width: 1440, height: 900, device_scale_factor: 2.0 },
    Viewport { width: 1280, height: 720, device_scale_factor: 1.0 },
];

/// (locale, timezone) pairs, kept together so a generated profile never
/// claims an `en-US` locale with a `Europe/Berlin` timezone.
pub const LOCALE_TIMEZONES: &[(&str, &str)] = &[
    ("en-US", "America/New_York"),
    ("en-GB", "Europe/London"),
    ("de-DE", "Europe/Berlin"),
    ("fr-FR", "Europe/Paris"),
];

pub const WEBGL_IDENTITIES: &[WebGlIdentity] = &[
    WebGlIdentity { vendor: "Google Inc. (Intel)", renderer: "ANGLE (Intel, Intel(R) UHD Graphics 620 Direct3D11 vs_5_0 ps_5_0, D3D11)" },
    WebGlIdentity { vendor: "Google Inc. (NVIDIA)", renderer: "ANGLE (NVIDIA, NVIDIA GeForce GTX 1050 Direct3D11 vs_5_0 ps_5_0, D3D11)" },
    WebGlIdentity { vendor: "Google Inc. (AMD)", renderer: "ANGLE (AMD, AMD Radeon RX 580 Direct3D11 vs_5_0 ps_5_0, D3D11)" },
    WebGlIdentity { vendor: "Google Inc. (Apple)", renderer: "ANGLE (Apple, Apple M1, OpenGL 4.1)" },
];

impl WebGlIdentity {
    /// `gl.getParameter` constant for `UNMASKED_VENDOR_WEBGL`.
    pub const VENDOR_PARAM: u32 = 37445;
    /// `gl.getParameter` constant for `UNMASKED_RENDERER_WEBGL`.
    pub const RENDERER_PARAM: u32 = 37446;
}
