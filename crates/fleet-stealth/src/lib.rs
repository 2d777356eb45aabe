//! Stealth profile generation for headless browser automation.
//!
//! This crate is deliberately synchronous and dependency-light: it has no
//! opinion on which CDP client or async runtime drives the browser. Given a
//! source of randomness and an optional set of overrides, [`generate_profile`]
//! produces a [`StealthProfile`] — a fingerprint plus an init script — that a
//! caller injects into a freshly opened browsing context before any page
//! loads.

mod allowlist;
mod generator;
mod headers;
mod profile;
mod script;

pub use generator::generate_profile;
pub use headers::build_headers;
pub use profile::{ProfileOverrides, StealthProfile, Viewport, WebGlIdentity};
pub use script::render_init_script;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_profile_has_consistent_header_locale() {
        let profile = generate_profile(&ProfileOverrides::default());
        let headers = build_headers(&profile);
        let accept_language = headers
            .iter()
            .find(|(name, _)| name == "Accept-Language")
            .map(|(_, value)| value.clone())
            .unwrap();
        assert!(accept_language.starts_with(&profile.locale));
    }

    #[test]
    fn render_init_script_embeds_chosen_webgl_identity() {
        let profile = generate_profile(&ProfileOverrides::default());
        let script = render_init_script(&profile);
        assert!(script.contains(&profile.webgl.vendor));
        assert!(script.contains(&profile.webgl.renderer));
    }
}
