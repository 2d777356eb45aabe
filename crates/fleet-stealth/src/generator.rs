use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::allowlist::{LOCALE_TIMEZONES, USER_AGENTS, VIEWPORTS, WEBGL_IDENTITIES};
use crate::headers::fixed_headers;
use crate::profile::{ProfileOverrides, StealthProfile, Viewport, WebGlIdentity};

/// Generate a randomized [`StealthProfile`], applying `overrides` on top.
///
/// Every field is an independent uniform pick from its allowlist except
/// viewport, which is jittered ±5% per axis after the base pick, and
/// `Accept-Language`, which tracks whichever locale was ultimately chosen
/// (override or random).
pub fn generate_profile(overrides: &ProfileOverrides) -> StealthProfile {
    let mut rng = SmallRng::from_entropy();
    generate_profile_with_rng(overrides, &mut rng)
}

pub(crate) fn generate_profile_with_rng(overrides: &ProfileOverrides, rng: &mut SmallRng) -> StealthProfile {
    let user_agent = overrides
        .user_agent
        .clone()
        .unwrap_or_else(|| pick(rng, USER_AGENTS).to_string());

    let viewport = overrides.viewport.unwrap_or_else(|| {
        let base = *pick(rng, VIEWPORTS);
        let sign_w = if rng.gen_bool(0.5) { 1 } else { -1 };
        let sign_h = if rng.gen_bool(0.5) { 1 } else { -1 };
        let pct_w = rng.gen_range(0.0..=1.0);
        let pct_h = rng.gen_range(0.0..=1.0);
        StealthProfile::jitter_viewport(base, sign_w, sign_h, pct_w, pct_h)
    });

    let (locale, timezone) = match (&overrides.locale, &overrides.timezone) {
        (Some(locale), Some(timezone)) => (locale.clone(), timezone.clone()),
        (Some(locale), None) => {
            let timezone = LOCALE_TIMEZONES
                .iter()
                .find(|(l, _)| l == locale)
                .map(|(_, tz)| tz.to_string())
                .unwrap_or_else(|| LOCALE_TIMEZONES[0].1.to_string());
            (locale.clone(), timezone)
        }
        (None, Some(timezone)) => {
            let locale = LOCALE_TIMEZONES
                .iter()
                .find(|(_, tz)| tz == timezone)
                .map(|(l, _)| l.to_string())
                .unwrap_or_else(|| LOCALE_TIMEZONES[0].0.to_string());
            (locale, timezone.clone())
        }
        (None, None) => {
            let (locale, timezone) = *pick(rng, LOCALE_TIMEZONES);
            (locale.to_string(), timezone.to_string())
        }
    };

    let webgl = overrides.webgl.clone().unwrap_or_else(|| pick(rng, WEBGL_IDENTITIES).clone());

    let extra_headers = overrides
        .extra_headers
        .clone()
        .unwrap_or_else(|| fixed_headers(&locale));

    StealthProfile {
        user_agent,
        viewport,
        locale,
        timezone,
        webgl,
        extra_headers,
    }
}

fn pick<'a, T>(rng: &mut SmallRng, items: &'a [T]) -> &'a T {
    &items[rng.gen_range(0..items.len())]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    #[test]
    fn respects_user_agent_override() {
        let overrides = ProfileOverrides {
            user_agent: Some("custom-agent".to_string()),
            ..Default::default()
        };
        let profile = generate_profile_with_rng(&overrides, &mut seeded_rng());
        assert_eq!(profile.user_agent, "custom-agent");
    }

    #[test]
    fn viewport_jitter_stays_within_five_percent() {
        let overrides = ProfileOverrides::default();
        for _ in 0..50 {
            let profile = generate_profile_with_rng(&overrides, &mut seeded_rng());
            let base = VIEWPORTS
                .iter()
                .min_by_key(|v| {
                    (v.width as i64 - profile.viewport.width as i64).unsigned_abs()
                        + (v.height as i64 - profile.viewport.height as i64).unsigned_abs()
                })
                .unwrap();
            let max_dw = (base.width as f64 * 0.05).ceil() as i64 + 1;
            let max_dh = (base.height as f64 * 0.05).ceil() as i64 + 1;
            assert!((profile.viewport.width as i64 - base.width as i64).abs() <= max_dw);
            assert!((profile.viewport.height as i64 - base.height as i64).abs() <= max_dh);
        }
    }

    #[test]
    fn locale_and_timezone_stay_paired_when_unspecified() {
        let profile = generate_profile_with_rng(&ProfileOverrides::default(), &mut seeded_rng());
        assert!(LOCALE_TIMEZONES
            .iter()
            .any(|(l, tz)| *l == profile.locale && *tz == profile.timezone));
    }

    #[test]
    fn locale_override_pulls_matching_timezone() {
        let overrides = ProfileOverrides {
            locale: Some("de-DE".to_string()),
            ..Default::default()
        };
        let profile = generate_profile_with_rng(&overrides, &mut seeded_rng());
        assert_eq!(profile.timezone, "Europe/Berlin");
    }

    #[test]
    fn webgl_override_is_honored() {
        let identity = WebGlIdentity {
            vendor: "Custom Vendor",
            renderer: "Custom Renderer",
        };
        let overrides = ProfileOverrides {
            webgl: Some(identity.clone()),
            ..Default::default()
        };
        let profile = generate_profile_with_rng(&overrides, &mut seeded_rng());
        assert_eq!(profile.webgl, identity);
    }
}
