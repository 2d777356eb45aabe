use crate::profile::StealthProfile;

/// The header set that is the same for every profile except `Accept-Language`,
/// which is derived from the chosen locale.
pub(crate) fn fixed_headers(locale: &str) -> Vec<(String, String)> {
    vec![
        ("Accept-Language".to_string(), accept_language(locale)),
        (
            "Accept-Encoding".to_string(),
            "gzip, deflate, br".to_string(),
        ),
        (
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8"
                .to_string(),
        ),
        ("Sec-Fetch-Dest".to_string(), "document".to_string()),
        ("Sec-Fetch-Mode".to_string(), "navigate".to_string()),
        ("Sec-Fetch-Site".to_string(), "none".to_string()),
        ("Sec-Fetch-User".to_string(), "?1".to_string()),
        ("Upgrade-Insecure-Requests".to_string(), "1".to_string()),
    ]
}

fn accept_language(locale: &str) -> String {
    format!("{locale},en;q=0.9")
}

/// Build the full header set for a resolved profile: the profile's
/// `extra_headers` (which already include the locale-derived Accept-Language
/// unless a caller overrode it) plus nothing else — overrides are merged at
/// generation time, not here, so this is a pure projection.
pub fn build_headers(profile: &StealthProfile) -> Vec<(String, String)> {
    profile.extra_headers.clone()
}
