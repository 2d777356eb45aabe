use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chromiumoxide::Page;
use chromiumoxide_cdp::cdp::browser_protocol::browser::{GrantPermissionsParams, PermissionType};
use chromiumoxide_cdp::cdp::browser_protocol::emulation::{
    SetDeviceMetricsOverrideParams, SetGeolocationOverrideParams, SetTouchEmulationEnabledParams,
};
use chromiumoxide_cdp::cdp::browser_protocol::network::{
    EmulateNetworkConditionsParams, Headers, SetExtraHttpHeadersParams,
};
use fleet_stealth::StealthProfile;
use tracing::warn;

use crate::config::ContextOverrides;

/// Apply a stealth profile's viewport/headers and the caller's per-request
/// overrides (mobile/touch emulation, geolocation, offline mode, permissions,
/// basic-auth credentials) to a freshly opened page.
///
/// Every step is independently best-effort: a failed override is logged and
/// skipped rather than failing the whole acquisition, so one bad CDP call
/// never aborts an otherwise-successful context acquisition.
pub(crate) async fn apply_profile_and_overrides(
    page: &Page,
    profile: &StealthProfile,
    overrides: &ContextOverrides,
) {
    match SetDeviceMetricsOverrideParams::builder()
        .width(profile.viewport.width as i64)
        .height(profile.viewport.height as i64)
        .device_scale_factor(profile.viewport.device_scale_factor)
        .mobile(overrides.is_mobile)
        .build()
    {
        Ok(params) => {
            if let Err(e) = page.execute(params).await {
                warn!(error = %e, "failed to override device metrics");
            }
        }
        Err(e) => warn!(error = %e, "invalid device metrics override params"),
    }

    if overrides.has_touch {
        match SetTouchEmulationEnabledParams::builder().enabled(true).build() {
            Ok(params) => {
                if let Err(e) = page.execute(params).await {
                    warn!(error = %e, "failed to enable touch emulation");
                }
            }
            Err(_) => warn!("invalid touch emulation override params"),
        }
    }

    let mut headers: HashMap<String, String> = profile.extra_headers.iter().cloned().collect();
    if let Some(credentials) = &overrides.http_credentials {
        let token = BASE64.encode(format!("{}:{}", credentials.username, credentials.password));
        headers.insert("Authorization".to_string(), format!("Basic {token}"));
    }
    if !headers.is_empty() {
        match serde_json::to_value(&headers) {
            Ok(value) => {
                if let Err(e) = page
                    .execute(SetExtraHttpHeadersParams::new(Headers::new(value)))
                    .await
                {
                    warn!(error = %e, "failed to set extra headers");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize extra headers"),
        }
    }

    if let Some(geo) = overrides.geolocation {
        match SetGeolocationOverrideParams::builder()
            .latitude(geo.latitude)
            .longitude(geo.longitude)
            .accuracy(geo.accuracy)
            .build()
        {
            Ok(params) => {
                if let Err(e) = page.execute(params).await {
                    warn!(error = %e, "failed to override geolocation");
                }
            }
            Err(_) => warn!("invalid geolocation override params"),
        }
    }

    if overrides.offline {
        let params = EmulateNetworkConditionsParams::builder()
            .offline(true)
            .latency(0.0)
            .download_throughput(-1.0)
            .upload_throughput(-1.0)
            .build();
        match params {
            Ok(params) => {
                if let Err(e) = page.execute(params).await {
                    warn!(error = %e, "failed to emulate offline network conditions");
                }
            }
            Err(_) => warn!("invalid network condition override params"),
        }
    }

    if !overrides.permissions.is_empty() {
        let permissions: Vec<PermissionType> = overrides
            .permissions
            .iter()
            .filter_map(|p| permission_from_str(p))
            .collect();
        if !permissions.is_empty() {
            let params = GrantPermissionsParams::builder().permissions(permissions).build();
            match params {
                Ok(params) => {
                    if let Err(e) = page.execute(params).await {
                        warn!(error = %e, "failed to grant permissions");
                    }
                }
                Err(_) => warn!("invalid permission grant params"),
            }
        }
    }
}

fn permission_from_str(name: &str) -> Option<PermissionType> {
    match name {
        "geolocation" => Some(PermissionType::Geolocation),
        "notifications" => Some(PermissionType::Notifications),
        "camera" => Some(PermissionType::VideoCapture),
        "microphone" => Some(PermissionType::AudioCapture),
        "clipboard-read" => Some(PermissionType::ClipboardReadWrite),
        "clipboard-write" => Some(PermissionType::ClipboardReadWrite),
        _ => None,
    }
}
