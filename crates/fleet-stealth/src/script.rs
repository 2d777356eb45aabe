use crate::profile::StealthProfile;

/// Init script template, evaluated in a context's isolated world before any
/// page script runs. `{{WEBGL_VENDOR}}` / `{{WEBGL_RENDERER}}` are the only
/// templated placeholders — everything else is fixed.
const INIT_SCRIPT_TEMPLATE: &str = r#"
(() => {
  Object.defineProperty(navigator, 'webdriver', { get: () => undefined });

  Object.defineProperty(navigator, 'plugins', {
    get: () => [
      { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer' },
      { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai' },
    ],
  });

  Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
  Object.defineProperty(navigator, 'platform', { get: () => 'Win32' });

  const originalQuery = navigator.permissions.query.bind(navigator.permissions);
  navigator.permissions.query = (params) => {
    if (params && params.name === 'notifications') {
      return Promise.resolve({ state: 'denied' });
    }
    return originalQuery(params);
  };

  window.chrome = window.chrome || {};
  window.chrome.runtime = window.chrome.runtime || {};
  window.chrome.loadTimes = window.chrome.loadTimes || function () {};
  window.chrome.csi = window.chrome.csi || function () {};
  window.chrome.app = window.chrome.app || {};

  Object.defineProperty(screen, 'availWidth', { get: () => screen.width });
  Object.defineProperty(screen, 'availHeight', { get: () => screen.height - 40 });

  if (navigator.getBattery) {
    navigator.getBattery = () =>
      Promise.resolve({
        charging: true,
        chargingTime: 0,
        dischargingTime: Infinity,
        level: 1,
        addEventListener: () => {},
        removeEventListener: () => {},
      });
  }

  const webglVendor = '{{WEBGL_VENDOR}}';
  const webglRenderer = '{{WEBGL_RENDERER}}';
  const patchGetParameter = (proto) => {
    if (!proto) return;
    const original = proto.getParameter;
    proto.getParameter = function (parameter) {
      if (parameter === 37445) return webglVendor;
      if (parameter === 37446) return webglRenderer;
      return original.call(this, parameter);
    };
  };
  patchGetParameter(window.WebGLRenderingContext && window.WebGLRenderingContext.prototype);
  patchGetParameter(window.WebGL2RenderingContext && window.WebGL2RenderingContext.prototype);

  if (navigator.connection) {
    Object.defineProperty(navigator.connection, 'rtt', { get: () => 100 });
  }

  Object.defineProperty(Notification, 'permission', { get: () => 'default' });
})();
"#;

/// Substitute the profile's WebGL identity into [`INIT_SCRIPT_TEMPLATE`] and
/// return the rendered script ready to hand to the CDP client's
/// `evaluate_on_new_document`-equivalent call.
pub fn render_init_script(profile: &StealthProfile) -> String {
    INIT_SCRIPT_TEMPLATE
        .replace("{{WEBGL_VENDOR}}", &profile.webgl.vendor.replace('\'', "\\'"))
        .replace("{{WEBGL_RENDERER}}", &profile.webgl.renderer.replace('\'', "\\'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{Viewport, WebGlIdentity};

    fn sample_profile() -> StealthProfile {
        StealthProfile {
            user_agent: "ua".to_string(),
            viewport: Viewport {
                width: 1280,
                height: 720,
                device_scale_factor: 1.0,
            },
            locale: "en-US".to_string(),
            timezone: "America/New_York".to_string(),
            webgl: WebGlIdentity {
                vendor: "Google Inc. (Intel)",
                renderer: "ANGLE (Intel)",
            },
            extra_headers: vec![],
        }
    }

    #[test]
    fn script_masks_webdriver_flag() {
        let script = render_init_script(&sample_profile());
        assert!(script.contains("'webdriver'"));
        assert!(script.contains("=> undefined"));
    }

    #[test]
    fn script_has_no_leftover_placeholders() {
        let script = render_init_script(&sample_profile());
        assert!(!script.contains("{{"));
    }

    #[test]
    fn script_overrides_notification_permission() {
        let script = render_init_script(&sample_profile());
        assert!(script.contains("Notification, 'permission'"));
    }
}
