// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Capability detection: device class, OS family and WebXR availability.
//!
//! User-agent facts are read once when the detector is installed. The only
//! inputs that change afterwards are the viewport width (one page-lifetime
//! resize subscription) and the WebXR probe result, which starts `false` and
//! is filled in once when the probe resolves.

use ar_platform_port::{AttemptId, EnvironmentPort, EventPort, SignalSource, SubscriptionId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Snapshot of what the current device can do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Phone or tablet class device (or a narrow viewport).
    pub is_mobile: bool,
    /// iOS/iPadOS; AR goes through Quick Look.
    pub is_ios: bool,
    /// WebXR `immersive-ar` is available.
    pub supports_webxr: bool,
}

/// Raw navigator facts the classification is derived from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserAgentHints {
    /// `navigator.userAgent`.
    pub user_agent: String,
    /// `navigator.platform`.
    pub platform_name: String,
    /// `navigator.maxTouchPoints`.
    pub max_touch_points: u32,
    /// Viewport width in CSS pixels.
    pub viewport_width: f64,
}

impl UserAgentHints {
    /// Read the hints from an environment port.
    pub fn read<E: EnvironmentPort + ?Sized>(env: &E) -> Self {
        Self {
            user_agent: env.user_agent(),
            platform_name: env.platform_name(),
            max_touch_points: env.max_touch_points(),
            viewport_width: env.viewport_width(),
        }
    }

    /// iPadOS reports a desktop Safari user agent; only the touch points give
    /// it away.
    fn is_ipados_desktop_mode(&self) -> bool {
        self.platform_name == "MacIntel" && self.max_touch_points > 1
    }

    /// Whether the device is iOS/iPadOS.
    pub fn is_ios(&self) -> bool {
        ua_contains_any(&self.user_agent, &["iphone", "ipad", "ipod"]) || self.is_ipados_desktop_mode()
    }

    /// Whether the device counts as mobile for a `max_width` breakpoint.
    pub fn is_mobile(&self, max_width: u32) -> bool {
        self.viewport_width <= f64::from(max_width)
            || ua_contains_any(&self.user_agent, &["iphone", "ipad", "ipod", "android"])
            || self.is_ipados_desktop_mode()
    }
}

fn ua_contains_any(user_agent: &str, needles: &[&str]) -> bool {
    let ua = user_agent.to_ascii_lowercase();
    needles.iter().any(|needle| ua.contains(needle))
}

/// Memoized capability detector.
#[derive(Debug)]
pub struct CapabilityDetector {
    mobile_max_width: u32,
    hints: Option<UserAgentHints>,
    webxr: Option<bool>,
    resize_subscription: Option<SubscriptionId>,
}

impl CapabilityDetector {
    /// Detector using `mobile_max_width` as the mobile breakpoint.
    pub fn new(mobile_max_width: u32) -> Self {
        Self {
            mobile_max_width,
            hints: None,
            webxr: None,
            resize_subscription: None,
        }
    }

    /// Read the hints, register the resize listener and start the WebXR probe.
    ///
    /// Idempotent: a second call does nothing.
    pub fn install<P>(&mut self, platform: &mut P)
    where
        P: EnvironmentPort + EventPort + ?Sized,
    {
        if self.hints.is_some() {
            return;
        }
        self.hints = Some(UserAgentHints::read(platform));
        self.resize_subscription =
            Some(platform.subscribe(SignalSource::ViewportResize, AttemptId::PAGE));
        platform.probe_webxr();
        debug!(profile = ?self.detect(), "capability detector installed");
    }

    /// Remove the page-lifetime resize listener.
    pub fn uninstall<P: EventPort + ?Sized>(&mut self, platform: &mut P) {
        if let Some(id) = self.resize_subscription.take() {
            platform.unsubscribe(id);
        }
    }

    /// Current profile. Before installation every flag is `false`.
    pub fn detect(&self) -> DeviceProfile {
        let Some(hints) = &self.hints else {
            return DeviceProfile::default();
        };
        DeviceProfile {
            is_mobile: hints.is_mobile(self.mobile_max_width),
            is_ios: hints.is_ios(),
            supports_webxr: self.webxr.unwrap_or(false),
        }
    }

    /// Whether the WebXR probe has resolved.
    pub fn webxr_probe_resolved(&self) -> bool {
        self.webxr.is_some()
    }

    /// Record the WebXR probe result. Only the first result is kept.
    pub fn on_webxr_probed(&mut self, supported: bool) {
        if self.webxr.is_none() {
            self.webxr = Some(supported);
            debug!(supported, "webxr probe resolved");
        }
    }

    /// Track a viewport resize.
    pub fn on_viewport_resized(&mut self, width: f64) {
        if let Some(hints) = &mut self.hints {
            hints.viewport_width = width;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANDROID: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 Chrome/124.0 Mobile Safari/537.36";
    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 Version/17.4 Mobile/15E148 Safari/604.1";
    const MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 Version/17.4 Safari/605.1.15";

    fn hints(ua: &str, platform: &str, touch: u32, width: f64) -> UserAgentHints {
        UserAgentHints {
            user_agent: ua.into(),
            platform_name: platform.into(),
            max_touch_points: touch,
            viewport_width: width,
        }
    }

    #[test]
    fn android_phone_is_mobile_not_ios() {
        let h = hints(ANDROID, "Linux armv8l", 5, 412.0);
        assert!(h.is_mobile(1024));
        assert!(!h.is_ios());
    }

    #[test]
    fn iphone_is_ios_even_on_a_wide_viewport() {
        let h = hints(IPHONE, "iPhone", 5, 2000.0);
        assert!(h.is_ios());
        assert!(h.is_mobile(1024));
    }

    #[test]
    fn ipad_desktop_mode_is_detected_through_touch_points() {
        let h = hints(MAC, "MacIntel", 5, 1366.0);
        assert!(h.is_ios());
        assert!(h.is_mobile(1024));
        let desktop = hints(MAC, "MacIntel", 0, 1440.0);
        assert!(!desktop.is_ios());
        assert!(!desktop.is_mobile(1024));
    }

    #[test]
    fn narrow_desktop_window_counts_as_mobile() {
        let h = hints(MAC, "MacIntel", 0, 800.0);
        assert!(h.is_mobile(1024));
        assert!(!h.is_mobile(640));
    }

    #[test]
    fn uninstalled_detector_reports_nothing() {
        let detector = CapabilityDetector::new(1024);
        assert_eq!(detector.detect(), DeviceProfile::default());
        assert!(!detector.webxr_probe_resolved());
    }

    #[test]
    fn first_webxr_result_wins() {
        let mut detector = CapabilityDetector::new(1024);
        detector.on_webxr_probed(true);
        detector.on_webxr_probed(false);
        assert!(detector.webxr_probe_resolved());
        assert_eq!(detector.webxr, Some(true));
    }
}
