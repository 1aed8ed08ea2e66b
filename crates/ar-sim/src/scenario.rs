// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scenario files: a device, a timeline of browser/user events and the
//! expected outcome.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use ar_activation::EndCause;
use ar_app_core::ActivationSettings;
use ar_mock_platform::MockPlatform;
use ar_platform_port::AssetReference;
use serde::{Deserialize, Serialize};

use crate::sim::SimReport;

/// Safari on an iPad in desktop mode.
pub const IPAD_DESKTOP_UA: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15";

/// Simulated device family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    /// Android phone.
    Android,
    /// iPhone.
    Ios,
    /// iPad reporting a desktop user agent.
    IpadDesktop,
    /// Wide desktop browser.
    Desktop,
}

/// Device the scenario runs on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSpec {
    /// Device family.
    pub kind: DeviceKind,
    /// WebXR probe result delivered at start; `None` leaves the probe
    /// unresolved.
    #[serde(default)]
    pub webxr: Option<bool>,
    /// Whether `getUserMedia` exists.
    #[serde(default = "yes")]
    pub media_api: bool,
    /// Whether the viewer element can be created.
    #[serde(default = "yes")]
    pub viewer_element: bool,
}

fn yes() -> bool {
    true
}

impl DeviceSpec {
    /// A device of `kind` with every API present and WebXR unresolved.
    pub fn new(kind: DeviceKind) -> Self {
        Self {
            kind,
            webxr: None,
            media_api: true,
            viewer_element: true,
        }
    }

    /// Build the mock platform for this device.
    pub fn platform(&self) -> MockPlatform {
        let mut platform = match self.kind {
            DeviceKind::Android => MockPlatform::new_android(),
            DeviceKind::Ios => MockPlatform::new_ios(),
            DeviceKind::IpadDesktop => {
                MockPlatform::with_environment(IPAD_DESKTOP_UA, "MacIntel", 5, 1366.0)
            }
            DeviceKind::Desktop => MockPlatform::new_desktop(),
        };
        platform.media_api_available = self.media_api;
        platform.element_available = self.viewer_element;
        platform
    }
}

/// Something the user or the browser does.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptedEvent {
    /// The user taps the AR button.
    Tap,
    /// The user cancels.
    Cancel,
    /// The user dismisses the error dialog.
    Acknowledge,
    /// The user presses "Start AR" in the instructions.
    ConfirmStart,
    /// The page unloads.
    Shutdown,
    /// Every pending permission prompt is granted.
    GrantCamera,
    /// Every pending permission prompt fails with `error_name`.
    DenyCamera {
        /// DOM exception name.
        error_name: String,
    },
    /// The viewer finishes loading its model.
    ModelLoaded,
    /// Every pending AR activation resolves.
    ActivationResolves,
    /// Every pending AR activation rejects.
    ActivationRejects {
        /// DOM exception name.
        #[serde(default = "not_supported")]
        error_name: String,
        /// Platform message.
        message: String,
    },
    /// The viewer emits `ar-status` with a wire status.
    ViewerStatus {
        /// e.g. `session-started`, `not-presenting`, `failed`.
        status: String,
    },
    /// The page goes to the background.
    PageHidden,
    /// The page returns to the foreground.
    PageVisible,
    /// `pageshow` fires.
    PageShow {
        /// Restored from the back/forward cache.
        #[serde(default)]
        persisted: bool,
    },
    /// The platform's AR-active flag drops.
    ArInactive,
    /// The platform's AR-active flag rises.
    ArActive,
    /// The WebXR probe resolves.
    WebXrProbe {
        /// `immersive-ar` supported.
        supported: bool,
    },
    /// The viewport is resized.
    Resize {
        /// New width in CSS pixels.
        width: f64,
    },
}

fn not_supported() -> String {
    "NotSupportedError".to_owned()
}

/// An event at a virtual time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimedEvent {
    /// Virtual time in milliseconds.
    pub at_ms: u64,
    /// What happens.
    #[serde(flatten)]
    pub event: ScriptedEvent,
}

/// Expected outcome. Absent fields are not checked.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectation {
    /// Full state sequence (observer view, initial state included).
    #[serde(default)]
    pub states: Option<Vec<String>>,
    /// Final state.
    #[serde(default)]
    pub final_state: Option<String>,
    /// Dialog sequence with consecutive repeats collapsed.
    #[serde(default)]
    pub dialogs: Option<Vec<String>>,
    /// Title of the dialog showing at the end.
    #[serde(default)]
    pub final_dialog_title: Option<String>,
    /// How the last session ended.
    #[serde(default)]
    pub end_cause: Option<EndCause>,
    /// Times the element left fullscreen.
    #[serde(default)]
    pub hide_count: Option<usize>,
    /// Sessions torn down.
    #[serde(default)]
    pub teardowns: Option<u64>,
}

impl Expectation {
    /// Differences between this expectation and `report`.
    pub fn mismatches(&self, report: &SimReport) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(states) = &self.states {
            let actual = report.states();
            if &actual != states {
                out.push(format!("states: expected {states:?}, got {actual:?}"));
            }
        }
        if let Some(state) = &self.final_state {
            let actual = report.final_state.to_string();
            if &actual != state {
                out.push(format!("final state: expected {state}, got {actual}"));
            }
        }
        if let Some(dialogs) = &self.dialogs {
            let actual = report.dialogs();
            if &actual != dialogs {
                out.push(format!("dialogs: expected {dialogs:?}, got {actual:?}"));
            }
        }
        if let Some(title) = &self.final_dialog_title {
            let actual = report.final_dialog_title();
            if actual != Some(title.as_str()) {
                out.push(format!("final dialog title: expected {title:?}, got {actual:?}"));
            }
        }
        if let Some(cause) = &self.end_cause {
            if report.end_cause.as_ref() != Some(cause) {
                out.push(format!(
                    "end cause: expected {cause:?}, got {:?}",
                    report.end_cause
                ));
            }
        }
        if let Some(hides) = self.hide_count {
            if report.hide_count != hides {
                out.push(format!("hide count: expected {hides}, got {}", report.hide_count));
            }
        }
        if let Some(teardowns) = self.teardowns {
            if report.teardowns != teardowns {
                out.push(format!(
                    "teardowns: expected {teardowns}, got {}",
                    report.teardowns
                ));
            }
        }
        out
    }
}

/// A complete scenario file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name (used in reports and goldens).
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Device to simulate.
    pub device: DeviceSpec,
    /// Settings overriding the harness defaults.
    #[serde(default)]
    pub settings: Option<ActivationSettings>,
    /// Asset every tap presents.
    #[serde(default = "default_asset")]
    pub asset: AssetReference,
    /// Timeline.
    pub events: Vec<TimedEvent>,
    /// Virtual time to run to after the last event.
    #[serde(default)]
    pub run_until_ms: Option<u64>,
    /// Expected outcome.
    #[serde(default)]
    pub expect: Expectation,
}

/// Default asset: the storefront's grass model.
pub fn default_asset() -> AssetReference {
    AssetReference::new("/models/grass.glb")
        .with_ios_model("/models/grass.usdz")
        .with_poster("/images/grass-poster.webp")
}

impl Scenario {
    /// Scenario on `device` with the default asset and no expectations.
    pub fn new(name: impl Into<String>, device: DeviceSpec, events: Vec<TimedEvent>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            device,
            settings: None,
            asset: default_asset(),
            events,
            run_until_ms: None,
            expect: Expectation::default(),
        }
    }

    /// Read a scenario from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let f = File::open(path).with_context(|| format!("failed to open scenario {}", path.display()))?;
        serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("failed to parse scenario {}", path.display()))
    }

    /// Virtual time the run stops at.
    pub fn end_ms(&self) -> u64 {
        let last = self.events.iter().map(|e| e.at_ms).max().unwrap_or(0);
        self.run_until_ms.unwrap_or(last + 20_000).max(last)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn timed_events_flatten_the_event_tag() {
        let json = r#"[
            {"at_ms": 0, "event": "tap"},
            {"at_ms": 800, "event": "deny_camera", "error_name": "NotAllowedError"},
            {"at_ms": 900, "event": "page_show"}
        ]"#;
        let events: Vec<TimedEvent> = serde_json::from_str(json).unwrap();
        assert_eq!(events[0].event, ScriptedEvent::Tap);
        assert_eq!(
            events[1].event,
            ScriptedEvent::DenyCamera {
                error_name: "NotAllowedError".into()
            }
        );
        assert_eq!(events[2].event, ScriptedEvent::PageShow { persisted: false });
    }

    #[test]
    fn minimal_scenario_uses_defaults() {
        let json = r#"{"name": "min", "device": {"kind": "ios"}, "events": []}"#;
        let scenario: Scenario = serde_json::from_str(json).unwrap();
        assert!(scenario.device.media_api);
        assert_eq!(scenario.device.webxr, None);
        assert_eq!(scenario.asset, default_asset());
        assert_eq!(scenario.end_ms(), 20_000);
        assert_eq!(scenario.expect, Expectation::default());
    }

    #[test]
    fn ipad_desktop_mode_is_a_mobile_ios_platform() {
        let platform = DeviceSpec::new(DeviceKind::IpadDesktop).platform();
        assert_eq!(platform.platform_name, "MacIntel");
        assert!(platform.max_touch_points > 1);
    }
}
