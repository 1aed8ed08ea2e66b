// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Tunables for the activation controller (timeouts, watchdog, gating).
//!
//! Every field has a default so partial JSON documents deserialize; call
//! [`ActivationSettings::validate`] before handing settings to a controller.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Store key under which settings are persisted.
pub const SETTINGS_KEY: &str = "activation";

/// What a tap does while an activation is already in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetapPolicy {
    /// Tear the live session down and start over (last writer wins).
    #[default]
    Supersede,
    /// Ignore the tap; the live session continues.
    Reject,
}

/// Session watchdog timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogSettings {
    /// Interval between AR-active polls.
    pub poll_interval_ms: u32,
    /// Hard ceiling on a presenting session.
    pub max_session_ms: u32,
    /// Polling time during which an inactive flag is tolerated before the
    /// session has been observed active once.
    pub activation_grace_ms: u32,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            max_session_ms: 300_000,
            activation_grace_ms: 2_000,
        }
    }
}

/// Controller settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationSettings {
    /// Budget for the viewer to report its model loaded.
    pub asset_timeout_ms: u32,
    /// Watchdog timing.
    pub watchdog: WatchdogSettings,
    /// Viewports at or below this width count as mobile.
    pub mobile_max_width_px: u32,
    /// Wait for the user to confirm the instructions before invoking AR.
    pub require_start_confirmation: bool,
    /// Behaviour of a tap during a live session.
    pub retap: RetapPolicy,
}

impl Default for ActivationSettings {
    fn default() -> Self {
        Self {
            asset_timeout_ms: 15_000,
            watchdog: WatchdogSettings::default(),
            mobile_max_width_px: 1_024,
            require_start_confirmation: false,
            retap: RetapPolicy::default(),
        }
    }
}

impl ActivationSettings {
    /// Reject settings the controller cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.asset_timeout_ms == 0 {
            return Err(invalid("asset_timeout_ms", "must be greater than zero"));
        }
        if self.watchdog.poll_interval_ms == 0 {
            return Err(invalid(
                "watchdog.poll_interval_ms",
                "must be greater than zero",
            ));
        }
        if self.watchdog.max_session_ms < self.watchdog.poll_interval_ms {
            return Err(invalid(
                "watchdog.max_session_ms",
                format!(
                    "must be at least one poll interval ({} ms)",
                    self.watchdog.poll_interval_ms
                ),
            ));
        }
        Ok(())
    }

    /// Parse settings from a JSON document and validate them.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let settings: Self = serde_json::from_slice(bytes)?;
        settings.validate()?;
        Ok(settings)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_budgets() {
        let s = ActivationSettings::default();
        assert_eq!(s.asset_timeout_ms, 15_000);
        assert_eq!(s.watchdog.poll_interval_ms, 1_000);
        assert_eq!(s.watchdog.max_session_ms, 300_000);
        assert_eq!(s.mobile_max_width_px, 1_024);
        assert_eq!(s.retap, RetapPolicy::Supersede);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn partial_documents_fill_defaults() {
        let s = ActivationSettings::from_json(br#"{"asset_timeout_ms": 500, "retap": "reject", "watchdog": {"poll_interval_ms": 250}}"#)
            .unwrap();
        assert_eq!(s.asset_timeout_ms, 500);
        assert_eq!(s.retap, RetapPolicy::Reject);
        assert_eq!(s.watchdog.poll_interval_ms, 250);
        assert_eq!(s.watchdog.max_session_ms, 300_000);
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let err = ActivationSettings::from_json(br#"{"watchdog": {"poll_interval_ms": 0}}"#)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "watchdog.poll_interval_ms",
                ..
            }
        ));
    }

    #[test]
    fn ceiling_shorter_than_a_poll_is_rejected() {
        let mut s = ActivationSettings::default();
        s.watchdog.max_session_ms = 10;
        assert!(s.validate().is_err());
    }
}
