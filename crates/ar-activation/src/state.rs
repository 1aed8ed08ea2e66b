// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Controller states, failure taxonomy and session-end causes.

use std::fmt;

use ar_platform_port::{AttemptId, ElementVisibility};
use serde::{Deserialize, Serialize};

/// Why an activation attempt failed.
///
/// The user-facing copy for each reason is chosen by the presentation
/// adapter; raw platform text never reaches the user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    /// The user declined camera access. Recoverable by retrying.
    PermissionDenied,
    /// No capture device is present. Not recoverable on this device.
    NoCameraDevice,
    /// The model did not report loaded within budget. Recoverable.
    AssetTimeout,
    /// The platform AR entry point rejected, or the viewer reported a failed
    /// session.
    ActivationRejected {
        /// Platform message, kept for diagnostics only.
        platform_message: String,
    },
    /// AR is categorically unavailable on this device/browser.
    Unsupported,
}

impl FailureReason {
    /// Stable short name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission_denied",
            Self::NoCameraDevice => "no_camera_device",
            Self::AssetTimeout => "asset_timeout",
            Self::ActivationRejected { .. } => "activation_rejected",
            Self::Unsupported => "unsupported",
        }
    }

    /// Whether retrying on the same device can succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::NoCameraDevice | Self::Unsupported)
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Activation controller state.
///
/// ```text
/// Idle → AwaitingPermission → AwaitingAssetReady → Invoking → Presenting → TearingDown → Idle
///                 └──────────────────┴─────────────────┴───────────┴──→ Failed(reason) → Idle
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ActivationState {
    /// No session.
    #[default]
    Idle,
    /// Waiting for the camera permission prompt.
    AwaitingPermission,
    /// Waiting for the viewer to load the model (and, optionally, for the
    /// user to confirm the instructions).
    AwaitingAssetReady,
    /// The platform AR entry point has been invoked.
    Invoking,
    /// An AR session is believed to be showing.
    Presenting,
    /// Session cleanup is running.
    TearingDown,
    /// The attempt failed; waiting for the user to acknowledge.
    Failed(FailureReason),
}

impl ActivationState {
    /// Stable short name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingPermission => "awaiting_permission",
            Self::AwaitingAssetReady => "awaiting_asset_ready",
            Self::Invoking => "invoking",
            Self::Presenting => "presenting",
            Self::TearingDown => "tearing_down",
            Self::Failed(_) => "failed",
        }
    }

    /// Whether an activation session is live in this state.
    pub fn is_live(&self) -> bool {
        !matches!(self, Self::Idle | Self::Failed(_))
    }

    /// The failure reason, if failed.
    pub fn failure(&self) -> Option<&FailureReason> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    /// Visual state of the viewer element in this state.
    pub fn element_visibility(&self) -> ElementVisibility {
        match self {
            Self::Presenting => ElementVisibility::Fullscreen,
            _ => ElementVisibility::Hidden,
        }
    }
}

impl fmt::Display for ActivationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed({reason})"),
            other => f.write_str(other.name()),
        }
    }
}

/// What ended an activation session.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "cause", rename_all = "snake_case")]
pub enum EndCause {
    /// The viewer reported `not-presenting`.
    ViewerStatus,
    /// The page became visible again while presenting.
    PageVisible,
    /// A `pageshow` event arrived while presenting.
    PageShow,
    /// The watchdog saw the AR-active flag drop.
    WatchdogInactive,
    /// The maximum session duration elapsed.
    Ceiling,
    /// The user cancelled.
    Cancelled,
    /// A newer tap replaced the session.
    Superseded,
    /// The host shut the controller down.
    Shutdown,
    /// The attempt failed.
    Failed(FailureReason),
}

/// Record of the most recent session end.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEnd {
    /// Attempt that ended.
    pub attempt: AttemptId,
    /// First signal that won the race.
    pub cause: EndCause,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_presenting_is_fullscreen() {
        let states = [
            ActivationState::Idle,
            ActivationState::AwaitingPermission,
            ActivationState::AwaitingAssetReady,
            ActivationState::Invoking,
            ActivationState::Presenting,
            ActivationState::TearingDown,
            ActivationState::Failed(FailureReason::AssetTimeout),
        ];
        let visible: Vec<_> = states
            .iter()
            .filter(|s| s.element_visibility() == ElementVisibility::Fullscreen)
            .collect();
        assert_eq!(visible, vec![&ActivationState::Presenting]);
    }

    #[test]
    fn idle_and_failed_are_not_live() {
        assert!(!ActivationState::Idle.is_live());
        assert!(!ActivationState::Failed(FailureReason::Unsupported).is_live());
        assert!(ActivationState::TearingDown.is_live());
        assert!(ActivationState::AwaitingPermission.is_live());
    }

    #[test]
    fn recoverability_follows_taxonomy() {
        assert!(FailureReason::PermissionDenied.is_recoverable());
        assert!(FailureReason::AssetTimeout.is_recoverable());
        assert!(!FailureReason::NoCameraDevice.is_recoverable());
        assert!(!FailureReason::Unsupported.is_recoverable());
    }

    #[test]
    fn display_includes_failure_reason() {
        let failed = ActivationState::Failed(FailureReason::PermissionDenied);
        assert_eq!(failed.to_string(), "failed(permission_denied)");
        assert_eq!(ActivationState::Presenting.to_string(), "presenting");
    }
}
