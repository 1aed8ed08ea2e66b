// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Presentation adapter: state → dialog.
//!
//! Pure functions only. The copy here is what the storefront shows; raw
//! platform messages never appear in it.

use serde::{Deserialize, Serialize};

use crate::capability::DeviceProfile;
use crate::state::{ActivationState, FailureReason};

/// What the UI should show for a state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "dialog", rename_all = "snake_case")]
pub enum Dialog {
    /// Nothing.
    #[default]
    None,
    /// A busy indicator (permission prompt pending).
    Busy,
    /// The AR instructions dialog.
    Instructions {
        /// Steps for the device the attempt started on.
        steps: Vec<String>,
    },
    /// A dismissible error dialog.
    Error {
        /// Dialog title.
        title: String,
        /// Dialog body.
        message: String,
    },
}

impl Dialog {
    /// Stable short name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Busy => "busy",
            Self::Instructions { .. } => "instructions",
            Self::Error { .. } => "error",
        }
    }
}

/// Map a state onto its dialog. `profile` selects the instruction steps.
pub fn present(state: &ActivationState, profile: &DeviceProfile) -> Dialog {
    match state {
        ActivationState::Idle
        | ActivationState::Invoking
        | ActivationState::Presenting
        | ActivationState::TearingDown => Dialog::None,
        ActivationState::AwaitingPermission => Dialog::Busy,
        ActivationState::AwaitingAssetReady => Dialog::Instructions {
            steps: instruction_steps(profile)
                .iter()
                .map(|step| (*step).to_owned())
                .collect(),
        },
        ActivationState::Failed(reason) => {
            let (title, message) = failure_copy(reason);
            Dialog::Error {
                title: title.to_owned(),
                message: message.to_owned(),
            }
        }
    }
}

/// Title and body for a failure.
pub fn failure_copy(reason: &FailureReason) -> (&'static str, &'static str) {
    match reason {
        FailureReason::PermissionDenied => (
            "Camera Access Required",
            "Must enable camera access to launch AR. Please allow camera permission and try again.",
        ),
        FailureReason::NoCameraDevice => (
            "No Camera Found",
            "Camera access is required to use AR, but no camera was found on this device.",
        ),
        FailureReason::AssetTimeout => (
            "Model Still Loading",
            "The 3D model is taking too long to load. Check your connection and try again.",
        ),
        FailureReason::ActivationRejected { .. } => (
            "AR Could Not Start",
            "AR view could not be started. Please try again.",
        ),
        FailureReason::Unsupported => (
            "AR Not Available",
            "AR preview is not supported on this device or browser.",
        ),
    }
}

/// Steps shown in the instructions dialog for a device.
///
/// Quick Look places a single model; the WebXR/Scene Viewer path supports
/// placing several patches.
pub fn instruction_steps(profile: &DeviceProfile) -> &'static [&'static str] {
    if profile.is_ios {
        &[
            "Point your camera at a flat surface",
            "Tap to place the grass patch",
            "Use pinch gestures to resize",
            "Quick Look supports single placement. For multiple patches, exit and reopen AR.",
        ]
    } else {
        &[
            "Point your camera at a flat surface",
            "Tap to place your first grass patch",
            "Tap empty areas to add more grass!",
            "Pinch to resize and drag to move each patch",
        ]
    }
}
