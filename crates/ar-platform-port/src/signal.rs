// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Signals flowing from platform adapters back into the controller.

use crate::ids::AttemptId;
use crate::port::MediaStream;
use crate::PlatformError;

/// Platform event sources the controller can subscribe to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SignalSource {
    /// The viewer element finished loading its model (`load`).
    ViewerLoad,
    /// The viewer element reported an AR session status (`ar-status`).
    ViewerSessionStatus,
    /// The document's visibility changed (`visibilitychange`).
    VisibilityChange,
    /// The page was shown again (`pageshow`).
    PageShow,
    /// The viewport was resized (`resize`).
    ViewportResize,
}

impl SignalSource {
    /// Every source, in a stable order.
    pub const ALL: [Self; 5] = [
        Self::ViewerLoad,
        Self::ViewerSessionStatus,
        Self::VisibilityChange,
        Self::PageShow,
        Self::ViewportResize,
    ];

    /// Whether registrations of this source belong to an activation session
    /// (as opposed to the page lifetime).
    pub fn is_session_scoped(self) -> bool {
        !matches!(self, Self::ViewportResize)
    }
}

/// Status reported by the viewer element's session-status event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum SessionStatus {
    /// An AR session is showing the model.
    Presenting,
    /// No AR session is showing.
    NotPresenting,
    /// The AR session could not start or crashed.
    Failed,
}

impl SessionStatus {
    /// Parse the status string carried by the element's event detail.
    ///
    /// Accepts the generic names (`presenting`, `not-presenting`, `failed`)
    /// and the `<model-viewer>` names (`session-started`, `object-placed`).
    pub fn from_wire(status: &str) -> Option<Self> {
        match status {
            "presenting" | "session-started" | "object-placed" => Some(Self::Presenting),
            "not-presenting" => Some(Self::NotPresenting),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Document visibility state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PageVisibility {
    /// The page is in the foreground.
    Visible,
    /// The page is backgrounded (another app, or a native AR viewer, is in front).
    Hidden,
}

/// Mode the viewer element's AR entry point is invoked in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ArMode {
    /// In-browser WebXR `immersive-ar` session.
    WebXr,
    /// Android Scene Viewer intent.
    SceneViewer,
    /// iOS Quick Look with a USDZ the viewer generates from the primary model.
    QuickLook,
}

impl ArMode {
    /// Value of the viewer element's `ar-modes` attribute for this mode.
    pub fn as_attr(self) -> &'static str {
        match self {
            Self::WebXr => "webxr scene-viewer",
            Self::SceneViewer => "scene-viewer",
            Self::QuickLook => "quick-look",
        }
    }
}

/// Visual state of the viewer element.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ElementVisibility {
    /// Off-screen and inert; the element still loads its model.
    #[default]
    Hidden,
    /// Fullscreen and visible; only while presenting.
    Fullscreen,
}

/// Purpose of a timer armed by the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TimerKind {
    /// One-shot bound on asset readiness.
    AssetTimeout,
    /// Recurring watchdog poll.
    WatchdogPoll,
    /// One-shot maximum session duration.
    SessionCeiling,
}

/// Tag carried by a timer back to the controller when it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimerToken {
    /// Attempt the timer was armed for.
    pub attempt: AttemptId,
    /// What the timer is for.
    pub kind: TimerKind,
}

/// Completion or event delivered to the controller's `dispatch`.
///
/// Session-scoped variants carry the [`AttemptId`] the originating request or
/// subscription was registered under; adapters copy it verbatim.
#[derive(Debug)]
pub enum Signal {
    /// The WebXR capability probe resolved.
    WebXrProbed {
        /// Whether `immersive-ar` sessions are supported.
        supported: bool,
    },
    /// The viewport width changed (page-lifetime subscription).
    ViewportResized {
        /// New width in CSS pixels.
        width: f64,
    },
    /// The video stream request settled.
    VideoStream {
        /// Attempt that issued the request.
        attempt: AttemptId,
        /// The opened stream, or the platform's rejection.
        result: Result<Box<dyn MediaStream>, PlatformError>,
    },
    /// The viewer's AR entry point promise settled.
    ActivationSettled {
        /// Attempt that invoked the entry point.
        attempt: AttemptId,
        /// Resolution or rejection.
        result: Result<(), PlatformError>,
    },
    /// A timer armed through [`crate::TimerPort`] fired.
    TimerFired(TimerToken),
    /// The viewer element reported its model loaded.
    ViewerLoaded {
        /// Attempt owning the subscription.
        attempt: AttemptId,
    },
    /// The viewer element reported a session status.
    SessionStatus {
        /// Attempt owning the subscription.
        attempt: AttemptId,
        /// Reported status.
        status: SessionStatus,
    },
    /// The document's visibility changed.
    VisibilityChanged {
        /// Attempt owning the subscription.
        attempt: AttemptId,
        /// New visibility.
        visibility: PageVisibility,
    },
    /// The page was shown (including restores from the back/forward cache).
    PageShow {
        /// Attempt owning the subscription.
        attempt: AttemptId,
        /// Whether the page came from the back/forward cache.
        persisted: bool,
    },
}

impl Signal {
    /// Attempt the signal is scoped to; `None` for page-lifetime signals.
    pub fn attempt(&self) -> Option<AttemptId> {
        match self {
            Self::WebXrProbed { .. } | Self::ViewportResized { .. } => None,
            Self::VideoStream { attempt, .. }
            | Self::ActivationSettled { attempt, .. }
            | Self::ViewerLoaded { attempt }
            | Self::SessionStatus { attempt, .. }
            | Self::VisibilityChanged { attempt, .. }
            | Self::PageShow { attempt, .. } => Some(*attempt),
            Self::TimerFired(token) => Some(token.attempt),
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::WebXrProbed { .. } => "webxr_probed",
            Self::ViewportResized { .. } => "viewport_resized",
            Self::VideoStream { .. } => "video_stream",
            Self::ActivationSettled { .. } => "activation_settled",
            Self::TimerFired(_) => "timer_fired",
            Self::ViewerLoaded { .. } => "viewer_loaded",
            Self::SessionStatus { .. } => "session_status",
            Self::VisibilityChanged { .. } => "visibility_changed",
            Self::PageShow { .. } => "page_show",
        }
    }
}
