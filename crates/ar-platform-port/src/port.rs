// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Port traits defining the platform contract.
//!
//! Each trait is a hexagonal port: the controller calls it, an adapter
//! (`ar-web`'s `WebPlatform`, `ar-mock-platform`'s `MockPlatform`) implements
//! it. Calls never block. Anything that completes later is reported back as a
//! [`crate::Signal`] through the host's dispatch loop.

use std::fmt;

use crate::asset::AssetReference;
use crate::ids::{AttemptId, SubscriptionId, TimerId};
use crate::signal::{ArMode, ElementVisibility, SignalSource, TimerToken};
use crate::PlatformError;

/// User-agent and viewport facts used by capability detection.
pub trait EnvironmentPort {
    /// `navigator.userAgent`.
    fn user_agent(&self) -> String;
    /// `navigator.platform` (e.g. `MacIntel` on iPadOS desktop mode).
    fn platform_name(&self) -> String;
    /// `navigator.maxTouchPoints`.
    fn max_touch_points(&self) -> u32;
    /// Current viewport width in CSS pixels.
    fn viewport_width(&self) -> f64;
    /// Start the WebXR `immersive-ar` support probe.
    ///
    /// Reports [`crate::Signal::WebXrProbed`]. Adapters without WebXR report
    /// `false` (or never report; the controller then assumes `false`).
    fn probe_webxr(&mut self);
}

/// A live media stream opened solely to surface the permission prompt.
pub trait MediaStream: fmt::Debug {
    /// Ids of every track in the stream.
    fn track_ids(&self) -> Vec<String>;
    /// Stop one track. Failures are reported, never panicked on.
    fn stop_track(&mut self, track_id: &str) -> Result<(), PlatformError>;
}

/// Camera access.
pub trait MediaPort {
    /// Request a video-only stream for `attempt`.
    ///
    /// Returns `Err` synchronously when the media API is missing. Otherwise the
    /// outcome arrives as [`crate::Signal::VideoStream`].
    fn request_video_stream(&mut self, attempt: AttemptId) -> Result<(), PlatformError>;
}

/// The AR-capable viewer element (an opaque third-party custom element).
pub trait ViewerPort {
    /// Create the element if it does not exist yet.
    fn ensure_element(&mut self) -> Result<(), PlatformError>;
    /// Point the element at `asset` (model, iOS model, poster, placement).
    fn attach_source(&mut self, asset: &AssetReference);
    /// Model URL the element currently points at, if any.
    fn current_source(&self) -> Option<String>;
    /// Whether the element reports its current model as loaded.
    fn is_loaded(&self) -> bool;
    /// Whether the platform reports an AR session (or the model) as active.
    fn is_ar_active(&self) -> bool;
    /// Invoke the element's AR entry point in `mode`.
    ///
    /// The promise outcome arrives as [`crate::Signal::ActivationSettled`].
    fn activate(&mut self, mode: ArMode, attempt: AttemptId);
    /// Hand `usdz_url` to iOS Quick Look. Completion is not observable.
    fn open_quick_look(&mut self, usdz_url: &str) -> Result<(), PlatformError>;
    /// Apply the element's visual state.
    fn set_visibility(&mut self, visibility: ElementVisibility);
}

/// Timers; the controller owns no clock.
pub trait TimerPort {
    /// Arm a one-shot timer firing [`crate::Signal::TimerFired`] after `delay_ms`.
    fn set_timeout(&mut self, delay_ms: u32, token: TimerToken) -> TimerId;
    /// Arm a recurring timer firing every `period_ms`.
    fn set_interval(&mut self, period_ms: u32, token: TimerToken) -> TimerId;
    /// Cancel a timer. Clearing an unknown or already-fired timer is a no-op.
    fn clear_timer(&mut self, id: TimerId);
}

/// Platform event subscriptions.
pub trait EventPort {
    /// Listen to `source`; events are reported tagged with `attempt`.
    fn subscribe(&mut self, source: SignalSource, attempt: AttemptId) -> SubscriptionId;
    /// Stop listening. Unknown ids are a no-op.
    fn unsubscribe(&mut self, id: SubscriptionId);
}

/// Everything the controller needs from its host.
pub trait Platform: EnvironmentPort + MediaPort + ViewerPort + TimerPort + EventPort {}

impl<T> Platform for T where T: EnvironmentPort + MediaPort + ViewerPort + TimerPort + EventPort {}
