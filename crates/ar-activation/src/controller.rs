// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The activation orchestrator.
//!
//! [`ActivationController`] sequences permission → asset readiness →
//! platform AR invocation → presenting → teardown. It never blocks and owns
//! no clock: every platform call returns immediately and its completion comes
//! back through [`ActivationController::dispatch`] tagged with the
//! [`AttemptId`] it was issued for.
//!
//! # Invariants
//!
//! - At most one [`ActivationSession`] exists. Starting a new attempt ends the
//!   previous session first.
//! - A session is ended by taking it out of the controller, so of several
//!   racing end signals only the first has anything to tear down.
//! - Signals tagged with any attempt other than the live one are discarded.
//! - The viewer element is fullscreen only while `Presenting`; the visual
//!   state is re-applied only when it changes.

use ar_app_core::{ActivationSettings, RetapPolicy};
use ar_platform_port::{
    ArMode, AssetReference, AttemptId, ElementVisibility, PageVisibility, Platform,
    SessionStatus, Signal, SignalSource, TimerKind, TimerToken,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::capability::{CapabilityDetector, DeviceProfile};
use crate::observer::{ObserverId, StateObservers};
use crate::permission::PermissionGate;
use crate::presentation::{present, Dialog};
use crate::readiness::{AssetReadinessTracker, Readiness};
use crate::session::ActivationSession;
use crate::state::{ActivationState, EndCause, FailureReason, SessionEnd};
use crate::watchdog::{Watchdog, WatchdogVerdict};

/// Subscriptions registered when the platform AR entry point is invoked.
const SESSION_SOURCES: [SignalSource; 3] = [
    SignalSource::ViewerSessionStatus,
    SignalSource::VisibilityChange,
    SignalSource::PageShow,
];

/// Why a tap did not start an attempt.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum StartRejected {
    /// An attempt is live and the re-tap policy is `reject`.
    #[error("{attempt} is still in progress")]
    Busy {
        /// The live attempt.
        attempt: AttemptId,
    },
    /// [`ActivationController::shutdown`] was called.
    #[error("controller has been shut down")]
    ShutDown,
}

/// AR activation state machine over a [`Platform`].
#[derive(Debug)]
pub struct ActivationController<P: Platform> {
    platform: P,
    settings: ActivationSettings,
    detector: CapabilityDetector,
    gate: PermissionGate,
    state: ActivationState,
    dialog: Dialog,
    session: Option<ActivationSession>,
    last_attempt: AttemptId,
    observers: StateObservers,
    applied_visibility: ElementVisibility,
    last_end: Option<SessionEnd>,
    teardowns: u64,
    shut_down: bool,
}

impl<P: Platform> ActivationController<P> {
    /// Build a controller and install capability detection on `platform`.
    ///
    /// `settings` are used as given; validate them first
    /// ([`ActivationSettings::validate`]).
    pub fn new(mut platform: P, settings: ActivationSettings) -> Self {
        let mut detector = CapabilityDetector::new(settings.mobile_max_width_px);
        detector.install(&mut platform);
        Self {
            platform,
            settings,
            detector,
            gate: PermissionGate::new(),
            state: ActivationState::Idle,
            dialog: Dialog::None,
            session: None,
            last_attempt: AttemptId::PAGE,
            observers: StateObservers::default(),
            applied_visibility: ElementVisibility::Hidden,
            last_end: None,
            teardowns: 0,
            shut_down: false,
        }
    }

    // ─── Commands ────────────────────────────────────────────────────────

    /// Handle a user tap on the AR button.
    ///
    /// Progress is reported to observers. A device that is not mobile fails
    /// immediately with [`FailureReason::Unsupported`]. A tap while a session
    /// is live supersedes it or is rejected, per [`RetapPolicy`]. A tap while
    /// failed acknowledges the failure and starts over.
    pub fn start_activation(&mut self, asset: AssetReference) -> Result<AttemptId, StartRejected> {
        if self.shut_down {
            return Err(StartRejected::ShutDown);
        }
        if let Some(live) = self.current_attempt() {
            match self.settings.retap {
                RetapPolicy::Reject => {
                    debug!(attempt = %live, "tap rejected while busy");
                    return Err(StartRejected::Busy { attempt: live });
                }
                RetapPolicy::Supersede => self.end_session(EndCause::Superseded),
            }
        }
        if self.state.failure().is_some() {
            self.transition(ActivationState::Idle);
        }

        let attempt = self.last_attempt.next();
        self.last_attempt = attempt;
        let profile = self.detector.detect();
        if !profile.is_mobile {
            info!(%attempt, "ar is not available on this device");
            self.last_end = Some(SessionEnd {
                attempt,
                cause: EndCause::Failed(FailureReason::Unsupported),
            });
            self.transition(ActivationState::Failed(FailureReason::Unsupported));
            return Ok(attempt);
        }

        info!(
            %attempt,
            model = %asset.model_url,
            ios = profile.is_ios,
            webxr = profile.supports_webxr,
            "activation started"
        );
        self.session = Some(ActivationSession::new(attempt, asset, profile));
        self.transition(ActivationState::AwaitingPermission);
        if let Err(err) = self.gate.request(&mut self.platform, attempt) {
            self.fail(err.into());
        }
        Ok(attempt)
    }

    /// Abort whatever is in progress and return to `Idle`.
    ///
    /// A no-op from `Idle`; calling it twice is the same as calling it once.
    pub fn cancel(&mut self) {
        if self.session.is_some() {
            self.end_session(EndCause::Cancelled);
        } else if self.state.failure().is_some() {
            self.transition(ActivationState::Idle);
        }
    }

    /// Dismiss the error dialog. Returns `false` when not failed.
    pub fn acknowledge(&mut self) -> bool {
        if self.state.failure().is_none() {
            return false;
        }
        self.transition(ActivationState::Idle);
        true
    }

    /// The user pressed "Start AR" in the instructions dialog.
    ///
    /// Only meaningful with `require_start_confirmation`; returns `false`
    /// outside `AwaitingAssetReady`.
    pub fn confirm_start(&mut self) -> bool {
        if self.state != ActivationState::AwaitingAssetReady {
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        session.confirmed = true;
        self.maybe_invoke();
        true
    }

    /// End any session, remove the page-lifetime listeners and refuse further
    /// taps. Idempotent.
    pub fn shutdown(&mut self) {
        if self.session.is_some() {
            self.end_session(EndCause::Shutdown);
        }
        if self.state.failure().is_some() {
            self.transition(ActivationState::Idle);
        }
        self.detector.uninstall(&mut self.platform);
        if !self.shut_down {
            info!("activation controller shut down");
        }
        self.shut_down = true;
    }

    /// Register a state-change callback. It is called at once with the
    /// current state, then on every change.
    pub fn on_state_change<F>(&mut self, callback: F) -> ObserverId
    where
        F: FnMut(&ActivationState, &Dialog) + 'static,
    {
        self.observers.subscribe(callback, &self.state, &self.dialog)
    }

    /// Remove a state-change callback.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        self.observers.unsubscribe(id)
    }

    // ─── Signals ─────────────────────────────────────────────────────────

    /// Feed one platform completion or event into the state machine.
    pub fn dispatch(&mut self, signal: Signal) {
        match signal {
            Signal::WebXrProbed { supported } => self.detector.on_webxr_probed(supported),
            Signal::ViewportResized { width } => self.detector.on_viewport_resized(width),
            Signal::VideoStream { attempt, result } => {
                // Released even when stale.
                let outcome = self.gate.settle(result);
                if self.accepts(attempt, &ActivationState::AwaitingPermission) {
                    match outcome {
                        Ok(()) => self.on_permission_granted(),
                        Err(err) => self.fail(err.into()),
                    }
                }
            }
            Signal::ActivationSettled { attempt, result } => {
                if !self.is_current(attempt) {
                    return;
                }
                let invoking = self.state == ActivationState::Invoking;
                let presenting = self.state == ActivationState::Presenting;
                match result {
                    Ok(()) if invoking => self.enter_presenting(),
                    Ok(()) => {}
                    Err(err) if invoking || presenting => {
                        self.fail(FailureReason::ActivationRejected {
                            platform_message: err.to_string(),
                        });
                    }
                    Err(err) => debug!(%attempt, %err, state = %self.state, "late activation rejection ignored"),
                }
            }
            Signal::TimerFired(token) => self.on_timer(token),
            Signal::ViewerLoaded { attempt } => {
                if self.accepts(attempt, &ActivationState::AwaitingAssetReady) {
                    self.on_asset_loaded();
                }
            }
            Signal::SessionStatus { attempt, status } => {
                if self.is_current(attempt) {
                    self.on_session_status(status);
                }
            }
            Signal::VisibilityChanged { attempt, visibility } => {
                if visibility == PageVisibility::Visible
                    && self.accepts(attempt, &ActivationState::Presenting)
                {
                    self.end_session(EndCause::PageVisible);
                }
            }
            Signal::PageShow { attempt, persisted } => {
                if self.accepts(attempt, &ActivationState::Presenting) {
                    debug!(%attempt, persisted, "pageshow while presenting");
                    self.end_session(EndCause::PageShow);
                }
            }
        }
    }

    fn on_permission_granted(&mut self) {
        self.transition(ActivationState::AwaitingAssetReady);
        let timeout_ms = self.settings.asset_timeout_ms;
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let mut tracker = AssetReadinessTracker::new(session.attempt, timeout_ms);
        let readiness = tracker.await_ready(&mut self.platform, &mut session.resources, &session.asset);
        session.readiness = Some(tracker);
        match readiness {
            Ok(Readiness::Ready) => {
                session.asset_ready = true;
                self.maybe_invoke();
            }
            Ok(Readiness::Pending) => {}
            Err(err) => {
                warn!(%err, "viewer element unavailable");
                self.fail(FailureReason::Unsupported);
            }
        }
    }

    fn on_asset_loaded(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let Some(tracker) = session.readiness.as_mut() else {
            return;
        };
        if tracker.on_loaded(&mut self.platform, &mut session.resources) {
            session.asset_ready = true;
            debug!(attempt = %session.attempt, "asset loaded");
            self.maybe_invoke();
        }
    }

    fn on_timer(&mut self, token: TimerToken) {
        if !self.is_current(token.attempt) {
            return;
        }
        match token.kind {
            TimerKind::AssetTimeout => {
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                let mut timed_out = None;
                if let Some(tracker) = session.readiness.as_mut() {
                    timed_out = tracker.on_timeout(&mut self.platform, &mut session.resources);
                }
                if let Some(err) = timed_out {
                    info!(attempt = %token.attempt, %err, "asset readiness timed out");
                    self.fail(FailureReason::AssetTimeout);
                }
            }
            TimerKind::WatchdogPoll | TimerKind::SessionCeiling => {
                if self.state != ActivationState::Presenting {
                    return;
                }
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                let Some(watchdog) = session.watchdog.as_mut() else {
                    return;
                };
                match watchdog.on_timer(token.kind, &self.platform) {
                    WatchdogVerdict::Alive => {}
                    WatchdogVerdict::Inactive => self.end_session(EndCause::WatchdogInactive),
                    WatchdogVerdict::CeilingReached => self.end_session(EndCause::Ceiling),
                }
            }
        }
    }

    fn on_session_status(&mut self, status: SessionStatus) {
        match status {
            SessionStatus::Presenting if self.state == ActivationState::Invoking => {
                self.enter_presenting();
            }
            SessionStatus::NotPresenting if self.state == ActivationState::Presenting => {
                self.end_session(EndCause::ViewerStatus);
            }
            SessionStatus::Failed
                if matches!(
                    self.state,
                    ActivationState::Invoking | ActivationState::Presenting
                ) =>
            {
                self.fail(FailureReason::ActivationRejected {
                    platform_message: "viewer reported a failed session".into(),
                });
            }
            other => debug!(status = ?other, state = %self.state, "session status ignored"),
        }
    }

    // ─── Transitions ─────────────────────────────────────────────────────

    fn maybe_invoke(&mut self) {
        let Some(session) = self.session.as_ref() else {
            return;
        };
        let confirmed = session.confirmed || !self.settings.require_start_confirmation;
        if self.state == ActivationState::AwaitingAssetReady && session.asset_ready && confirmed {
            self.invoke();
        }
    }

    fn invoke(&mut self) {
        self.transition(ActivationState::Invoking);
        let Some(session) = self.session.as_mut() else {
            return;
        };
        for source in SESSION_SOURCES {
            session.resources.subscribe(&mut self.platform, source);
        }
        let attempt = session.attempt;
        let mode = match (session.profile.is_ios, session.asset.ios_model_url.clone()) {
            (true, Some(url)) => {
                match self.platform.open_quick_look(&url) {
                    Ok(()) => {
                        info!(%attempt, %url, "handed off to quick look");
                        self.enter_presenting();
                    }
                    Err(err) => self.fail(FailureReason::ActivationRejected {
                        platform_message: err.to_string(),
                    }),
                }
                return;
            }
            // Without a USDZ the viewer converts the model for Quick Look.
            (true, None) => ArMode::QuickLook,
            (false, _) if session.profile.supports_webxr => ArMode::WebXr,
            (false, _) => ArMode::SceneViewer,
        };
        debug!(%attempt, mode = mode.as_attr(), "activating viewer");
        self.platform.activate(mode, attempt);
    }

    fn enter_presenting(&mut self) {
        let watchdog = self.settings.watchdog;
        if let Some(session) = self.session.as_mut() {
            if session.watchdog.is_none() {
                session.watchdog = Some(Watchdog::arm(
                    &mut self.platform,
                    &mut session.resources,
                    watchdog,
                ));
            }
        }
        self.transition(ActivationState::Presenting);
        info!(attempt = %self.last_attempt, "ar session presenting");
    }

    fn fail(&mut self, reason: FailureReason) {
        info!(attempt = %self.last_attempt, %reason, "activation failed");
        self.teardown(
            EndCause::Failed(reason.clone()),
            ActivationState::Failed(reason),
        );
    }

    fn end_session(&mut self, cause: EndCause) {
        self.teardown(cause, ActivationState::Idle);
    }

    /// The single exit point of a session.
    fn teardown(&mut self, cause: EndCause, terminal: ActivationState) {
        let Some(session) = self.session.take() else {
            return;
        };
        let attempt = session.attempt;
        if terminal == ActivationState::Idle {
            self.transition(ActivationState::TearingDown);
        }
        let released = session.release(&mut self.platform);
        self.teardowns += 1;
        info!(
            %attempt,
            ?cause,
            subscriptions = released.subscriptions,
            timers = released.timers,
            "session ended"
        );
        self.last_end = Some(SessionEnd { attempt, cause });
        self.transition(terminal);
    }

    fn transition(&mut self, next: ActivationState) {
        if self.state == next {
            return;
        }
        debug!(attempt = %self.last_attempt, from = %self.state, to = %next, "transition");
        self.state = next;
        let visibility = self.state.element_visibility();
        if visibility != self.applied_visibility {
            self.platform.set_visibility(visibility);
            self.applied_visibility = visibility;
        }
        let profile = self
            .session
            .as_ref()
            .map_or_else(|| self.detector.detect(), |session| session.profile);
        self.dialog = present(&self.state, &profile);
        self.observers.notify(&self.state, &self.dialog);
    }

    fn is_current(&self, attempt: AttemptId) -> bool {
        let current = self.current_attempt() == Some(attempt);
        if !current {
            debug!(%attempt, live = ?self.current_attempt(), "discarding stale signal");
        }
        current
    }

    fn accepts(&self, attempt: AttemptId, expected: &ActivationState) -> bool {
        self.is_current(attempt) && self.state == *expected
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    /// Current state.
    pub fn state(&self) -> &ActivationState {
        &self.state
    }

    /// Dialog for the current state.
    pub fn dialog(&self) -> &Dialog {
        &self.dialog
    }

    /// Current device profile.
    pub fn device_profile(&self) -> DeviceProfile {
        self.detector.detect()
    }

    /// The live attempt, if a session exists.
    pub fn current_attempt(&self) -> Option<AttemptId> {
        self.session.as_ref().map(|s| s.attempt)
    }

    /// Subscriptions held by the live session.
    pub fn live_subscriptions(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |s| s.resources.live_subscriptions())
    }

    /// How the most recent session ended.
    pub fn last_session_end(&self) -> Option<&SessionEnd> {
        self.last_end.as_ref()
    }

    /// Number of sessions torn down so far.
    pub fn teardown_count(&self) -> u64 {
        self.teardowns
    }

    /// Settings in effect.
    pub fn settings(&self) -> &ActivationSettings {
        &self.settings
    }

    /// The platform adapter.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// The platform adapter, mutably (hosts use this to deliver events).
    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }
}
