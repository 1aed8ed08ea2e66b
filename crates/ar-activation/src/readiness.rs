// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Asset readiness: wait (bounded) for the viewer to report its model loaded.

use ar_platform_port::{
    AssetReference, AttemptId, EventPort, PlatformError, SignalSource, SubscriptionId, TimerId,
    TimerKind, TimerPort, ViewerPort,
};
use thiserror::Error;
use tracing::debug;

use crate::session::{ReleaseSummary, SessionResources};

/// The model did not load within the budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("asset not ready after {waited_ms} ms")]
pub struct TimeoutError {
    /// Budget that elapsed.
    pub waited_ms: u32,
}

/// Outcome of [`AssetReadinessTracker::await_ready`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// Already loaded at call time.
    Ready,
    /// Waiting for the load signal or the timeout.
    Pending,
}

/// Tracks one bounded wait for the viewer's load signal.
#[derive(Debug)]
pub struct AssetReadinessTracker {
    attempt: AttemptId,
    timeout_ms: u32,
    load_subscription: Option<SubscriptionId>,
    timer: Option<TimerId>,
    settled: bool,
}

impl AssetReadinessTracker {
    /// Tracker for `attempt` with a `timeout_ms` budget.
    pub fn new(attempt: AttemptId, timeout_ms: u32) -> Self {
        Self {
            attempt,
            timeout_ms,
            load_subscription: None,
            timer: None,
            settled: false,
        }
    }

    /// Ensure the element exists, point it at `asset` and start waiting.
    ///
    /// The loaded flag is only trusted when the element already pointed at
    /// this model: a model that loaded earlier resolves without waiting for
    /// an event that already fired. After a source change the flag may still
    /// describe the previous model, so the wait always arms.
    pub fn await_ready<P>(
        &mut self,
        platform: &mut P,
        resources: &mut SessionResources,
        asset: &AssetReference,
    ) -> Result<Readiness, PlatformError>
    where
        P: ViewerPort + EventPort + TimerPort + ?Sized,
    {
        platform.ensure_element()?;
        let unchanged = platform.current_source().as_deref() == Some(asset.model_url.as_str());
        platform.attach_source(asset);
        if unchanged && platform.is_loaded() {
            self.settled = true;
            debug!(attempt = %self.attempt, "asset already loaded");
            return Ok(Readiness::Ready);
        }
        self.load_subscription = Some(resources.subscribe(platform, SignalSource::ViewerLoad));
        self.timer = Some(resources.arm_timeout(platform, self.timeout_ms, TimerKind::AssetTimeout));
        debug!(attempt = %self.attempt, timeout_ms = self.timeout_ms, "waiting for asset");
        Ok(Readiness::Pending)
    }

    /// The load signal arrived. Returns `false` if the wait had already
    /// settled.
    pub fn on_loaded<P>(&mut self, platform: &mut P, resources: &mut SessionResources) -> bool
    where
        P: EventPort + TimerPort + ?Sized,
    {
        if self.settled {
            return false;
        }
        self.dispose(platform, resources);
        true
    }

    /// The timeout fired. Returns `None` if the wait had already settled.
    pub fn on_timeout<P>(
        &mut self,
        platform: &mut P,
        resources: &mut SessionResources,
    ) -> Option<TimeoutError>
    where
        P: EventPort + TimerPort + ?Sized,
    {
        if self.settled {
            return None;
        }
        self.dispose(platform, resources);
        Some(TimeoutError {
            waited_ms: self.timeout_ms,
        })
    }

    /// Whether the wait is over (loaded, timed out or disposed).
    pub fn is_settled(&self) -> bool {
        self.settled
    }

    /// Drop the load subscription and the timer. Idempotent.
    pub fn dispose<P>(&mut self, platform: &mut P, resources: &mut SessionResources) -> ReleaseSummary
    where
        P: EventPort + TimerPort + ?Sized,
    {
        self.settled = true;
        let mut summary = ReleaseSummary::default();
        if let Some(id) = self.load_subscription.take() {
            if resources.unsubscribe(platform, id) {
                summary.subscriptions += 1;
            }
        }
        if let Some(id) = self.timer.take() {
            if resources.clear_timer(platform, id) {
                summary.timers += 1;
            }
        }
        summary
    }
}
