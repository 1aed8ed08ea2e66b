// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! One activation attempt and the platform resources it owns.
//!
//! # Invariants
//!
//! - Every subscription and timer registered for an attempt goes through its
//!   [`SessionResources`], so releasing the resources revokes all of them.
//! - [`ActivationSession::release`] consumes the session: a session can only
//!   be torn down once.

use std::collections::BTreeMap;

use ar_platform_port::{
    AssetReference, AttemptId, EventPort, SignalSource, SubscriptionId, TimerId, TimerKind,
    TimerPort, TimerToken,
};
use tracing::error;

use crate::capability::DeviceProfile;
use crate::readiness::AssetReadinessTracker;
use crate::watchdog::Watchdog;

/// Counts of what a release revoked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReleaseSummary {
    /// Subscriptions removed.
    pub subscriptions: usize,
    /// Timers cleared.
    pub timers: usize,
}

/// Subscriptions and timers registered on behalf of one attempt.
#[derive(Debug)]
pub struct SessionResources {
    attempt: AttemptId,
    subscriptions: BTreeMap<SubscriptionId, SignalSource>,
    timers: BTreeMap<TimerId, TimerKind>,
}

impl SessionResources {
    /// Empty ledger for `attempt`.
    pub fn new(attempt: AttemptId) -> Self {
        Self {
            attempt,
            subscriptions: BTreeMap::new(),
            timers: BTreeMap::new(),
        }
    }

    /// Attempt the resources belong to.
    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Subscribe to `source` tagged with this attempt.
    pub fn subscribe<E: EventPort + ?Sized>(
        &mut self,
        events: &mut E,
        source: SignalSource,
    ) -> SubscriptionId {
        let id = events.subscribe(source, self.attempt);
        self.subscriptions.insert(id, source);
        id
    }

    /// Remove one subscription. Returns `false` if it was not held.
    pub fn unsubscribe<E: EventPort + ?Sized>(&mut self, events: &mut E, id: SubscriptionId) -> bool {
        if self.subscriptions.remove(&id).is_some() {
            events.unsubscribe(id);
            true
        } else {
            false
        }
    }

    /// Arm a one-shot timer of `kind`.
    pub fn arm_timeout<T: TimerPort + ?Sized>(
        &mut self,
        timers: &mut T,
        delay_ms: u32,
        kind: TimerKind,
    ) -> TimerId {
        let id = timers.set_timeout(delay_ms, self.token(kind));
        self.timers.insert(id, kind);
        id
    }

    /// Arm a recurring timer of `kind`.
    pub fn arm_interval<T: TimerPort + ?Sized>(
        &mut self,
        timers: &mut T,
        period_ms: u32,
        kind: TimerKind,
    ) -> TimerId {
        let id = timers.set_interval(period_ms, self.token(kind));
        self.timers.insert(id, kind);
        id
    }

    /// Clear one timer. Returns `false` if it was not held.
    pub fn clear_timer<T: TimerPort + ?Sized>(&mut self, timers: &mut T, id: TimerId) -> bool {
        if self.timers.remove(&id).is_some() {
            timers.clear_timer(id);
            true
        } else {
            false
        }
    }

    /// Revoke everything still held.
    pub fn release_all<P: EventPort + TimerPort + ?Sized>(&mut self, platform: &mut P) -> ReleaseSummary {
        let subscriptions = std::mem::take(&mut self.subscriptions);
        let timers = std::mem::take(&mut self.timers);
        for id in subscriptions.keys() {
            platform.unsubscribe(*id);
        }
        for id in timers.keys() {
            platform.clear_timer(*id);
        }
        ReleaseSummary {
            subscriptions: subscriptions.len(),
            timers: timers.len(),
        }
    }

    /// Subscriptions currently held.
    pub fn live_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    /// Timers currently held.
    pub fn live_timers(&self) -> usize {
        self.timers.len()
    }

    /// Whether a subscription to `source` is held.
    pub fn is_subscribed(&self, source: SignalSource) -> bool {
        self.subscriptions.values().any(|s| *s == source)
    }

    fn token(&self, kind: TimerKind) -> TimerToken {
        TimerToken {
            attempt: self.attempt,
            kind,
        }
    }
}

impl Drop for SessionResources {
    fn drop(&mut self) {
        if !self.subscriptions.is_empty() || !self.timers.is_empty() {
            error!(
                attempt = %self.attempt,
                subscriptions = self.subscriptions.len(),
                timers = self.timers.len(),
                "session resources dropped without release"
            );
        }
    }
}

/// State owned by one user-initiated attempt.
#[derive(Debug)]
pub struct ActivationSession {
    /// Attempt identity.
    pub attempt: AttemptId,
    /// Asset being presented.
    pub asset: AssetReference,
    /// Device profile captured at tap time.
    pub profile: DeviceProfile,
    /// Platform registrations owned by the attempt.
    pub resources: SessionResources,
    /// Readiness wait, while one is in progress.
    pub readiness: Option<AssetReadinessTracker>,
    /// Watchdog, once presenting.
    pub watchdog: Option<Watchdog>,
    /// The viewer reported the model loaded.
    pub asset_ready: bool,
    /// The user confirmed the instructions.
    pub confirmed: bool,
}

impl ActivationSession {
    /// Fresh session for `attempt`.
    pub fn new(attempt: AttemptId, asset: AssetReference, profile: DeviceProfile) -> Self {
        Self {
            attempt,
            asset,
            profile,
            resources: SessionResources::new(attempt),
            readiness: None,
            watchdog: None,
            asset_ready: false,
            confirmed: false,
        }
    }

    /// Dispose the tracker and watchdog, then revoke every remaining
    /// registration.
    pub fn release<P: EventPort + TimerPort + ?Sized>(mut self, platform: &mut P) -> ReleaseSummary {
        let mut summary = ReleaseSummary::default();
        if let Some(mut tracker) = self.readiness.take() {
            let freed = tracker.dispose(platform, &mut self.resources);
            summary.subscriptions += freed.subscriptions;
            summary.timers += freed.timers;
        }
        if let Some(mut watchdog) = self.watchdog.take() {
            summary.timers += watchdog.dispose(platform, &mut self.resources);
        }
        let rest = self.resources.release_all(platform);
        summary.subscriptions += rest.subscriptions;
        summary.timers += rest.timers;
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Ledger {
        next: u64,
        subscribed: BTreeMap<SubscriptionId, (SignalSource, AttemptId)>,
        timers: BTreeMap<TimerId, TimerToken>,
        cleared: Vec<TimerId>,
    }

    impl EventPort for Ledger {
        fn subscribe(&mut self, source: SignalSource, attempt: AttemptId) -> SubscriptionId {
            self.next += 1;
            let id = SubscriptionId(self.next);
            self.subscribed.insert(id, (source, attempt));
            id
        }

        fn unsubscribe(&mut self, id: SubscriptionId) {
            self.subscribed.remove(&id);
        }
    }

    impl TimerPort for Ledger {
        fn set_timeout(&mut self, _delay_ms: u32, token: TimerToken) -> TimerId {
            self.next += 1;
            let id = TimerId(self.next);
            self.timers.insert(id, token);
            id
        }

        fn set_interval(&mut self, period_ms: u32, token: TimerToken) -> TimerId {
            self.set_timeout(period_ms, token)
        }

        fn clear_timer(&mut self, id: TimerId) {
            self.timers.remove(&id);
            self.cleared.push(id);
        }
    }

    #[test]
    fn release_all_revokes_everything_once() {
        let mut ledger = Ledger::default();
        let mut resources = SessionResources::new(AttemptId(3));
        resources.subscribe(&mut ledger, SignalSource::PageShow);
        resources.subscribe(&mut ledger, SignalSource::VisibilityChange);
        resources.arm_interval(&mut ledger, 1_000, TimerKind::WatchdogPoll);
        assert!(ledger.subscribed.values().all(|(_, a)| *a == AttemptId(3)));

        let summary = resources.release_all(&mut ledger);
        assert_eq!(summary, ReleaseSummary { subscriptions: 2, timers: 1 });
        assert!(ledger.subscribed.is_empty());
        assert!(ledger.timers.is_empty());

        let again = resources.release_all(&mut ledger);
        assert_eq!(again, ReleaseSummary::default());
        assert_eq!(ledger.cleared.len(), 1);
    }

    #[test]
    fn individual_removal_is_tracked() {
        let mut ledger = Ledger::default();
        let mut resources = SessionResources::new(AttemptId(1));
        let sub = resources.subscribe(&mut ledger, SignalSource::ViewerLoad);
        let timer = resources.arm_timeout(&mut ledger, 15_000, TimerKind::AssetTimeout);
        assert!(resources.is_subscribed(SignalSource::ViewerLoad));
        assert!(resources.unsubscribe(&mut ledger, sub));
        assert!(!resources.unsubscribe(&mut ledger, sub));
        assert!(resources.clear_timer(&mut ledger, timer));
        assert!(!resources.clear_timer(&mut ledger, timer));
        assert_eq!(resources.live_subscriptions(), 0);
        assert_eq!(resources.live_timers(), 0);
    }
}
