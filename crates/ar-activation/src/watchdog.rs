// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Session watchdog: detects a presenting session that ended silently.
//!
//! Two timers run while presenting. The poll interval reads the platform's
//! AR-active flag; the ceiling fires once after the maximum session length
//! regardless of what the flag says. Both are cleared by [`Watchdog::dispose`].
//!
//! The platform hand-off takes a moment to raise the flag, so an inactive
//! reading only counts once the flag has been seen active at least once or
//! the activation grace period has been spent polling.

use ar_app_core::WatchdogSettings;
use ar_platform_port::{TimerId, TimerKind, TimerPort, ViewerPort};
use tracing::debug;

use crate::session::SessionResources;

/// Result of a watchdog timer firing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WatchdogVerdict {
    /// The session still looks alive (or the timer was not ours).
    Alive,
    /// The AR-active flag dropped.
    Inactive,
    /// The maximum session duration elapsed.
    CeilingReached,
}

/// Poll + ceiling timers for one presenting session.
#[derive(Debug)]
pub struct Watchdog {
    settings: WatchdogSettings,
    poll: Option<TimerId>,
    ceiling: Option<TimerId>,
    polls: u32,
    seen_active: bool,
}

impl Watchdog {
    /// Arm both timers through the session's resources.
    pub fn arm<T: TimerPort + ?Sized>(
        timers: &mut T,
        resources: &mut SessionResources,
        settings: WatchdogSettings,
    ) -> Self {
        let poll = resources.arm_interval(timers, settings.poll_interval_ms, TimerKind::WatchdogPoll);
        let ceiling = resources.arm_timeout(timers, settings.max_session_ms, TimerKind::SessionCeiling);
        debug!(
            attempt = %resources.attempt(),
            poll_ms = settings.poll_interval_ms,
            ceiling_ms = settings.max_session_ms,
            "watchdog armed"
        );
        Self {
            settings,
            poll: Some(poll),
            ceiling: Some(ceiling),
            polls: 0,
            seen_active: false,
        }
    }

    /// Whether either timer is still armed.
    pub fn is_armed(&self) -> bool {
        self.poll.is_some() || self.ceiling.is_some()
    }

    /// Handle one of the watchdog's timers firing.
    pub fn on_timer<V: ViewerPort + ?Sized>(&mut self, kind: TimerKind, viewer: &V) -> WatchdogVerdict {
        match kind {
            TimerKind::WatchdogPoll if self.poll.is_some() => self.on_poll(viewer.is_ar_active()),
            TimerKind::SessionCeiling if self.ceiling.is_some() => WatchdogVerdict::CeilingReached,
            _ => WatchdogVerdict::Alive,
        }
    }

    fn on_poll(&mut self, active: bool) -> WatchdogVerdict {
        self.polls = self.polls.saturating_add(1);
        if active {
            self.seen_active = true;
            return WatchdogVerdict::Alive;
        }
        let polled_ms = u64::from(self.polls) * u64::from(self.settings.poll_interval_ms);
        if self.seen_active || polled_ms >= u64::from(self.settings.activation_grace_ms) {
            WatchdogVerdict::Inactive
        } else {
            WatchdogVerdict::Alive
        }
    }

    /// Clear both timers. Returns how many were still armed. Idempotent.
    pub fn dispose<T: TimerPort + ?Sized>(
        &mut self,
        timers: &mut T,
        resources: &mut SessionResources,
    ) -> usize {
        [self.poll.take(), self.ceiling.take()]
            .into_iter()
            .flatten()
            .filter(|id| resources.clear_timer(timers, *id))
            .count()
    }
}
