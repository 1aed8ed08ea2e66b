// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Identifier types shared between the controller and platform adapters.

use std::fmt;

/// Monotonic identifier of one user-initiated activation attempt.
///
/// `AttemptId::PAGE` (zero) is reserved for page-lifetime registrations such
/// as the viewport resize listener; real attempts start at one.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AttemptId(pub u64);

impl AttemptId {
    /// Page-lifetime scope; never a live attempt.
    pub const PAGE: Self = Self(0);

    /// The id following this one.
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Whether this id names a page-lifetime registration.
    pub fn is_page(self) -> bool {
        self == Self::PAGE
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attempt#{}", self.0)
    }
}

/// Handle returned by [`crate::EventPort::subscribe`].
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle returned by [`crate::TimerPort`] when a timer is armed.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);
