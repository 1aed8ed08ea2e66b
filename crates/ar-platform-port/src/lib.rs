// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Platform port contract for the AR activation controller.
//!
//! This crate defines the boundary between the activation state machine and
//! whatever hosts it (a browser via `web-sys`, or a headless mock). It
//! contains NO activation logic; that lives in `ar-activation`.
//!
//! # Design Principles
//!
//! - **Adapters are dumb**: they forward requests to the platform and report
//!   completions back as [`Signal`]s. They never decide state.
//! - **No time ownership**: the controller never reads a clock. Timers are
//!   requested through [`TimerPort`] and come back as [`Signal::TimerFired`].
//! - **Attempt-scoped callbacks**: every asynchronous request, subscription
//!   and timer carries the [`AttemptId`] it was issued for, so completions from
//!   a superseded attempt can be discarded by the controller.
//!
//! # Crate Features
//!
//! - `serde`: derives `Serialize`/`Deserialize` for the value types
//!   ([`AssetReference`], [`Placement`], [`SessionStatus`], ...).

use thiserror::Error;

/// Error reported by a platform call, shaped after a DOM exception.
///
/// `name` is the exception name (`NotAllowedError`, `NotFoundError`, ...) and
/// is the only part the controller classifies on. `message` is free text kept
/// for logs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct PlatformError {
    /// Exception name.
    pub name: String,
    /// Human-readable detail from the platform.
    pub message: String,
}

impl PlatformError {
    /// Build an error from a name and message.
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Error used when a platform API is missing entirely.
    pub fn unavailable(api: &str) -> Self {
        Self::new("NotSupportedError", format!("{api} is not available"))
    }
}

mod asset;
mod ids;
mod port;
mod signal;

pub use asset::{AssetReference, Placement};
pub use ids::{AttemptId, SubscriptionId, TimerId};
pub use port::{
    EnvironmentPort, EventPort, MediaPort, MediaStream, Platform, TimerPort, ViewerPort,
};
pub use signal::{
    ArMode, ElementVisibility, PageVisibility, SessionStatus, Signal, SignalSource, TimerKind,
    TimerToken,
};
