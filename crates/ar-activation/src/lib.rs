// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! AR activation controller.
//!
//! Takes an [`AssetReference`](ar_platform_port::AssetReference) and a user
//! tap and produces an on-device AR view, or a classified, recoverable
//! failure, across the WebXR / Scene Viewer and iOS Quick Look stacks.
//!
//! # Components
//!
//! | Module | Role |
//! |---|---|
//! | [`capability`] | Device class, OS family, WebXR availability |
//! | [`permission`] | Transient camera stream to surface the permission prompt |
//! | [`readiness`] | Bounded wait for the viewer's load signal |
//! | [`controller`] | The state machine and its single teardown point |
//! | [`watchdog`] | Poll + ceiling fallback for sessions that end silently |
//! | [`presentation`] | Pure state → dialog mapping |
//!
//! The controller talks to the browser only through the
//! [`Platform`](ar_platform_port::Platform) ports and is driven entirely by
//! [`ActivationController::dispatch`], so a headless adapter with virtual
//! timers runs it deterministically.

pub mod capability;
pub mod controller;
pub mod observer;
pub mod permission;
pub mod presentation;
pub mod readiness;
pub mod session;
pub mod state;
pub mod watchdog;

pub use capability::{CapabilityDetector, DeviceProfile, UserAgentHints};
pub use controller::{ActivationController, StartRejected};
pub use observer::{ObserverId, StateObservers};
pub use permission::{classify_media_error, PermissionError, PermissionGate};
pub use presentation::{failure_copy, instruction_steps, present, Dialog};
pub use readiness::{AssetReadinessTracker, Readiness, TimeoutError};
pub use session::{ActivationSession, ReleaseSummary, SessionResources};
pub use state::{ActivationState, EndCause, FailureReason, SessionEnd};
pub use watchdog::{Watchdog, WatchdogVerdict};
