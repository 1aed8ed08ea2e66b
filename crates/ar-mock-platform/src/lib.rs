// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Headless test harness for the AR platform ports.
//!
//! This crate provides:
//! - [`MockPlatform`], implementing every port in `ar-platform-port` by
//!   recording calls in plain collections
//! - a virtual clock driving one-shot and interval timers
//! - [`MockStream`], a media stream whose open tracks are tracked in a shared
//!   ledger so leaked camera tracks are observable
//!
//! # Design
//!
//! The mock never calls back into the controller. Tests (or the `ar-sim`
//! harness) read what was requested, decide what the "browser" does, and
//! dispatch the matching `Signal`s themselves.

mod media;
mod mock_platform;

pub use media::{MediaLedger, MockStream};
pub use mock_platform::{MockPlatform, MockTimer, ANDROID_UA, DESKTOP_UA, IPHONE_UA};
