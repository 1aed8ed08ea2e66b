// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! AR Web: WASM bindings for the AR activation controller.
//!
//! Wraps [`ar_activation::ActivationController`] over a `web-sys` platform
//! adapter and exposes it to JavaScript as `ArController`.
//!
//! # Usage (from JavaScript)
//!
//! ```js
//! import init, { ArController } from 'ar-web';
//!
//! await init();
//! const ar = new ArController({ asset_timeout_ms: 15000 });
//!
//! ar.onStateChange(({ state, recoverable, dialog }) => render(state, recoverable, dialog));
//! button.onclick = () => ar.startActivation('/models/grass.glb', '/models/grass.usdz');
//! window.addEventListener('pagehide', () => ar.dispose());
//! ```
//!
//! # Layout
//!
//! - [`dom`]: element/event vocabulary and event-to-signal translation.
//! - [`host`]: re-entrancy-safe inbox in front of the controller.
//! - `platform` (wasm32 only): the `web-sys` adapter.
//! - `bindings` (wasm32 only): the `#[wasm_bindgen]` class.
//!
//! `dom` and `host` are target-independent and tested natively against the
//! mock platform.
//!
//! # Features
//!
//! - `console-panic`: forward panics to `console.error`.
//! - `console-log`: install a `tracing` subscriber that writes controller
//!   events to the browser console when the first `ArController` is built.

#![deny(missing_docs)]

pub mod dom;
pub mod host;

#[cfg(target_arch = "wasm32")]
mod bindings;
#[cfg(target_arch = "wasm32")]
mod platform;

#[cfg(target_arch = "wasm32")]
pub use bindings::ArController;
#[cfg(target_arch = "wasm32")]
pub use platform::WebPlatform;

pub use host::{Command, ControllerHost, SignalSink, StateHub, StateView};
