// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! AR activation scenario harness.
//!
//! Replays scripted user and browser events against the activation controller
//! on a mock platform with a virtual clock, records the observed state trace
//! and checks it against expectations, lifecycle invariants and golden traces.

pub mod cli;
pub mod scenario;
pub mod sim;

pub use scenario::{DeviceKind, DeviceSpec, Expectation, Scenario, ScriptedEvent, TimedEvent};
pub use sim::{run_scenario, SimReport, Simulation, TraceEntry};
