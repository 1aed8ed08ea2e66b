// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Virtual-time driver for the activation controller.
//!
//! The mock platform owns the clock. Scripted events are applied in time
//! order; timers due strictly before an event fire first, timers due at the
//! same instant fire after it.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use anyhow::{bail, Result};
use ar_activation::{ActivationController, ActivationState, Dialog, EndCause};
use ar_app_core::ActivationSettings;
use ar_mock_platform::MockPlatform;
use ar_platform_port::{
    AssetReference, AttemptId, PageVisibility, PlatformError, SessionStatus, Signal, SignalSource,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::scenario::{Scenario, ScriptedEvent};

/// One observed state change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Virtual time of the change.
    pub at_ms: u64,
    /// State, as displayed (`failed(reason)` for failures).
    pub state: String,
    /// Dialog name.
    pub dialog: String,
    /// Error dialog title, when one shows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Live session subscriptions at the moment of the change.
    pub listeners: usize,
}

/// Outcome of a simulation run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimReport {
    /// Scenario name.
    pub scenario: String,
    /// Every observed state change, initial state first.
    pub trace: Vec<TraceEntry>,
    /// State at the end of the run.
    pub final_state: ActivationState,
    /// Dialog at the end of the run.
    pub final_dialog: Dialog,
    /// How the last session ended.
    pub end_cause: Option<EndCause>,
    /// Session subscriptions still registered at the end.
    pub live_session_subscriptions: usize,
    /// Timers still pending at the end.
    pub live_timers: usize,
    /// Camera tracks still open at the end.
    pub open_tracks: usize,
    /// Times the element left fullscreen.
    pub hide_count: usize,
    /// Sessions torn down.
    pub teardowns: u64,
    /// Taps refused by the controller.
    pub rejected_taps: usize,
}

impl SimReport {
    /// State names in observation order.
    pub fn states(&self) -> Vec<String> {
        self.trace.iter().map(|e| e.state.clone()).collect()
    }

    /// Dialog names with consecutive repeats collapsed.
    pub fn dialogs(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for entry in &self.trace {
            if out.last() != Some(&entry.dialog) {
                out.push(entry.dialog.clone());
            }
        }
        out
    }

    /// Title of the final dialog, if it is an error.
    pub fn final_dialog_title(&self) -> Option<&str> {
        match &self.final_dialog {
            Dialog::Error { title, .. } => Some(title),
            _ => None,
        }
    }

    /// Number of times the trace leaves `presenting`.
    pub fn presenting_exits(&self) -> usize {
        self.trace
            .windows(2)
            .filter(|w| w[0].state == "presenting" && w[1].state != "presenting")
            .count()
    }

    /// Resource and lifecycle invariants every run must satisfy.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        for entry in &self.trace {
            let settled = entry.state == "idle" || entry.state.starts_with("failed");
            if settled && entry.listeners != 0 {
                out.push(format!(
                    "{} listeners still registered on entering {} at {} ms",
                    entry.listeners, entry.state, entry.at_ms
                ));
            }
        }
        if !self.final_state.is_live() {
            if self.live_session_subscriptions != 0 {
                out.push(format!(
                    "{} session subscriptions orphaned",
                    self.live_session_subscriptions
                ));
            }
            if self.live_timers != 0 {
                out.push(format!("{} timers orphaned", self.live_timers));
            }
            if self.open_tracks != 0 {
                out.push(format!("{} camera tracks left open", self.open_tracks));
            }
        }
        let exits = self.presenting_exits();
        if self.hide_count != exits {
            out.push(format!(
                "element hidden {} times for {} presenting exits",
                self.hide_count, exits
            ));
        }
        out
    }
}

/// A controller on a mock platform, driven on virtual time.
#[derive(Debug)]
pub struct Simulation {
    name: String,
    controller: ActivationController<MockPlatform>,
    asset: AssetReference,
    trace: Rc<RefCell<Vec<TraceEntry>>>,
    clock: Rc<Cell<u64>>,
    rejected_taps: usize,
}

impl Simulation {
    /// Build the scenario's device and controller at t = 0.
    ///
    /// A scripted WebXR probe result on the device is delivered immediately.
    pub fn new(scenario: &Scenario, settings: ActivationSettings) -> Self {
        let platform = scenario.device.platform();
        let gauge = platform.session_subscription_gauge();
        let mut controller = ActivationController::new(platform, settings);

        let trace = Rc::new(RefCell::new(Vec::new()));
        let clock = Rc::new(Cell::new(0));
        {
            let trace = Rc::clone(&trace);
            let clock = Rc::clone(&clock);
            controller.on_state_change(move |state, dialog| {
                let title = match dialog {
                    Dialog::Error { title, .. } => Some(title.clone()),
                    _ => None,
                };
                trace.borrow_mut().push(TraceEntry {
                    at_ms: clock.get(),
                    state: state.to_string(),
                    dialog: dialog.name().to_owned(),
                    title,
                    listeners: gauge.get(),
                });
            });
        }
        if let Some(supported) = scenario.device.webxr {
            controller.dispatch(Signal::WebXrProbed { supported });
        }

        Self {
            name: scenario.name.clone(),
            controller,
            asset: scenario.asset.clone(),
            trace,
            clock,
            rejected_taps: 0,
        }
    }

    /// Current virtual time.
    pub fn now_ms(&self) -> u64 {
        self.controller.platform().now_ms()
    }

    /// The controller under test.
    pub fn controller(&self) -> &ActivationController<MockPlatform> {
        &self.controller
    }

    /// Fire every timer due at or before `until_ms`, in due order.
    pub fn run_until(&mut self, until_ms: u64) {
        while let Some(token) = self.controller.platform_mut().pop_due(until_ms) {
            self.sync_clock();
            debug!(at_ms = self.now_ms(), ?token, "timer fired");
            self.controller.dispatch(Signal::TimerFired(token));
        }
        self.sync_clock();
    }

    /// Fire timers due before `at_ms`, then move the clock to `at_ms`.
    pub fn step_to(&mut self, at_ms: u64) {
        if at_ms > 0 {
            self.run_until(at_ms - 1);
        }
        self.controller.platform_mut().advance_to(at_ms);
        self.sync_clock();
    }

    /// Apply one scripted event at the current time.
    pub fn apply(&mut self, event: &ScriptedEvent) -> Result<()> {
        debug!(at_ms = self.now_ms(), ?event, "scripted event");
        match event {
            ScriptedEvent::Tap => {
                if let Err(err) = self.controller.start_activation(self.asset.clone()) {
                    debug!(%err, "tap refused");
                    self.rejected_taps += 1;
                }
            }
            ScriptedEvent::Cancel => self.controller.cancel(),
            ScriptedEvent::Acknowledge => {
                self.controller.acknowledge();
            }
            ScriptedEvent::ConfirmStart => {
                self.controller.confirm_start();
            }
            ScriptedEvent::Shutdown => self.controller.shutdown(),
            ScriptedEvent::GrantCamera => {
                for attempt in self.controller.platform_mut().take_pending_streams() {
                    let stream = self.controller.platform().grant_stream();
                    self.controller.dispatch(Signal::VideoStream {
                        attempt,
                        result: Ok(stream),
                    });
                }
            }
            ScriptedEvent::DenyCamera { error_name } => {
                for attempt in self.controller.platform_mut().take_pending_streams() {
                    self.controller.dispatch(Signal::VideoStream {
                        attempt,
                        result: Err(PlatformError::new(error_name.as_str(), "camera request failed")),
                    });
                }
            }
            ScriptedEvent::ModelLoaded => {
                self.controller.platform_mut().finish_loading();
                for attempt in self.subscribers(SignalSource::ViewerLoad) {
                    self.controller.dispatch(Signal::ViewerLoaded { attempt });
                }
            }
            ScriptedEvent::ActivationResolves => {
                let settled = self.controller.platform_mut().take_pending_activations();
                if !settled.is_empty() {
                    self.controller.platform_mut().ar_active = true;
                }
                for (_, attempt) in settled {
                    self.controller.dispatch(Signal::ActivationSettled {
                        attempt,
                        result: Ok(()),
                    });
                }
            }
            ScriptedEvent::ActivationRejects {
                error_name,
                message,
            } => {
                for (_, attempt) in self.controller.platform_mut().take_pending_activations() {
                    self.controller.dispatch(Signal::ActivationSettled {
                        attempt,
                        result: Err(PlatformError::new(error_name.as_str(), message.as_str())),
                    });
                }
            }
            ScriptedEvent::ViewerStatus { status } => {
                let Some(parsed) = SessionStatus::from_wire(status) else {
                    bail!("unknown viewer status {status:?}");
                };
                self.controller.platform_mut().ar_active = parsed == SessionStatus::Presenting;
                for attempt in self.subscribers(SignalSource::ViewerSessionStatus) {
                    self.controller.dispatch(Signal::SessionStatus {
                        attempt,
                        status: parsed,
                    });
                }
            }
            ScriptedEvent::PageHidden => {
                self.controller.platform_mut().page_hidden = true;
                self.broadcast_visibility(PageVisibility::Hidden);
            }
            ScriptedEvent::PageVisible => {
                let platform = self.controller.platform_mut();
                platform.page_hidden = false;
                platform.ar_active = false;
                self.broadcast_visibility(PageVisibility::Visible);
            }
            ScriptedEvent::PageShow { persisted } => {
                let platform = self.controller.platform_mut();
                platform.page_hidden = false;
                platform.ar_active = false;
                for attempt in self.subscribers(SignalSource::PageShow) {
                    self.controller.dispatch(Signal::PageShow {
                        attempt,
                        persisted: *persisted,
                    });
                }
            }
            ScriptedEvent::ArInactive => self.controller.platform_mut().ar_active = false,
            ScriptedEvent::ArActive => self.controller.platform_mut().ar_active = true,
            ScriptedEvent::WebXrProbe { supported } => {
                self.controller.dispatch(Signal::WebXrProbed {
                    supported: *supported,
                });
            }
            ScriptedEvent::Resize { width } => {
                self.controller.platform_mut().viewport_width = *width;
                for _ in self.subscribers(SignalSource::ViewportResize) {
                    self.controller
                        .dispatch(Signal::ViewportResized { width: *width });
                }
            }
        }
        Ok(())
    }

    /// Snapshot the run so far.
    pub fn report(&self) -> SimReport {
        let platform = self.controller.platform();
        SimReport {
            scenario: self.name.clone(),
            trace: self.trace.borrow().clone(),
            final_state: self.controller.state().clone(),
            final_dialog: self.controller.dialog().clone(),
            end_cause: self.controller.last_session_end().map(|end| end.cause.clone()),
            live_session_subscriptions: platform.live_session_subscriptions(),
            live_timers: platform.live_timers(),
            open_tracks: platform.open_tracks(),
            hide_count: platform.hide_count(),
            teardowns: self.controller.teardown_count(),
            rejected_taps: self.rejected_taps,
        }
    }

    fn subscribers(&self, source: SignalSource) -> Vec<AttemptId> {
        self.controller.platform().subscribers(source)
    }

    fn broadcast_visibility(&mut self, visibility: PageVisibility) {
        for attempt in self.subscribers(SignalSource::VisibilityChange) {
            self.controller
                .dispatch(Signal::VisibilityChanged { attempt, visibility });
        }
    }

    fn sync_clock(&self) {
        self.clock.set(self.controller.platform().now_ms());
    }
}

/// Run `scenario` to completion.
///
/// The scenario's own settings win over `defaults`; both are validated.
pub fn run_scenario(scenario: &Scenario, defaults: &ActivationSettings) -> Result<SimReport> {
    let settings = scenario.settings.clone().unwrap_or_else(|| defaults.clone());
    settings.validate()?;

    let mut events: Vec<_> = scenario.events.iter().collect();
    // Stable: same-time events keep file order.
    events.sort_by_key(|e| e.at_ms);

    let mut sim = Simulation::new(scenario, settings);
    for timed in events {
        sim.step_to(timed.at_ms);
        sim.apply(&timed.event)?;
    }
    sim.run_until(scenario.end_ms());
    Ok(sim.report())
}
