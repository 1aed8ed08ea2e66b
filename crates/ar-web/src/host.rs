// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Re-entrancy-safe host around the controller.
//!
//! Browser callbacks (DOM events, promise completions, JS state listeners)
//! can fire while the controller is mid-dispatch. Everything entering the
//! controller goes through an inbox; the first caller that finds the
//! controller free drains it. Commands issued from inside a callback are
//! therefore applied after the current dispatch returns, in arrival order.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::{Rc, Weak};

use ar_activation::{
    ActivationController, ActivationState, DeviceProfile, Dialog, FailureReason, StartRejected,
};
use ar_app_core::ActivationSettings;
use ar_platform_port::{AssetReference, AttemptId, Platform, Signal};
use serde::Serialize;
use tracing::debug;

/// Receiver for asynchronous platform completions.
///
/// Platform adapters hold a `Weak<dyn SignalSink>` so a late callback after
/// the host is gone is dropped.
pub trait SignalSink {
    /// Queue `signal` for the controller and drain if possible.
    fn deliver(&self, signal: Signal);
}

/// Work queued for the controller.
#[derive(Debug)]
pub enum Command {
    /// A tap on the AR button.
    Start(AssetReference),
    /// [`ActivationController::cancel`].
    Cancel,
    /// [`ActivationController::acknowledge`].
    Acknowledge,
    /// [`ActivationController::confirm_start`].
    ConfirmStart,
    /// [`ActivationController::shutdown`].
    Shutdown,
    /// A platform completion or event.
    Signal(Signal),
}

/// Flattened state for JavaScript listeners.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateView {
    /// State name (`idle`, `awaiting_permission`, ... `failed`).
    pub state: String,
    /// Failure reason name when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Whether retrying on this device can succeed, when failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recoverable: Option<bool>,
    /// What the UI should show.
    pub dialog: Dialog,
}

impl StateView {
    /// View of `state` and its `dialog`.
    pub fn new(state: &ActivationState, dialog: &Dialog) -> Self {
        Self {
            state: state.name().to_owned(),
            reason: state.failure().map(|r| r.name().to_owned()),
            recoverable: state.failure().map(FailureReason::is_recoverable),
            dialog: dialog.clone(),
        }
    }
}

type Listener = Rc<dyn Fn(&StateView)>;

/// Latest state view plus the host's own listener list.
///
/// Lives outside the controller so listeners can be added, removed and read
/// while the controller is borrowed.
#[derive(Default)]
pub struct StateHub {
    view: RefCell<StateView>,
    listeners: RefCell<Vec<(u32, Listener)>>,
    next: Cell<u32>,
}

impl fmt::Debug for StateHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateHub")
            .field("view", &self.view.borrow())
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

impl StateHub {
    fn publish(&self, view: StateView) {
        *self.view.borrow_mut() = view.clone();
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            listener(&view);
        }
    }

    fn add(&self, listener: Listener) -> u32 {
        let id = self.next.get() + 1;
        self.next.set(id);
        self.listeners.borrow_mut().push((id, Rc::clone(&listener)));
        let view = self.view.borrow().clone();
        listener(&view);
        id
    }

    fn remove(&self, id: u32) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(entry, _)| *entry != id);
        listeners.len() != before
    }
}

/// Owns the controller and serialises everything that reaches it.
pub struct ControllerHost<P: Platform> {
    controller: RefCell<ActivationController<P>>,
    inbox: RefCell<VecDeque<Command>>,
    hub: Rc<StateHub>,
    profile: Cell<DeviceProfile>,
}

impl<P: Platform> fmt::Debug for ControllerHost<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerHost")
            .field("queued", &self.inbox.borrow().len())
            .field("hub", &self.hub)
            .finish_non_exhaustive()
    }
}

impl<P: Platform + 'static> ControllerHost<P> {
    /// Build the platform with a sink pointing back at this host, then the
    /// controller on top of it.
    pub fn new<F>(build_platform: F, settings: ActivationSettings) -> Rc<Self>
    where
        F: FnOnce(Weak<dyn SignalSink>) -> P,
    {
        Rc::new_cyclic(|weak: &Weak<Self>| {
            let sink: Weak<dyn SignalSink> = weak.clone();
            let mut controller = ActivationController::new(build_platform(sink), settings);
            let hub = Rc::new(StateHub::default());
            let publish = Rc::clone(&hub);
            controller.on_state_change(move |state, dialog| {
                publish.publish(StateView::new(state, dialog));
            });
            let profile = Cell::new(controller.device_profile());
            Self {
                controller: RefCell::new(controller),
                inbox: RefCell::new(VecDeque::new()),
                hub,
                profile,
            }
        })
    }
}

impl<P: Platform> ControllerHost<P> {
    /// Start an attempt.
    ///
    /// Runs at once when the controller is free and returns the new attempt.
    /// From inside a callback the tap is queued and `Ok(None)` returned.
    pub fn start(&self, asset: AssetReference) -> Result<Option<AttemptId>, StartRejected> {
        let result = {
            let Ok(mut controller) = self.controller.try_borrow_mut() else {
                debug!("tap queued behind the running dispatch");
                self.inbox.borrow_mut().push_back(Command::Start(asset));
                return Ok(None);
            };
            let result = controller.start_activation(asset);
            self.profile.set(controller.device_profile());
            result
        };
        self.drain();
        result.map(Some)
    }

    /// Queue a command and drain.
    pub fn submit(&self, command: Command) {
        self.inbox.borrow_mut().push_back(command);
        self.drain();
    }

    /// Apply queued commands until the inbox is empty or the controller is
    /// busy further up the stack.
    pub fn drain(&self) {
        loop {
            let Ok(mut controller) = self.controller.try_borrow_mut() else {
                return;
            };
            let Some(command) = self.inbox.borrow_mut().pop_front() else {
                return;
            };
            apply(&mut controller, command);
            self.profile.set(controller.device_profile());
        }
    }

    /// Latest published state.
    pub fn view(&self) -> StateView {
        self.hub.view.borrow().clone()
    }

    /// Device profile as of the last applied command.
    pub fn device_profile(&self) -> DeviceProfile {
        self.profile.get()
    }

    /// Register a listener; it is called at once with the current view.
    pub fn subscribe<F>(&self, listener: F) -> u32
    where
        F: Fn(&StateView) + 'static,
    {
        self.hub.add(Rc::new(listener))
    }

    /// Remove a listener.
    pub fn unsubscribe(&self, id: u32) -> bool {
        self.hub.remove(id)
    }

    /// Commands waiting for the controller.
    pub fn queued(&self) -> usize {
        self.inbox.borrow().len()
    }

    /// Run `f` against the controller if it is not mid-dispatch.
    pub fn with_controller<R>(&self, f: impl FnOnce(&mut ActivationController<P>) -> R) -> Option<R> {
        self.controller.try_borrow_mut().ok().map(|mut c| f(&mut c))
    }
}

impl<P: Platform> SignalSink for ControllerHost<P> {
    fn deliver(&self, signal: Signal) {
        self.submit(Command::Signal(signal));
    }
}

fn apply<P: Platform>(controller: &mut ActivationController<P>, command: Command) {
    match command {
        Command::Start(asset) => {
            if let Err(err) = controller.start_activation(asset) {
                debug!(%err, "queued tap rejected");
            }
        }
        Command::Cancel => controller.cancel(),
        Command::Acknowledge => {
            controller.acknowledge();
        }
        Command::ConfirmStart => {
            controller.confirm_start();
        }
        Command::Shutdown => controller.shutdown(),
        Command::Signal(signal) => controller.dispatch(signal),
    }
}
