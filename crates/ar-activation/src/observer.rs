// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! State-change observers.

use std::fmt;

use crate::presentation::Dialog;
use crate::state::ActivationState;

/// Handle returned by [`StateObservers::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(pub u64);

type Callback = Box<dyn FnMut(&ActivationState, &Dialog)>;

/// Registered state-change callbacks, notified in subscription order.
#[derive(Default)]
pub struct StateObservers {
    next: u64,
    entries: Vec<(ObserverId, Callback)>,
}

impl fmt::Debug for StateObservers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateObservers")
            .field("count", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl StateObservers {
    /// Register `callback` and call it once with the current state.
    pub fn subscribe<F>(&mut self, mut callback: F, state: &ActivationState, dialog: &Dialog) -> ObserverId
    where
        F: FnMut(&ActivationState, &Dialog) + 'static,
    {
        self.next += 1;
        let id = ObserverId(self.next);
        callback(state, dialog);
        self.entries.push((id, Box::new(callback)));
        id
    }

    /// Remove a callback. Returns `false` for unknown ids.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    /// Call every callback with the new state.
    pub fn notify(&mut self, state: &ActivationState, dialog: &Dialog) {
        for (_, callback) in &mut self.entries {
            callback(state, dialog);
        }
    }

    /// Number of registered callbacks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no callbacks are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn subscriber_sees_current_state_then_changes() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut observers = StateObservers::default();
        let sink = Rc::clone(&seen);
        let id = observers.subscribe(
            move |state, dialog| sink.borrow_mut().push((state.name(), dialog.name())),
            &ActivationState::Idle,
            &Dialog::None,
        );
        observers.notify(&ActivationState::AwaitingPermission, &Dialog::Busy);
        assert!(observers.unsubscribe(id));
        assert!(!observers.unsubscribe(id));
        observers.notify(&ActivationState::Idle, &Dialog::None);
        assert_eq!(
            *seen.borrow(),
            vec![("idle", "none"), ("awaiting_permission", "busy")]
        );
        assert!(observers.is_empty());
    }
}
