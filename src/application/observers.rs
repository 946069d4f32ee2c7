//! Observer fan-out

use crate::domain::call::entity::CallSnapshot;
use crate::domain::call::event::{CallEvent, DisconnectDetails};
use crate::domain::call::value_object::ProtocolState;
use crate::domain::ports::CallObserver;
use std::sync::{Arc, PoisonError, RwLock};

/// Registered observers
///
/// Each report clones the observer list and releases the lock before
/// calling out, so a hook may register further observers or call back into
/// the orchestrator.
#[derive(Default)]
pub struct ObserverSet {
    observers: RwLock<Vec<Arc<dyn CallObserver>>>,
}

impl ObserverSet {
    pub fn new(observers: Vec<Arc<dyn CallObserver>>) -> Self {
        Self {
            observers: RwLock::new(observers),
        }
    }

    pub fn add(&self, observer: Arc<dyn CallObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    pub fn new_call_created(&self, call: &CallSnapshot) {
        for observer in self.current() {
            observer.on_new_call_created(call);
        }
    }

    pub fn call_state_updated(&self, call: &CallSnapshot, prior: ProtocolState, next: ProtocolState) {
        for observer in self.current() {
            observer.on_call_state_updated(call, prior, next);
        }
    }

    pub fn call_destroyed(&self, details: &DisconnectDetails) {
        for observer in self.current() {
            observer.on_call_destroyed(details);
        }
    }

    pub fn call_event(&self, event: &CallEvent) {
        for observer in self.current() {
            observer.on_call_event(event);
        }
    }

    fn current(&self) -> Vec<Arc<dyn CallObserver>> {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
