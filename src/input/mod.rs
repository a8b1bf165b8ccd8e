// Input forwarding
// Listeners registered on the host container are re-registered on the display
// surface so input keeps flowing through the original dispatch path

mod events;

pub use events::*;

use std::sync::Arc;

/// Receives input events from the host or the display surface
pub trait InputListener: Send + Sync {
    fn on_input(&self, event: &InputEvent);
}

/// A listener together with the category it was registered for
#[derive(Clone)]
pub struct ListenerRegistration {
    pub kind: ListenerKind,
    pub listener: Arc<dyn InputListener>,
}

impl ListenerRegistration {
    pub fn new(kind: ListenerKind, listener: Arc<dyn InputListener>) -> Self {
        Self { kind, listener }
    }
}

/// Dispatches surface input to the listeners copied from the container at setup
#[derive(Clone, Default)]
pub struct InputForwarder {
    registrations: Arc<Vec<ListenerRegistration>>,
}

impl InputForwarder {
    pub fn new(registrations: Vec<ListenerRegistration>) -> Self {
        Self {
            registrations: Arc::new(registrations),
        }
    }

    /// Deliver `event` to every listener registered for its kind
    pub fn dispatch(&self, event: &InputEvent) {
        let kind = event.kind();
        for registration in self.registrations.iter().filter(|r| r.kind == kind) {
            registration.listener.on_input(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.registrations.len()
    }
}

/// Logs every event it receives at trace level
pub struct InputLogger;

impl InputListener for InputLogger {
    fn on_input(&self, event: &InputEvent) {
        log::trace!("Input: {:?}", event);
    }
}
