//! Event infrastructure for the editor core.
//!
//! Provides `EditorEvent` for debug/monitoring and `EventBus` for subscriptions.
//! The editor is single-threaded (it lives in the host page), so the bus uses
//! `Rc` + `RefCell` rather than locks.

use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Events emitted by the sync controller for real-time monitoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EditorEvent {
    /// A note with a different uuid than the last one was received.
    NoteOpened {
        uuid: String,
        /// Milliseconds since Unix epoch.
        timestamp: f64,
    },
    /// A metadata-only update was recorded without touching the surface.
    MetadataSkipped { uuid: String, timestamp: f64 },
    /// Note text was written into the surface.
    SurfaceUpdated {
        uuid: String,
        /// Length of the new text in characters.
        length: usize,
        timestamp: f64,
    },
    /// A save was handed to the host.
    SaveRequested { uuid: String, timestamp: f64 },
    /// The host refused the save request.
    SaveFailed {
        uuid: String,
        error: String,
        timestamp: f64,
    },
}

/// Current time in milliseconds since Unix epoch (0 if the clock is unavailable).
pub(crate) fn now_millis() -> f64 {
    web_time::SystemTime::now()
        .duration_since(web_time::UNIX_EPOCH)
        .map(|d| d.as_millis() as f64)
        .unwrap_or(0.0)
}

/// Live registration on an `EventBus`. Events stop once it is dropped.
pub struct Subscription {
    bus: Weak<EventBus>,
    id: usize,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.unsubscribe(self.id);
        }
    }
}

/// Fan-out of `EditorEvent`s to registered callbacks. Lives behind an `Rc`.
#[derive(Default)]
pub struct EventBus {
    callbacks: RefCell<Vec<(usize, Rc<dyn Fn(EditorEvent)>)>>,
    next_id: Cell<usize>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for every event emitted from now on.
    pub fn subscribe(self: &Rc<Self>, callback: impl Fn(EditorEvent) + 'static) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.callbacks.borrow_mut().push((id, Rc::new(callback)));
        Subscription {
            bus: Rc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: usize) {
        // try_borrow_mut: a subscription may be dropped from inside a callback
        if let Ok(mut callbacks) = self.callbacks.try_borrow_mut() {
            callbacks.retain(|(i, _)| *i != id);
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.callbacks.borrow().len()
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: EditorEvent) {
        // Snapshot: callbacks may subscribe or drop subscriptions while running.
        let callbacks: Vec<_> = self
            .callbacks
            .borrow()
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();

        for callback in callbacks {
            callback(event.clone());
        }
    }
}
