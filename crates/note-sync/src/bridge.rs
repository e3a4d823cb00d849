//! HostBridge trait: the connection to the application that owns the notes.
//!
//! Implementations:
//! - `JsHostBridge` (in note-editor-wasm) - forwards to the host page via JS callbacks
//! - `InMemoryBridge` - For testing; can run presave hooks immediately or hold them

use crate::config::HostEnvironment;
use crate::note::{Note, NoteHandle};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Save rejected: {0}")]
    Rejected(String),

    #[error("Host disconnected: {0}")]
    Disconnected(String),

    #[error("Bridge error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Callback receiving every note the host pushes.
pub type NoteHandler = Box<dyn Fn(Note)>;

/// Runs right before the host reads the note it was scheduled against.
pub type PresaveHook = Box<dyn FnOnce()>;

/// Permission the editor asks the host for at startup.
pub const STREAM_CONTEXT_ITEM: &str = "stream-context-item";

/// A capability requested from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub name: String,
}

/// Permissions declared at startup: only the currently open note is streamed.
pub fn initial_permissions() -> Vec<Permission> {
    vec![Permission {
        name: STREAM_CONTEXT_ITEM.to_string(),
    }]
}

/// Host application capabilities the editor depends on.
///
/// Everything is single-threaded: handlers and hooks may be invoked
/// synchronously from inside any of these calls.
pub trait HostBridge {
    /// Register the single handler for inbound notes.
    fn subscribe(&self, handler: NoteHandler);

    /// Ask the host to persist `note`.
    ///
    /// The host must run `hook` before it reads the note's fields, and may
    /// defer both to a later turn. Errors are reported, never retried.
    fn request_presave(&self, note: NoteHandle, hook: PresaveHook) -> Result<()>;

    /// Execution context, used to pick the surface's input style.
    fn environment(&self) -> HostEnvironment {
        HostEnvironment::Web
    }

    /// Platform name, if the host reports one.
    fn platform(&self) -> Option<String> {
        None
    }
}

struct PendingSave {
    note: NoteHandle,
    hook: PresaveHook,
}

/// In-memory host for testing.
///
/// `push` delivers notes to the subscribed handler. Presave requests either
/// run immediately or, with `set_deferred(true)`, wait for `flush`.
pub struct InMemoryBridge {
    handler: RefCell<Option<Rc<dyn Fn(Note)>>>,
    pending: RefCell<Vec<PendingSave>>,
    /// Handles in the order their hooks ran
    saved: RefCell<Vec<NoteHandle>>,
    deferred: Cell<bool>,
    reject_saves: Cell<bool>,
    environment: HostEnvironment,
    platform: Option<String>,
}

impl InMemoryBridge {
    pub fn new() -> Self {
        Self::with_environment(HostEnvironment::Web, None)
    }

    pub fn with_environment(environment: HostEnvironment, platform: Option<String>) -> Self {
        Self {
            handler: RefCell::new(None),
            pending: RefCell::new(Vec::new()),
            saved: RefCell::new(Vec::new()),
            deferred: Cell::new(false),
            reject_saves: Cell::new(false),
            environment,
            platform,
        }
    }

    /// Hold presave requests until `flush` instead of running them inline.
    pub fn set_deferred(&self, deferred: bool) {
        self.deferred.set(deferred);
    }

    /// Make `request_presave` fail without running the hook.
    pub fn set_reject_saves(&self, reject: bool) {
        self.reject_saves.set(reject);
    }

    /// Deliver a note to the subscribed handler. Returns false if none.
    pub fn push(&self, note: Note) -> bool {
        let handler = self.handler.borrow().clone();
        match handler {
            Some(handler) => {
                handler(note);
                true
            }
            None => false,
        }
    }

    /// Run all held presave hooks in request order.
    pub fn flush(&self) -> usize {
        let pending: Vec<_> = self.pending.borrow_mut().drain(..).collect();
        let count = pending.len();
        for save in pending {
            self.complete(save);
        }
        count
    }

    /// Number of presave requests still waiting for `flush`.
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Number of saves whose hook has run.
    pub fn save_count(&self) -> usize {
        self.saved.borrow().len()
    }

    /// Handles of completed saves, oldest first.
    pub fn saved_handles(&self) -> Vec<NoteHandle> {
        self.saved.borrow().clone()
    }

    /// Snapshot of the most recently saved note.
    pub fn last_saved(&self) -> Option<Note> {
        self.saved.borrow().last().map(|note| note.borrow().clone())
    }

    fn complete(&self, save: PendingSave) {
        (save.hook)();
        self.saved.borrow_mut().push(save.note);
    }
}

impl Default for InMemoryBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl HostBridge for InMemoryBridge {
    fn subscribe(&self, handler: NoteHandler) {
        *self.handler.borrow_mut() = Some(Rc::from(handler));
    }

    fn request_presave(&self, note: NoteHandle, hook: PresaveHook) -> Result<()> {
        if self.reject_saves.get() {
            return Err(BridgeError::Rejected(note.borrow().uuid.clone()));
        }

        let save = PendingSave { note, hook };
        if self.deferred.get() {
            self.pending.borrow_mut().push(save);
        } else {
            self.complete(save);
        }
        Ok(())
    }

    fn environment(&self) -> HostEnvironment {
        self.environment
    }

    fn platform(&self) -> Option<String> {
        self.platform.clone()
    }
}
