//! Note: the host-owned record the editor displays and saves into.
//!
//! The host owns the note; the editor only ever replaces `content.text`,
//! re-attaches `clientData`, and clears the preview fields. Every other field
//! is carried through untouched (flattened into `extra`) so a note that
//! crosses the JS boundary comes back with everything it arrived with.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to one specific note instance.
///
/// Saves mutate the instance they captured, so identity matters:
/// compare handles with `Rc::ptr_eq`, not by value.
pub type NoteHandle = Rc<RefCell<Note>>;

/// A note as delivered by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Stable identifier of the note
    pub uuid: String,
    #[serde(default)]
    pub content: NoteContent,
    /// Opaque per-client state; never interpreted, only round-tripped
    #[serde(default)]
    pub client_data: Value,
    /// Set by the host when only bookkeeping fields changed. Never persisted.
    #[serde(default, skip_serializing)]
    pub is_metadata_update: bool,
    /// Fields the editor doesn't touch (`content_type`, timestamps, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `content` object of a note.
///
/// Wire names are snake_case (`preview_plain`), unlike the note itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteContent {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub spellcheck: bool,
    #[serde(default)]
    pub preview_plain: Option<String>,
    #[serde(default)]
    pub preview_html: Option<String>,
    /// Content fields the editor doesn't touch (`title`, `references`, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Note {
    /// Create a note with the given identity and body text.
    pub fn new(uuid: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            content: NoteContent {
                text: text.into(),
                ..NoteContent::default()
            },
            client_data: Value::Null,
            is_metadata_update: false,
            extra: Map::new(),
        }
    }

    pub fn with_spellcheck(mut self, spellcheck: bool) -> Self {
        self.content.spellcheck = spellcheck;
        self
    }

    pub fn with_client_data(mut self, client_data: Value) -> Self {
        self.client_data = client_data;
        self
    }

    pub fn with_metadata_update(mut self, is_metadata_update: bool) -> Self {
        self.is_metadata_update = is_metadata_update;
        self
    }

    /// Wrap this note in a fresh shared handle.
    pub fn into_handle(self) -> NoteHandle {
        Rc::new(RefCell::new(self))
    }

    /// Whether the derived preview fields are both cleared.
    pub fn previews_cleared(&self) -> bool {
        self.content.preview_plain.is_none() && self.content.preview_html.is_none()
    }
}
