//! JavaScript host bridge for WASM.
//!
//! Implements the `HostBridge` trait on top of callbacks supplied by the host
//! page. Notes flow in through `WasmNoteEditor::onNoteReceived`; saves flow out
//! through the `requestPresave` callback.

use note_sync::bridge::{BridgeError, HostBridge, NoteHandler, PresaveHook, Result};
use note_sync::{HostEnvironment, Note, NoteHandle};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

/// JavaScript host bridge.
///
/// # Example (JavaScript side)
///
/// ```javascript
/// const bridge = new JsHostBridge(
///   (uuid, presave) => relay.saveItemWithPresave(item, () => {
///     const finalized = presave();
///     item.content.text = finalized.content.text;
///     item.clientData = finalized.clientData;
///     item.content.preview_plain = null;
///     item.content.preview_html = null;
///   }),
///   relay.environment,
///   relay.platform,
/// );
/// ```
///
/// `presave()` must be called before the host reads the note; it returns the
/// finalized note as a plain object.
#[wasm_bindgen]
pub struct JsHostBridge {
    request_presave_fn: js_sys::Function,
    environment: HostEnvironment,
    platform: Option<String>,
    handler: RefCell<Option<Rc<dyn Fn(Note)>>>,
}

#[wasm_bindgen]
impl JsHostBridge {
    /// Create a bridge.
    ///
    /// `environment` is one of `"web"`, `"desktop"`, `"mobile"`; anything
    /// else (or nothing) counts as web.
    #[wasm_bindgen(constructor)]
    pub fn new(
        request_presave_fn: js_sys::Function,
        environment: Option<String>,
        platform: Option<String>,
    ) -> Self {
        Self {
            request_presave_fn,
            environment: HostEnvironment::from_host(environment.as_deref()),
            platform,
            handler: RefCell::new(None),
        }
    }
}

impl JsHostBridge {
    /// Hand an inbound note to the subscribed handler.
    pub(crate) fn deliver(&self, note: Note) {
        let handler = self.handler.borrow().clone();
        match handler {
            Some(handler) => handler(note),
            None => tracing::warn!("Dropping note {}: no subscriber", note.uuid),
        }
    }
}

/// Serialize a note into a plain JS object (maps as objects, `None` as `null`).
pub(crate) fn note_to_js(note: &Note) -> std::result::Result<JsValue, serde_wasm_bindgen::Error> {
    let serializer = serde_wasm_bindgen::Serializer::new()
        .serialize_maps_as_objects(true)
        .serialize_missing_as_null(true);
    note.serialize(&serializer)
}

/// Convert a thrown JS value into a `BridgeError`.
fn js_err_to_bridge_err(err: JsValue) -> BridgeError {
    let msg = crate::js_error_message(&err);
    if msg.contains("disconnected") || msg.contains("closed") {
        BridgeError::Disconnected(msg)
    } else {
        BridgeError::Other(msg)
    }
}

impl HostBridge for JsHostBridge {
    fn subscribe(&self, handler: NoteHandler) {
        *self.handler.borrow_mut() = Some(Rc::from(handler));
    }

    fn request_presave(&self, note: NoteHandle, hook: PresaveHook) -> Result<()> {
        let uuid = note.borrow().uuid.clone();

        let presave = Closure::once_into_js(move || -> JsValue {
            hook();
            let finalized = note_to_js(&note.borrow());
            finalized.unwrap_or_else(|e| {
                tracing::warn!("Failed to serialize note {}: {}", note.borrow().uuid, e);
                JsValue::NULL
            })
        });

        self.request_presave_fn
            .call2(&JsValue::NULL, &JsValue::from_str(&uuid), &presave)
            .map_err(js_err_to_bridge_err)?;
        Ok(())
    }

    fn environment(&self) -> HostEnvironment {
        self.environment
    }

    fn platform(&self) -> Option<String> {
        self.platform.clone()
    }
}
