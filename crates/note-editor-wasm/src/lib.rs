//! WASM bindings for the note editor core.
//!
//! Provides the bridge between the host page (JavaScript) and Rust (note-sync).
//!
//! # Architecture
//!
//! The page creates a `JsHostBridge` with its save callback and a
//! `JsEditingSurface` around its editor widget, then hands both to a
//! `WasmNoteEditor`, which owns the `SyncController`.
//!
//! ```text
//! JavaScript                       WASM (Rust)
//! ──────────                       ───────────
//! host relay ──callbacks──> JsHostBridge      (impl HostBridge)
//! editor     ──methods────> JsEditingSurface  (impl EditingSurface)
//!                                   │
//!                                   ▼
//!                            SyncController
//!                                   │
//!                                   ▼
//!                   WasmNoteEditor (exposed to JS)
//! ```
//!
//! **Note**: This crate only compiles for `wasm32` targets. When building for native
//! targets (e.g., during `cargo check --workspace`), this crate provides no exports.

#[cfg(target_arch = "wasm32")]
mod host_bridge;
#[cfg(target_arch = "wasm32")]
mod js_surface;

#[cfg(target_arch = "wasm32")]
pub use host_bridge::JsHostBridge;
#[cfg(target_arch = "wasm32")]
pub use js_surface::JsEditingSurface;

// ============================================================================
// All WASM-specific code is gated behind target_arch = "wasm32"
// This allows `cargo check --workspace` to succeed on native targets.
// ============================================================================

#[cfg(target_arch = "wasm32")]
mod wasm_impl {
    use super::*;
    use note_sync::{initial_permissions, Position, SyncController};
    use serde::Serialize;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tracing_subscriber::layer::SubscriberExt;
    use wasm_bindgen::prelude::*;

    // ========== Callback Logger Layer ==========

    // Store the logger callback in thread-local storage (WASM is single-threaded)
    thread_local! {
        static LOGGER_CALLBACK: RefCell<Option<js_sys::Function>> = const { RefCell::new(None) };
    }

    /// A tracing layer that invokes a JavaScript callback for each log event.
    struct JsCallbackLayer;

    impl<S> tracing_subscriber::Layer<S> for JsCallbackLayer
    where
        S: tracing::Subscriber,
    {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            LOGGER_CALLBACK.with(|cb| {
                if let Some(callback) = cb.borrow().as_ref() {
                    let metadata = event.metadata();

                    let mut visitor = MessageVisitor::default();
                    event.record(&mut visitor);

                    let timestamp = web_time::SystemTime::now()
                        .duration_since(web_time::UNIX_EPOCH)
                        .map(|d| d.as_millis() as f64)
                        .unwrap_or(0.0);

                    let js_event = js_sys::Object::new();
                    let _ = js_sys::Reflect::set(&js_event, &"level".into(), &metadata.level().as_str().into());
                    let _ = js_sys::Reflect::set(&js_event, &"target".into(), &metadata.target().into());
                    let _ = js_sys::Reflect::set(&js_event, &"message".into(), &visitor.message.into());
                    let _ = js_sys::Reflect::set(&js_event, &"timestamp".into(), &timestamp.into());

                    let _ = callback.call1(&JsValue::NULL, &js_event);
                }
            });
        }
    }

    /// Visitor to build a message from tracing event fields
    #[derive(Default)]
    struct MessageVisitor {
        message: String,
    }

    impl MessageVisitor {
        fn push_field(&mut self, name: &str, value: String) {
            if name == "message" {
                self.message = if self.message.is_empty() {
                    value
                } else {
                    format!("{} {}", value, self.message)
                };
            } else {
                if !self.message.is_empty() {
                    self.message.push(' ');
                }
                self.message.push_str(&format!("{}={}", name, value));
            }
        }
    }

    impl tracing::field::Visit for MessageVisitor {
        fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
            self.push_field(field.name(), format!("{:?}", value));
        }

        fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
            self.push_field(field.name(), value.to_string());
        }
    }

    /// Options accepted by `init`.
    struct InitConfig {
        /// Receives `{ level, target, message, timestamp }` for every log event
        logger: Option<js_sys::Function>,
        max_level: tracing::Level,
    }

    impl InitConfig {
        fn from_js(config: Option<&js_sys::Object>) -> Self {
            let get = |key: &str| {
                config.and_then(|cfg| js_sys::Reflect::get(cfg, &key.into()).ok())
            };

            let logger = get("logger").and_then(|v| v.dyn_into::<js_sys::Function>().ok());
            let max_level = get("logLevel")
                .and_then(|v| v.as_string())
                .and_then(|level| level.parse().ok())
                .unwrap_or(tracing::Level::DEBUG);

            Self { logger, max_level }
        }
    }

    /// Initialize the WASM module (sets up panic hook and tracing for better debugging).
    ///
    /// Accepts an optional configuration object:
    /// - `init()` - console-only logging at debug level
    /// - `init({ logLevel: "info" })` - console-only logging at the given level
    /// - `init({ logger: (event) => {...} })` - callback + console logging
    ///
    /// The logger callback receives events with: `{ level, target, message, timestamp }`
    #[wasm_bindgen]
    pub fn init(config: Option<js_sys::Object>) {
        console_error_panic_hook::set_once();

        let config = InitConfig::from_js(config.as_ref());
        let console_layer = tracing_wasm::WASMLayer::new(
            tracing_wasm::WASMLayerConfigBuilder::new()
                .set_max_level(config.max_level)
                .build(),
        );

        if let Some(cb) = config.logger {
            LOGGER_CALLBACK.with(|cell| {
                *cell.borrow_mut() = Some(cb);
            });

            let subscriber = tracing_subscriber::registry()
                .with(JsCallbackLayer)
                .with(console_layer);
            tracing::subscriber::set_global_default(subscriber).ok();
        } else {
            let subscriber = tracing_subscriber::registry().with(console_layer);
            tracing::subscriber::set_global_default(subscriber).ok();
        }

        tracing::info!("note-editor-wasm {} initialized", env!("CARGO_PKG_VERSION"));
    }

    /// Get version string
    #[wasm_bindgen]
    pub fn version() -> String {
        env!("CARGO_PKG_VERSION").to_string()
    }

    /// Resolve the full URL around a link token.
    ///
    /// `start`/`end` are character offsets of the token within `lineText`;
    /// `tokenType` is the tokenizer's class string. Returns `undefined` when
    /// the token is not a link.
    #[wasm_bindgen(js_name = resolveLink)]
    pub fn resolve_link(
        line_text: &str,
        start: usize,
        end: usize,
        token_type: Option<String>,
    ) -> Option<String> {
        link_spans::resolve_link(line_text, start, end, token_type.as_deref())
    }

    // ========== WASM Subscription Handle ==========

    /// Subscription handle exposed to JavaScript.
    ///
    /// Call `dispose()` to unsubscribe, or let the JS garbage collector
    /// collect it (the Rust Drop will run via FinalizationRegistry).
    #[wasm_bindgen]
    pub struct WasmSubscription {
        inner: RefCell<Option<note_sync::Subscription>>,
    }

    #[wasm_bindgen]
    impl WasmSubscription {
        /// Unsubscribe from events. Safe to call multiple times.
        pub fn dispose(&self) {
            self.inner.borrow_mut().take();
        }
    }

    /// Serialize for JS with maps as plain objects.
    fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsError> {
        let serializer = serde_wasm_bindgen::Serializer::new().serialize_maps_as_objects(true);
        value
            .serialize(&serializer)
            .map_err(|e| JsError::new(&e.to_string()))
    }

    /// Note editor exposed to the host page.
    ///
    /// Wraps the core `SyncController`; one instance per page.
    #[wasm_bindgen]
    pub struct WasmNoteEditor {
        bridge: Rc<JsHostBridge>,
        controller: SyncController,
    }

    #[wasm_bindgen]
    impl WasmNoteEditor {
        /// Create the editor and subscribe it to the bridge.
        #[wasm_bindgen(constructor)]
        pub fn new(bridge: JsHostBridge) -> WasmNoteEditor {
            let bridge = Rc::new(bridge);
            let controller = SyncController::new(bridge.clone());
            WasmNoteEditor { bridge, controller }
        }

        /// Permissions to declare to the host at startup.
        #[wasm_bindgen(js_name = initialPermissions)]
        pub fn initial_permissions() -> Result<JsValue, JsError> {
            to_js(&initial_permissions())
        }

        /// Options to create the editor widget with (`inputStyle`, `mode`, ...).
        #[wasm_bindgen(js_name = editorConfig)]
        pub fn editor_config(&self) -> Result<JsValue, JsError> {
            to_js(&self.controller.editor_config())
        }

        /// Attach the editor widget once it has been created.
        #[wasm_bindgen(js_name = attachSurface)]
        pub fn attach_surface(&self, surface: JsEditingSurface) {
            self.controller.attach_surface(Rc::new(surface));
        }

        /// Handle a note pushed by the host.
        ///
        /// Fails only if the object is not shaped like a note.
        #[wasm_bindgen(js_name = onNoteReceived)]
        pub fn on_note_received(&self, note: JsValue) -> Result<(), JsError> {
            let note: note_sync::Note = serde_wasm_bindgen::from_value(note)
                .map_err(|e| JsError::new(&format!("Invalid note: {}", e)))?;
            self.bridge.deliver(note);
            Ok(())
        }

        /// Handle a change notification from the editor widget.
        ///
        /// Attached surfaces report changes themselves; this is for hosts that
        /// forward change events manually.
        #[wasm_bindgen(js_name = onSurfaceChanged)]
        pub fn on_surface_changed(&self) {
            self.controller.on_surface_changed();
        }

        /// URL under a text position, or `undefined`.
        #[wasm_bindgen(js_name = resolveLinkAt)]
        pub fn resolve_link_at(&self, line: usize, ch: usize) -> Option<String> {
            self.controller.resolve_link_at(Position::new(line, ch))
        }

        /// URL under a page coordinate (e.g. a mousedown event), or `undefined`.
        #[wasm_bindgen(js_name = resolveLinkAtCoords)]
        pub fn resolve_link_at_coords(&self, x: f64, y: f64) -> Option<String> {
            self.controller.resolve_link_at_coords(x, y)
        }

        /// Uuid of the note currently open, if any.
        #[wasm_bindgen(js_name = currentNoteUuid)]
        pub fn current_note_uuid(&self) -> Option<String> {
            self.controller.last_seen_uuid()
        }

        /// Subscribe to editor events for real-time monitoring.
        ///
        /// Returns a `WasmSubscription` handle. Call `dispose()` on it to unsubscribe,
        /// or let the JS garbage collector clean it up.
        #[wasm_bindgen(js_name = subscribeEditorEvents)]
        pub fn subscribe_editor_events(&self, callback: js_sys::Function) -> WasmSubscription {
            let rust_closure = move |event: note_sync::EditorEvent| {
                if let Ok(js_event) = serde_wasm_bindgen::to_value(&event) {
                    let _ = callback.call1(&JsValue::NULL, &js_event);
                }
            };

            WasmSubscription {
                inner: RefCell::new(Some(self.controller.subscribe(rust_closure))),
            }
        }
    }
}

// Re-export wasm_impl contents at crate root for wasm32 targets
#[cfg(target_arch = "wasm32")]
pub use wasm_impl::*;

/// Message text of a thrown JS value (`Error.message`, a string, or its debug form).
#[cfg(target_arch = "wasm32")]
pub(crate) fn js_error_message(err: &wasm_bindgen::JsValue) -> String {
    err.as_string()
        .or_else(|| {
            js_sys::Reflect::get(err, &"message".into())
                .ok()
                .and_then(|v| v.as_string())
        })
        .unwrap_or_else(|| format!("{:?}", err))
}
