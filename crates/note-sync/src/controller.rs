//! SyncController: keeps the editing surface and the host's note in step.
//!
//! Inbound: the host pushes a note -> the controller decides whether the
//! surface text must be replaced. Outbound: the surface reports a change ->
//! the controller asks the host to save, finalizing the note inside the
//! host's presave hook.
//!
//! Two rules carry most of the weight:
//! - Text the controller writes into the surface fires the surface's change
//!   handlers like any edit. `suppress_outbound` is raised for exactly that
//!   write so it is not mistaken for typing (which would save it right back).
//! - The host may run a presave hook on a later turn, after another note has
//!   been pushed. The hook therefore mutates the `NoteHandle` captured when
//!   the change was seen, never whatever `current_note` is by then.

use crate::bridge::HostBridge;
use crate::config::{EditorConfig, SPELLCHECK_OPTION, STYLE_SELECTED_TEXT_OPTION};
use crate::events::{now_millis, EditorEvent, EventBus, Subscription};
use crate::links;
use crate::note::{Note, NoteHandle};
use crate::surface::{EditingSurface, Position};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// Session state owned by the controller.
#[derive(Debug)]
pub struct SyncState {
    /// Note most recently received
    pub current_note: Option<NoteHandle>,
    /// Text known to be both in the note and on the surface
    pub last_known_text: Option<String>,
    /// Uuid of the note last processed
    pub last_seen_uuid: Option<String>,
    /// True until the open note's first non-metadata render
    pub is_first_render_of_note: bool,
    /// Client data re-attached on every save
    pub client_data: Value,
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            current_note: None,
            last_known_text: None,
            last_seen_uuid: None,
            is_first_render_of_note: true,
            client_data: Value::Null,
        }
    }
}

/// Clears the outbound guard when dropped, including on unwind.
struct SuppressGuard<'a>(&'a Cell<bool>);

impl<'a> SuppressGuard<'a> {
    fn raise(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for SuppressGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

struct Inner {
    state: RefCell<SyncState>,
    suppress_outbound: Cell<bool>,
    surface: RefCell<Option<Rc<dyn EditingSurface>>>,
    bridge: Rc<dyn HostBridge>,
    events: Rc<EventBus>,
}

/// The one synchronization controller of an editor session.
///
/// No `RefCell` borrow is held across a call into the surface or the bridge:
/// both may call straight back into the controller.
pub struct SyncController {
    inner: Rc<Inner>,
}

impl SyncController {
    /// Create the controller and subscribe it to the host's note stream.
    pub fn new(bridge: Rc<dyn HostBridge>) -> Self {
        let inner = Rc::new(Inner {
            state: RefCell::new(SyncState::default()),
            suppress_outbound: Cell::new(false),
            surface: RefCell::new(None),
            bridge: Rc::clone(&bridge),
            events: Rc::new(EventBus::new()),
        });

        let weak = Rc::downgrade(&inner);
        bridge.subscribe(Box::new(move |note| {
            if let Some(inner) = weak.upgrade() {
                inner.on_note_received(note);
            }
        }));

        Self { inner }
    }

    /// Options the surface should be created with for this host.
    pub fn editor_config(&self) -> EditorConfig {
        EditorConfig::for_host(self.inner.bridge.environment(), self.inner.bridge.platform())
    }

    /// Attach the editing surface once it exists.
    ///
    /// Notes received earlier are not replayed; the next inbound note
    /// populates the surface.
    pub fn attach_surface(&self, surface: Rc<dyn EditingSurface>) {
        let config = self.editor_config();
        surface.set_option(STYLE_SELECTED_TEXT_OPTION, config.style_selected_text.into());

        let weak: Weak<Inner> = Rc::downgrade(&self.inner);
        surface.on_change(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.on_surface_changed();
            }
        }));

        *self.inner.surface.borrow_mut() = Some(surface);
        tracing::debug!("Editing surface attached (input style {:?})", config.input_style);
    }

    /// Inbound path: the host pushed a note.
    pub fn on_note_received(&self, note: Note) {
        self.inner.on_note_received(note);
    }

    /// Outbound path: the surface text changed.
    pub fn on_surface_changed(&self) {
        self.inner.on_surface_changed();
    }

    /// Resolve the link under a text position, if any.
    pub fn resolve_link_at(&self, pos: Position) -> Option<String> {
        let surface = self.inner.surface()?;
        links::resolve_link_at(surface.as_ref(), pos)
    }

    /// Resolve the link under a page coordinate, if any.
    pub fn resolve_link_at_coords(&self, x: f64, y: f64) -> Option<String> {
        let surface = self.inner.surface()?;
        links::resolve_link_at_coords(surface.as_ref(), x, y)
    }

    /// Observe editor events until the returned `Subscription` is dropped.
    pub fn subscribe(&self, callback: impl Fn(EditorEvent) + 'static) -> Subscription {
        self.inner.events.subscribe(callback)
    }

    /// Handle to the note instance currently open.
    pub fn current_note(&self) -> Option<NoteHandle> {
        self.inner.state.borrow().current_note.clone()
    }

    pub fn last_known_text(&self) -> Option<String> {
        self.inner.state.borrow().last_known_text.clone()
    }

    pub fn last_seen_uuid(&self) -> Option<String> {
        self.inner.state.borrow().last_seen_uuid.clone()
    }

    pub fn is_first_render_of_note(&self) -> bool {
        self.inner.state.borrow().is_first_render_of_note
    }

    /// True only while the controller itself is writing into the surface.
    pub fn is_suppressing_outbound(&self) -> bool {
        self.inner.suppress_outbound.get()
    }

    pub fn has_surface(&self) -> bool {
        self.inner.surface.borrow().is_some()
    }
}

impl Inner {
    fn surface(&self) -> Option<Rc<dyn EditingSurface>> {
        self.surface.borrow().clone()
    }

    fn on_note_received(&self, note: Note) {
        let uuid = note.uuid.clone();
        let text = note.content.text.clone();
        let spellcheck = note.content.spellcheck;
        let is_metadata_update = note.is_metadata_update;
        let client_data = note.client_data.clone();

        let opened = {
            let mut state = self.state.borrow_mut();
            let opened = state.last_seen_uuid.as_deref() != Some(uuid.as_str());
            if opened {
                state.last_known_text = None;
                state.is_first_render_of_note = true;
                state.last_seen_uuid = Some(uuid.clone());
            }

            state.current_note = Some(note.into_handle());

            if !is_metadata_update {
                state.client_data = client_data;
            }
            opened
        };

        if opened {
            tracing::debug!("Opened note {}", uuid);
            self.emit(EditorEvent::NoteOpened {
                uuid: uuid.clone(),
                timestamp: now_millis(),
            });
        }

        // Metadata-only updates leave the surface alone entirely, spellcheck included.
        if is_metadata_update {
            tracing::debug!("Metadata-only update for {}, surface untouched", uuid);
            self.emit(EditorEvent::MetadataSkipped {
                uuid,
                timestamp: now_millis(),
            });
            return;
        }

        let Some(surface) = self.surface() else {
            tracing::debug!("No editing surface yet, recorded note {}", uuid);
            return;
        };

        let needs_push = self.state.borrow().last_known_text.as_deref() != Some(text.as_str());
        if needs_push {
            match self.write_surface(surface.as_ref(), &text) {
                Ok(()) => {
                    self.state.borrow_mut().last_known_text = Some(text.clone());
                    self.emit(EditorEvent::SurfaceUpdated {
                        uuid: uuid.clone(),
                        length: text.chars().count(),
                        timestamp: now_millis(),
                    });
                }
                Err(e) => {
                    // The render did not happen: history and spellcheck wait for the retry.
                    tracing::warn!("Failed to show note {}: {}", uuid, e);
                    return;
                }
            }
        }

        let first_render =
            std::mem::replace(&mut self.state.borrow_mut().is_first_render_of_note, false);
        if first_render {
            surface.clear_history();
        }

        surface.set_option(SPELLCHECK_OPTION, spellcheck.into());
    }

    /// Replace the surface text without triggering a save.
    fn write_surface(
        &self,
        surface: &dyn EditingSurface,
        text: &str,
    ) -> crate::surface::Result<()> {
        let _guard = SuppressGuard::raise(&self.suppress_outbound);
        surface.set_text(text)
    }

    fn on_surface_changed(self: &Rc<Self>) {
        if self.suppress_outbound.get() {
            return;
        }

        // Capture the instance now; `current_note` may be replaced before the hook runs.
        let Some(note) = self.state.borrow().current_note.clone() else {
            tracing::debug!("Surface changed with no open note, ignoring");
            return;
        };
        let uuid = note.borrow().uuid.clone();

        let weak = Rc::downgrade(self);
        let target = Rc::clone(&note);
        let hook = Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.finalize_save(&target);
            }
        });

        self.emit(EditorEvent::SaveRequested {
            uuid: uuid.clone(),
            timestamp: now_millis(),
        });

        if let Err(e) = self.bridge.request_presave(note, hook) {
            tracing::warn!("Save of {} not accepted by host: {}", uuid, e);
            self.emit(EditorEvent::SaveFailed {
                uuid,
                error: e.to_string(),
                timestamp: now_millis(),
            });
        }
    }

    /// Presave hook body: pull the surface text into the captured note.
    fn finalize_save(&self, note: &NoteHandle) {
        let Some(surface) = self.surface() else {
            return;
        };
        let text = surface.text();

        let client_data = {
            let mut state = self.state.borrow_mut();
            state.last_known_text = Some(text.clone());
            state.client_data.clone()
        };

        let mut note = note.borrow_mut();
        note.content.text = text;
        note.client_data = client_data;
        note.content.preview_plain = None;
        note.content.preview_html = None;
        tracing::debug!("Finalized save for {}", note.uuid);
    }

    fn emit(&self, event: EditorEvent) {
        self.events.emit(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::InMemoryBridge;
    use crate::surface::InMemorySurface;

    fn setup() -> (Rc<InMemoryBridge>, Rc<InMemorySurface>, SyncController) {
        let bridge = Rc::new(InMemoryBridge::new());
        let surface = Rc::new(InMemorySurface::new());
        let controller = SyncController::new(bridge.clone());
        controller.attach_surface(surface.clone());
        (bridge, surface, controller)
    }

    #[test]
    fn test_new_controller_state() {
        let bridge = Rc::new(InMemoryBridge::new());
        let controller = SyncController::new(bridge);

        assert!(controller.current_note().is_none());
        assert_eq!(controller.last_known_text(), None);
        assert_eq!(controller.last_seen_uuid(), None);
        assert!(controller.is_first_render_of_note());
        assert!(!controller.is_suppressing_outbound());
        assert!(!controller.has_surface());
    }

    #[test]
    fn test_inbound_note_fills_surface() {
        let (bridge, surface, controller) = setup();

        bridge.push(Note::new("n1", "hello").with_spellcheck(true));

        assert_eq!(surface.text(), "hello");
        assert_eq!(controller.last_known_text().as_deref(), Some("hello"));
        assert_eq!(controller.last_seen_uuid().as_deref(), Some("n1"));
        assert_eq!(surface.history_clears(), 1);
        assert_eq!(surface.option("spellcheck"), Some(true.into()));
        assert_eq!(bridge.save_count(), 0);
    }

    #[test]
    fn test_same_text_is_not_rewritten() {
        let (bridge, surface, _controller) = setup();

        bridge.push(Note::new("n1", "hello"));
        bridge.push(Note::new("n1", "hello"));

        assert_eq!(surface.set_text_calls(), 1);
        assert_eq!(surface.history_clears(), 1);
    }

    #[test]
    fn test_suppress_flag_cleared_after_failed_write() {
        let (bridge, surface, controller) = setup();
        surface.fail_next_set_text();

        bridge.push(Note::new("n1", "hello").with_spellcheck(true));

        assert!(!controller.is_suppressing_outbound());
        assert_eq!(controller.last_known_text(), None);
        assert_eq!(bridge.save_count(), 0);
        assert_eq!(surface.history_clears(), 0);
        assert!(controller.is_first_render_of_note());
        assert_eq!(surface.option("spellcheck"), None);

        // Next push retries because nothing was recorded as shown.
        bridge.push(Note::new("n1", "hello").with_spellcheck(true));
        assert_eq!(surface.text(), "hello");
        assert_eq!(controller.last_known_text().as_deref(), Some("hello"));
        assert_eq!(surface.history_clears(), 1);
        assert!(!controller.is_first_render_of_note());
        assert_eq!(surface.option("spellcheck"), Some(true.into()));
    }

    #[test]
    fn test_suppress_flag_only_raised_during_write() {
        let (bridge, surface, controller) = setup();
        let controller = Rc::new(controller);

        let seen = Rc::new(Cell::new(false));
        let seen_clone = Rc::clone(&seen);
        let weak = Rc::downgrade(&controller);
        surface.on_change(Box::new(move || {
            if let Some(c) = weak.upgrade() {
                seen_clone.set(c.is_suppressing_outbound());
            }
        }));

        bridge.push(Note::new("n1", "hello"));
        assert!(seen.get());
        assert!(!controller.is_suppressing_outbound());

        surface.edit("typed");
        assert!(!seen.get());
    }

    #[test]
    fn test_save_clears_previews_and_keeps_client_data() {
        let (bridge, surface, _controller) = setup();
        let mut note = Note::new("n1", "start").with_client_data(serde_json::json!({ "k": 1 }));
        note.content.preview_plain = Some("start".into());
        note.content.preview_html = Some("<p>start</p>".into());
        bridge.push(note);

        surface.edit("typed");

        let saved = bridge.last_saved().unwrap();
        assert_eq!(saved.content.text, "typed");
        assert!(saved.previews_cleared());
        assert_eq!(saved.client_data, serde_json::json!({ "k": 1 }));
    }

    #[test]
    fn test_metadata_update_keeps_previous_client_data() {
        let (bridge, surface, _controller) = setup();
        bridge.push(Note::new("n1", "a").with_client_data(serde_json::json!("first")));
        bridge.push(
            Note::new("n1", "a")
                .with_client_data(serde_json::json!("meta"))
                .with_metadata_update(true),
        );

        surface.edit("ab");

        let saved = bridge.last_saved().unwrap();
        assert_eq!(saved.client_data, serde_json::json!("first"));
    }

    #[test]
    fn test_save_updates_last_known_text() {
        let (bridge, surface, controller) = setup();
        bridge.push(Note::new("n1", "a"));

        surface.edit("abc");
        assert_eq!(controller.last_known_text().as_deref(), Some("abc"));

        // Host echoes the saved text back: nothing to write.
        bridge.push(Note::new("n1", "abc"));
        assert_eq!(surface.set_text_calls(), 1);
    }

    #[test]
    fn test_rejected_save_emits_failure() {
        let (bridge, surface, controller) = setup();
        bridge.push(Note::new("n1", "a"));
        bridge.set_reject_saves(true);

        let events = Rc::new(RefCell::new(Vec::new()));
        let events_clone = Rc::clone(&events);
        let _sub = controller.subscribe(move |e| events_clone.borrow_mut().push(e));

        surface.edit("ab");

        let events = events.borrow();
        assert!(matches!(events[0], EditorEvent::SaveRequested { .. }));
        assert!(matches!(&events[1], EditorEvent::SaveFailed { uuid, .. } if uuid == "n1"));
        assert_eq!(controller.last_known_text().as_deref(), Some("a"));
    }

    #[test]
    fn test_hook_after_controller_dropped_is_noop() {
        let (bridge, surface, controller) = setup();
        bridge.push(Note::new("n1", "a"));
        bridge.set_deferred(true);
        surface.edit("ab");

        let handle = controller.current_note().unwrap();
        drop(controller);
        bridge.flush();

        assert_eq!(handle.borrow().content.text, "a");
    }

    #[test]
    fn test_events_describe_inbound_flow() {
        let (bridge, _surface, controller) = setup();
        let events = Rc::new(RefCell::new(Vec::new()));
        let events_clone = Rc::clone(&events);
        let _sub = controller.subscribe(move |e| events_clone.borrow_mut().push(e));

        bridge.push(Note::new("n1", "hey"));
        bridge.push(Note::new("n1", "hey").with_metadata_update(true));

        let events = events.borrow();
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[0], EditorEvent::NoteOpened { uuid, .. } if uuid == "n1"));
        assert!(matches!(events[1], EditorEvent::SurfaceUpdated { length: 3, .. }));
        assert!(matches!(events[2], EditorEvent::MetadataSkipped { .. }));
    }

    #[test]
    fn test_attach_applies_selection_styling_for_environment() {
        use crate::config::HostEnvironment;

        let bridge = Rc::new(InMemoryBridge::with_environment(HostEnvironment::Mobile, None));
        let surface = Rc::new(InMemorySurface::new());
        let controller = SyncController::new(bridge);
        controller.attach_surface(surface.clone());

        assert_eq!(surface.option("styleSelectedText"), Some(false.into()));
        assert!(controller.has_surface());
    }
}
