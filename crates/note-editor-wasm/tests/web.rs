//! Browser tests for the JS bindings, run with `wasm-pack test --headless`.

#![cfg(target_arch = "wasm32")]

use js_sys::{Array, Function, Reflect};
use note_editor_wasm::{resolve_link, JsEditingSurface, JsHostBridge, WasmNoteEditor};
use wasm_bindgen::prelude::*;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

/// Minimal CodeMirror-shaped editor: whitespace tokens, 8px wide characters.
const FAKE_EDITOR: &str = r#"
return {
  value: "", options: {}, handlers: [], historyClears: 0,
  getValue() { return this.value; },
  setValue(v) { this.value = v; this.handlers.forEach(h => h()); },
  clearHistory() { this.historyClears++; },
  getOption(n) { return this.options[n]; },
  setOption(n, v) { this.options[n] = v; },
  on(ev, h) { if (ev === "change") this.handlers.push(h); },
  getLine(n) { return this.value.split("\n")[n]; },
  coordsChar(c) { return { line: Math.floor(c.top / 16), ch: Math.floor(c.left / 8) }; },
  getTokenAt(p) {
    const line = this.getLine(p.line) || "";
    let start = p.ch, end = p.ch;
    while (start > 0 && line[start - 1] !== " ") start--;
    while (end < line.length && line[end] !== " ") end++;
    const string = line.slice(start, end);
    return { start, end, string, type: string.includes("://") ? "link" : null };
  },
};
"#;

fn get(target: &JsValue, key: &str) -> JsValue {
    Reflect::get(target, &key.into()).unwrap()
}

/// Editor wired to a fake widget and a host that records every save.
fn setup() -> (WasmNoteEditor, JsValue, Array) {
    let editor = Function::new_no_args(FAKE_EDITOR).call0(&JsValue::NULL).unwrap();
    let saves = Array::new();
    let request_presave = Function::new_with_args(
        "saves",
        "return (uuid, presave) => { saves.push({ uuid, note: presave() }); };",
    )
    .call1(&JsValue::NULL, &saves)
    .unwrap()
    .dyn_into::<Function>()
    .unwrap();

    let bridge = JsHostBridge::new(request_presave, Some("desktop".into()), None);
    let note_editor = WasmNoteEditor::new(bridge);
    note_editor.attach_surface(JsEditingSurface::new(editor.clone()));
    (note_editor, editor, saves)
}

fn note(uuid: &str, text: &str) -> JsValue {
    js_sys::JSON::parse(&format!(
        r#"{{"uuid":"{}","content":{{"text":"{}","spellcheck":true,"preview_plain":"p"}},"clientData":{{"k":1}}}}"#,
        uuid, text
    ))
    .unwrap()
}

#[wasm_bindgen_test]
fn resolve_link_expands_the_token() {
    assert_eq!(
        resolve_link("see https://a.io/x,y now", 4, 16, Some("link".into())).as_deref(),
        Some("https://a.io/x,y")
    );
    assert_eq!(resolve_link("plain words", 0, 5, None), None);
}

#[wasm_bindgen_test]
fn inbound_note_is_rendered_without_saving() {
    let (note_editor, editor, saves) = setup();

    note_editor.on_note_received(note("a", "hello")).unwrap();

    assert_eq!(get(&editor, "value").as_string().as_deref(), Some("hello"));
    assert_eq!(get(&editor, "historyClears").as_f64(), Some(1.0));
    assert_eq!(saves.length(), 0);
    assert_eq!(note_editor.current_note_uuid().as_deref(), Some("a"));
}

#[wasm_bindgen_test]
fn user_edit_is_saved_through_presave() {
    let (note_editor, editor, saves) = setup();
    note_editor.on_note_received(note("a", "hello")).unwrap();

    let set_value: Function = get(&editor, "setValue").dyn_into().unwrap();
    set_value.call1(&editor, &"hello!".into()).unwrap();

    assert_eq!(saves.length(), 1);
    let saved = saves.get(0);
    assert_eq!(get(&saved, "uuid").as_string().as_deref(), Some("a"));
    let content = get(&get(&saved, "note"), "content");
    assert_eq!(get(&content, "text").as_string().as_deref(), Some("hello!"));
    assert!(get(&content, "preview_plain").is_null());
}

#[wasm_bindgen_test]
fn malformed_note_is_rejected() {
    let (note_editor, _editor, _saves) = setup();
    assert!(note_editor.on_note_received(JsValue::from_str("nope")).is_err());
    assert_eq!(note_editor.current_note_uuid(), None);
}

#[wasm_bindgen_test]
fn link_under_coordinates_is_resolved() {
    let (note_editor, _editor, _saves) = setup();
    note_editor
        .on_note_received(note("a", "intro\\ngo http://a.io/x done"))
        .unwrap();

    // Line 1, character 6 sits inside the URL.
    assert_eq!(
        note_editor.resolve_link_at_coords(6.0 * 8.0 + 1.0, 16.0 + 1.0).as_deref(),
        Some("http://a.io/x")
    );
    assert_eq!(note_editor.resolve_link_at(1, 0), None);
}
