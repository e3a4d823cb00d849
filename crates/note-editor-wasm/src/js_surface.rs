//! JavaScript editing surface for WASM.
//!
//! Wraps the page's editor object (CodeMirror-style API) and implements the
//! `EditingSurface` trait by calling its methods. Thrown JS errors become
//! `SurfaceError`s on `set_text`; on the read paths they are logged and
//! treated as "nothing there".

use note_sync::surface::{
    ChangeHandler, EditingSurface, OptionValue, Position, Result, SurfaceError, Token,
};
use serde::Deserialize;
use std::cell::RefCell;
use wasm_bindgen::prelude::*;

/// Editing surface backed by a JS editor object.
///
/// The editor must expose `getValue`, `setValue`, `clearHistory`,
/// `getOption`, `setOption`, `on`, `coordsChar`, `getTokenAt` and `getLine`.
#[wasm_bindgen]
pub struct JsEditingSurface {
    editor: JsValue,
    /// Change listeners registered with the editor; kept alive for its lifetime
    listeners: RefCell<Vec<Closure<dyn Fn()>>>,
}

#[wasm_bindgen]
impl JsEditingSurface {
    #[wasm_bindgen(constructor)]
    pub fn new(editor: JsValue) -> Self {
        Self {
            editor,
            listeners: RefCell::new(Vec::new()),
        }
    }
}

/// Token as reported by the editor. Offsets are UTF-16 code units.
#[derive(Deserialize)]
struct JsToken {
    start: usize,
    end: usize,
    string: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl JsEditingSurface {
    /// Call `editor[name](...args)`.
    fn call(&self, name: &str, args: &[JsValue]) -> std::result::Result<JsValue, JsValue> {
        let method: js_sys::Function =
            js_sys::Reflect::get(&self.editor, &name.into())?.dyn_into()?;

        let js_args = js_sys::Array::new();
        for arg in args {
            js_args.push(arg);
        }
        method.apply(&self.editor, &js_args)
    }

    /// Call a read-only method, logging failures.
    fn query(&self, name: &str, args: &[JsValue]) -> Option<JsValue> {
        match self.call(name, args) {
            Ok(value) if value.is_undefined() || value.is_null() => None,
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("editor.{} failed: {}", name, crate::js_error_message(&e));
                None
            }
        }
    }

    fn position_to_js(pos: Position) -> JsValue {
        let obj = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&obj, &"line".into(), &(pos.line as f64).into());
        let _ = js_sys::Reflect::set(&obj, &"ch".into(), &(pos.ch as f64).into());
        obj.into()
    }
}

/// Convert a UTF-16 offset within `line` to a character offset.
fn utf16_to_char_offset(line: &str, offset: usize) -> usize {
    let mut units = 0;
    for (index, c) in line.chars().enumerate() {
        if units >= offset {
            return index;
        }
        units += c.len_utf16();
    }
    line.chars().count()
}

impl EditingSurface for JsEditingSurface {
    fn text(&self) -> String {
        self.query("getValue", &[])
            .and_then(|v| v.as_string())
            .unwrap_or_default()
    }

    fn set_text(&self, text: &str) -> Result<()> {
        self.call("setValue", &[JsValue::from_str(text)])
            .map(|_| ())
            .map_err(|e| SurfaceError::SetText(crate::js_error_message(&e)))
    }

    fn clear_history(&self) {
        let _ = self.query("clearHistory", &[]);
    }

    fn option(&self, name: &str) -> Option<OptionValue> {
        let value = self.query("getOption", &[JsValue::from_str(name)])?;
        if let Some(b) = value.as_bool() {
            Some(OptionValue::Bool(b))
        } else {
            value.as_string().map(OptionValue::Text)
        }
    }

    fn set_option(&self, name: &str, value: OptionValue) {
        let js_value = match value {
            OptionValue::Bool(b) => JsValue::from_bool(b),
            OptionValue::Text(s) => JsValue::from_str(&s),
        };
        let _ = self.query("setOption", &[JsValue::from_str(name), js_value]);
    }

    fn on_change(&self, handler: ChangeHandler) {
        let closure = Closure::<dyn Fn()>::new(move || handler());
        let _ = self.query(
            "on",
            &[JsValue::from_str("change"), closure.as_ref().clone()],
        );
        self.listeners.borrow_mut().push(closure);
    }

    fn coords_to_position(&self, x: f64, y: f64) -> Position {
        let coords = js_sys::Object::new();
        let _ = js_sys::Reflect::set(&coords, &"left".into(), &x.into());
        let _ = js_sys::Reflect::set(&coords, &"top".into(), &y.into());

        self.query("coordsChar", &[coords.into()])
            .and_then(|v| serde_wasm_bindgen::from_value::<Position>(v).ok())
            .unwrap_or_default()
    }

    fn token_at(&self, pos: Position) -> Option<Token> {
        let raw = self.query("getTokenAt", &[Self::position_to_js(pos)])?;
        let token: JsToken = match serde_wasm_bindgen::from_value(raw) {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Unreadable token at {}:{}: {}", pos.line, pos.ch, e);
                return None;
            }
        };

        let line = self.line(pos.line).unwrap_or_default();
        Some(Token {
            start: utf16_to_char_offset(&line, token.start),
            end: utf16_to_char_offset(&line, token.end),
            text: token.string,
            kind: token.kind,
        })
    }

    fn line(&self, line: usize) -> Option<String> {
        self.query("getLine", &[JsValue::from_f64(line as f64)])
            .and_then(|v| v.as_string())
    }
}
