//! EditingSurface trait abstraction over the embedded text widget.
//!
//! Implementations:
//! - `InMemorySurface` - For testing
//! - `JsEditingSurface` (in note-editor-wasm) - Wraps the page's editor object
//!
//! Methods take `&self`: the widget is shared with the page and may call the
//! registered change handlers synchronously from inside `set_text`.

use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("Failed to set editor text: {0}")]
    SetText(String),
}

pub type Result<T> = std::result::Result<T, SurfaceError>;

/// Called after every change to the surface text, programmatic or not.
pub type ChangeHandler = Box<dyn Fn()>;

/// Line/character position in the surface (both zero-based).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub ch: usize,
}

impl Position {
    pub fn new(line: usize, ch: usize) -> Self {
        Self { line, ch }
    }
}

/// Token reported by the surface's tokenizer.
///
/// `start`/`end` are character offsets within the token's line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub start: usize,
    pub end: usize,
    #[serde(rename = "string")]
    pub text: String,
    /// Space-separated token classes, e.g. `"link"` or `"header header-1"`
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// Value of a named surface display option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Text(String),
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Text(value.to_string())
    }
}

/// Capabilities of the text widget the editor core relies on.
pub trait EditingSurface {
    /// Full current text
    fn text(&self) -> String;

    /// Replace the full text. Fires change handlers.
    fn set_text(&self, text: &str) -> Result<()>;

    /// Drop the undo/redo history
    fn clear_history(&self);

    fn option(&self, name: &str) -> Option<OptionValue>;

    fn set_option(&self, name: &str, value: OptionValue);

    /// Register a handler for text changes
    fn on_change(&self, handler: ChangeHandler);

    /// Map a page coordinate to the nearest text position
    fn coords_to_position(&self, x: f64, y: f64) -> Position;

    /// Token covering `pos`, if the line has one there
    fn token_at(&self, pos: Position) -> Option<Token>;

    /// Raw text of a line, without its terminator
    fn line(&self, line: usize) -> Option<String>;
}

/// Page-coordinate cell size used by `InMemorySurface`.
pub const CHAR_WIDTH: f64 = 8.0;
pub const LINE_HEIGHT: f64 = 16.0;

/// In-memory surface for testing.
///
/// Behaves like a real widget where it matters to the sync protocol:
/// `set_text` and `edit` fire change handlers synchronously. Tokens are
/// whitespace-separated words; words that look like URLs are typed `link`
/// unless a test overrides the token for a line.
pub struct InMemorySurface {
    text: RefCell<String>,
    options: RefCell<HashMap<String, OptionValue>>,
    handlers: RefCell<Vec<Rc<dyn Fn()>>>,
    token_overrides: RefCell<HashMap<usize, Token>>,
    history_clears: Cell<usize>,
    set_text_calls: Cell<usize>,
    fail_next_set: Cell<bool>,
}

impl InMemorySurface {
    pub fn new() -> Self {
        Self::with_text("")
    }

    pub fn with_text(text: &str) -> Self {
        Self {
            text: RefCell::new(text.to_string()),
            options: RefCell::new(HashMap::new()),
            handlers: RefCell::new(Vec::new()),
            token_overrides: RefCell::new(HashMap::new()),
            history_clears: Cell::new(0),
            set_text_calls: Cell::new(0),
            fail_next_set: Cell::new(false),
        }
    }

    /// Simulate the user typing: replace the text and notify handlers.
    pub fn edit(&self, text: &str) {
        *self.text.borrow_mut() = text.to_string();
        self.notify();
    }

    /// Make the next `set_text` fail. Handlers still fire, as a widget
    /// that half-applied the change would.
    pub fn fail_next_set_text(&self) {
        self.fail_next_set.set(true);
    }

    /// Report `token` for every position on `line`.
    pub fn override_token(&self, line: usize, token: Token) {
        self.token_overrides.borrow_mut().insert(line, token);
    }

    /// How many times the undo history was cleared
    pub fn history_clears(&self) -> usize {
        self.history_clears.get()
    }

    /// How many times `set_text` was called (including failures)
    pub fn set_text_calls(&self) -> usize {
        self.set_text_calls.get()
    }

    fn notify(&self) {
        // Clone the handler list so a handler may register another.
        let handlers: Vec<_> = self.handlers.borrow().iter().map(Rc::clone).collect();
        for handler in handlers {
            handler();
        }
    }

    fn word_at(line: &str, ch: usize) -> Option<Token> {
        let chars: Vec<char> = line.chars().collect();
        let ch = ch.min(chars.len());

        let mut start = ch;
        while start > 0 && !chars[start - 1].is_whitespace() {
            start -= 1;
        }
        let mut end = ch;
        while end < chars.len() && !chars[end].is_whitespace() {
            end += 1;
        }
        if start == end {
            return None;
        }

        let text: String = chars[start..end].iter().collect();
        let kind = if text.contains("://") || text.starts_with("www.") {
            Some("link".to_string())
        } else {
            None
        };
        Some(Token {
            start,
            end,
            text,
            kind,
        })
    }
}

impl Default for InMemorySurface {
    fn default() -> Self {
        Self::new()
    }
}

impl EditingSurface for InMemorySurface {
    fn text(&self) -> String {
        self.text.borrow().clone()
    }

    fn set_text(&self, text: &str) -> Result<()> {
        self.set_text_calls.set(self.set_text_calls.get() + 1);
        if self.fail_next_set.replace(false) {
            self.notify();
            return Err(SurfaceError::SetText("simulated failure".to_string()));
        }

        *self.text.borrow_mut() = text.to_string();
        self.notify();
        Ok(())
    }

    fn clear_history(&self) {
        self.history_clears.set(self.history_clears.get() + 1);
    }

    fn option(&self, name: &str) -> Option<OptionValue> {
        self.options.borrow().get(name).cloned()
    }

    fn set_option(&self, name: &str, value: OptionValue) {
        self.options.borrow_mut().insert(name.to_string(), value);
    }

    fn on_change(&self, handler: ChangeHandler) {
        self.handlers.borrow_mut().push(Rc::from(handler));
    }

    fn coords_to_position(&self, x: f64, y: f64) -> Position {
        let line_count = self.text.borrow().split('\n').count();
        let line = ((y.max(0.0) / LINE_HEIGHT) as usize).min(line_count.saturating_sub(1));
        let line_len = self.line(line).map(|l| l.chars().count()).unwrap_or(0);
        let ch = ((x.max(0.0) / CHAR_WIDTH) as usize).min(line_len);
        Position { line, ch }
    }

    fn token_at(&self, pos: Position) -> Option<Token> {
        if let Some(token) = self.token_overrides.borrow().get(&pos.line) {
            return Some(token.clone());
        }
        let line = self.line(pos.line)?;
        Self::word_at(&line, pos.ch)
    }

    fn line(&self, line: usize) -> Option<String> {
        self.text.borrow().split('\n').nth(line).map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_text_fires_handlers() {
        let surface = InMemorySurface::new();
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        surface.on_change(Box::new(move || c.set(c.get() + 1)));

        surface.set_text("hello").unwrap();
        surface.edit("hello!");

        assert_eq!(surface.text(), "hello!");
        assert_eq!(count.get(), 2);
    }

    #[test]
    fn test_failed_set_text_keeps_old_text() {
        let surface = InMemorySurface::with_text("before");
        surface.fail_next_set_text();

        assert!(matches!(surface.set_text("after"), Err(SurfaceError::SetText(_))));
        assert_eq!(surface.text(), "before");

        surface.set_text("after").unwrap();
        assert_eq!(surface.text(), "after");
        assert_eq!(surface.set_text_calls(), 2);
    }

    #[test]
    fn test_lines_and_tokens() {
        let surface = InMemorySurface::with_text("first line\nsee www.example.com now");

        assert_eq!(surface.line(0).as_deref(), Some("first line"));
        assert_eq!(surface.line(2), None);

        let token = surface.token_at(Position::new(1, 6)).unwrap();
        assert_eq!(token.text, "www.example.com");
        assert_eq!((token.start, token.end), (4, 19));
        assert_eq!(token.kind.as_deref(), Some("link"));

        let token = surface.token_at(Position::new(0, 2)).unwrap();
        assert_eq!(token.text, "first");
        assert_eq!(token.kind, None);
    }

    #[test]
    fn test_token_on_whitespace_is_none() {
        let surface = InMemorySurface::with_text("a  b");
        assert_eq!(surface.token_at(Position::new(0, 2)), None);
    }

    #[test]
    fn test_coords_map_to_clamped_positions() {
        let surface = InMemorySurface::with_text("abc\nde");

        assert_eq!(surface.coords_to_position(9.0, 1.0), Position::new(0, 1));
        assert_eq!(surface.coords_to_position(8.0 * 10.0, 16.0), Position::new(1, 2));
        assert_eq!(surface.coords_to_position(0.0, 16.0 * 50.0), Position::new(1, 0));
        assert_eq!(surface.coords_to_position(-5.0, -5.0), Position::new(0, 0));
    }

    #[test]
    fn test_options_round_trip() {
        let surface = InMemorySurface::new();
        assert_eq!(surface.option("spellcheck"), None);

        surface.set_option("spellcheck", true.into());
        surface.set_option("mode", "gfm".into());

        assert_eq!(surface.option("spellcheck"), Some(OptionValue::Bool(true)));
        assert_eq!(surface.option("mode"), Some(OptionValue::Text("gfm".into())));
    }

    #[test]
    fn test_token_deserializes_editor_shape() {
        let token: Token = serde_json::from_str(
            r#"{"start":4,"end":9,"string":"a.com","type":"link"}"#,
        )
        .unwrap();
        assert_eq!(token.text, "a.com");
        assert_eq!(token.kind.as_deref(), Some("link"));

        let token: Token =
            serde_json::from_str(r#"{"start":0,"end":1,"string":"x","type":null}"#).unwrap();
        assert_eq!(token.kind, None);
    }
}
