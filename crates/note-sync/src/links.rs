//! Link lookup on the editing surface.
//!
//! Glues the surface's tokenizer to `link_spans`: find the token under a
//! position, fetch its line, expand the token to the full URL.

use crate::surface::{EditingSurface, Position};

/// URL under `pos`, or `None` when the pointer is not over a link.
pub fn resolve_link_at(surface: &dyn EditingSurface, pos: Position) -> Option<String> {
    let token = surface.token_at(pos)?;
    let line = surface.line(pos.line)?;
    let url = link_spans::resolve_link(&line, token.start, token.end, token.kind.as_deref());
    if let Some(url) = &url {
        tracing::debug!("Resolved link at {}:{} -> {}", pos.line, pos.ch, url);
    }
    url
}

/// URL under a page coordinate.
pub fn resolve_link_at_coords(surface: &dyn EditingSurface, x: f64, y: f64) -> Option<String> {
    resolve_link_at(surface, surface.coords_to_position(x, y))
}
