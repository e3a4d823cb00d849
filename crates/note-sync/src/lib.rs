//! note-sync: editor core for a markdown note editor embedded in a host app.
//!
//! This crate provides:
//! - The `Note` record the host owns, with lossless serde round-tripping
//! - `SyncController`, which keeps the editing surface and the note in step
//! - Link lookup on the surface (backed by `link-spans`)
//! - `HostBridge` and `EditingSurface` trait abstractions, with in-memory
//!   implementations for tests

pub mod bridge;
pub mod config;
pub mod controller;
pub mod events;
pub mod links;
pub mod note;
pub mod surface;

pub use bridge::{initial_permissions, BridgeError, HostBridge, InMemoryBridge, Permission};
pub use config::{EditorConfig, HostEnvironment, InputStyle};
pub use controller::{SyncController, SyncState};
pub use events::{EditorEvent, EventBus, Subscription};
pub use links::{resolve_link_at, resolve_link_at_coords};
pub use note::{Note, NoteContent, NoteHandle};
pub use surface::{EditingSurface, InMemorySurface, OptionValue, Position, SurfaceError, Token};
