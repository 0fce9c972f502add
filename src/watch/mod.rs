// src/watch/mod.rs

//! Filesystem watching for the `watch` command.
//!
//! - [`watcher`] runs the notify watcher and the coalescing loop.
//! - [`patterns`] compiles the watch / exclude globs.
//! - [`hash`] tracks file content hashes to drop no-op events.
//! - [`path_utils`] relates event paths to the watched root.

pub mod hash;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use patterns::WatchFilter;
pub use watcher::{WatchLoop, WatchSettings, WatchState};
