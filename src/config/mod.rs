// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - [`model`] defines the TOML-backed data model and the derived
//!   directory [`Layout`].
//! - [`loader`] reads a config file from disk (or falls back to defaults).
//! - [`validate`] turns a `RawConfigFile` into a checked `ConfigFile`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, load_or_default};
pub use model::{
    CompileSection, ConfigFile, ConfigSection, Layout, LintSection, PathsSection,
    RawConfigFile, ServerSection, WatchSection,
};
