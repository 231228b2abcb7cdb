// src/config/mod.rs

//! Build definition loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it before any task is built (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{
    CompileSection, ConfigFile, ConfigSection, RawConfigFile, SourcesSection, TaskConfig,
};
pub use validate::BUILTIN_TASKS;
