// src/watch/mod.rs

//! Source selection and triggered execution.
//!
//! - [`patterns`] compiles the `[sources]` include/exclude globs and walks a
//!   tree for matching files.
//! - [`watcher`] wraps `notify` to report debounced batches of changed
//!   source paths.
//!
//! Neither knows about tasks; the caller decides what to re-run.

pub mod patterns;
pub mod watcher;

pub use patterns::{collect_matching_files, relative_str, SourcePatterns};
pub use watcher::{spawn_watcher, ChangeFilter, SourceWatcher, DEFAULT_DEBOUNCE};
