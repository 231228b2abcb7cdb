// src/incremental/oracle.rs

use std::fmt::Debug;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::trace;

use crate::fs::FileSystem;

/// Existence and last-modified answers for the three kinds of units.
///
/// `None` means "does not exist" (for externals: "not available").
pub trait Oracle: Debug {
    fn source_modified(&self, source: &Path) -> Option<SystemTime>;
    fn artifact_modified(&self, artifact: &Path) -> Option<SystemTime>;
    fn external_modified(&self, external: &Path) -> Option<SystemTime>;
}

/// Oracle backed by a [`FileSystem`].
///
/// An external is available only if it resolves against the current search
/// path (it is one of the entries, or lies under a directory entry) and
/// exists on disk. A library still present on disk but dropped from the
/// search path counts as gone.
///
/// Relative paths are resolved against the project root, if one is set.
/// Externals and search-path entries are compared in project-relative form:
/// a leading `./` is ignored, and absolute paths under the root lose the
/// root prefix.
#[derive(Debug, Clone)]
pub struct FsOracle {
    fs: Arc<dyn FileSystem>,
    root: Option<PathBuf>,
    search_path: Vec<PathBuf>,
}

impl FsOracle {
    pub fn new(fs: Arc<dyn FileSystem>, search_path: Vec<PathBuf>) -> Self {
        Self {
            fs,
            root: None,
            search_path,
        }
    }

    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn search_path(&self) -> &[PathBuf] {
        &self.search_path
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) => root.join(path),
            None => path.to_path_buf(),
        }
    }

    fn project_relative(&self, path: &Path) -> PathBuf {
        let path = match &self.root {
            Some(root) if path.is_absolute() => path.strip_prefix(root).unwrap_or(path),
            _ => path,
        };
        path.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    }

    fn on_search_path(&self, external: &Path) -> bool {
        self.search_path
            .iter()
            .map(|entry| self.project_relative(entry))
            .any(|entry| external.starts_with(&entry))
    }
}

impl Oracle for FsOracle {
    fn source_modified(&self, source: &Path) -> Option<SystemTime> {
        self.fs.modified(&self.resolve(source))
    }

    fn artifact_modified(&self, artifact: &Path) -> Option<SystemTime> {
        self.fs.modified(&self.resolve(artifact))
    }

    fn external_modified(&self, external: &Path) -> Option<SystemTime> {
        let external = self.project_relative(external);
        if !self.on_search_path(&external) {
            trace!(external = ?external, "external not on search path");
            return None;
        }
        self.fs.modified(&self.resolve(&external))
    }
}
