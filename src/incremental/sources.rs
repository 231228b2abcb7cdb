// src/incremental/sources.rs

//! Where the current source snapshot comes from.

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::watch::patterns::{collect_matching_files, SourcePatterns};

/// Provides the set of source units for one pass.
pub trait SourceSet: Debug {
    fn snapshot(&self) -> Result<BTreeSet<PathBuf>>;
}

/// A fixed list of sources.
impl SourceSet for BTreeSet<PathBuf> {
    fn snapshot(&self) -> Result<BTreeSet<PathBuf>> {
        Ok(self.clone())
    }
}

/// Files under a root selected by glob patterns, as root-relative paths.
#[derive(Debug, Clone)]
pub struct GlobSourceSet {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    patterns: SourcePatterns,
}

impl GlobSourceSet {
    pub fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>, patterns: SourcePatterns) -> Self {
        Self {
            fs,
            root: root.into(),
            patterns,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn patterns(&self) -> &SourcePatterns {
        &self.patterns
    }
}

impl SourceSet for GlobSourceSet {
    fn snapshot(&self) -> Result<BTreeSet<PathBuf>> {
        let files = collect_matching_files(self.fs.as_ref(), &self.root, &self.patterns)?;
        let sources: BTreeSet<PathBuf> = files
            .into_iter()
            .filter_map(|p| p.strip_prefix(&self.root).ok().map(Path::to_path_buf))
            .collect();
        debug!(root = ?self.root, sources = sources.len(), "collected source snapshot");
        Ok(sources)
    }
}
