// src/incremental/store.rs

//! Loading, saving and reverting the [`Analysis`].

use std::ffi::OsString;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::{BuildError, Result};
use crate::fs::FileSystem;
use crate::incremental::analysis::Analysis;

/// Default location of the persisted analysis, relative to the project root.
pub const DEFAULT_ANALYSIS_PATH: &str = ".steadybuild/analysis.json";

/// Version of the on-disk envelope. Anything else is rejected at load.
pub const ANALYSIS_FORMAT: u32 = 1;

/// Owner of the in-memory analysis and its last persisted snapshot.
///
/// Mutations go to the in-memory copy; `save` makes them the new snapshot,
/// `revert` throws them away. There is no internal locking: one change
/// detection pass owns a store at a time.
pub trait AnalysisStore: Debug {
    /// Replace the in-memory state with the persisted one.
    ///
    /// Absent state loads as empty. Unreadable state is reported as
    /// [`BuildError::AnalysisCorrupt`] and leaves the store empty, so the
    /// caller may either abort or carry on from scratch.
    fn load(&mut self) -> Result<()>;

    /// Persist the in-memory state and make it the revert point.
    fn save(&mut self) -> Result<()>;

    /// Discard in-memory mutations since the last load or save.
    fn revert(&mut self);

    /// Empty the in-memory relation (persisted on the next save).
    fn clear(&mut self);

    fn analysis(&self) -> &Analysis;
    fn analysis_mut(&mut self) -> &mut Analysis;
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedAnalysis {
    format: u32,
    /// blake3 of the canonical JSON encoding of `analysis`.
    checksum: String,
    analysis: Analysis,
}

fn checksum(analysis: &Analysis) -> Result<String> {
    let bytes = serde_json::to_vec(analysis)?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Serialize `analysis` into the on-disk envelope.
pub fn encode_analysis(analysis: &Analysis) -> Result<Vec<u8>> {
    let envelope = PersistedAnalysis {
        format: ANALYSIS_FORMAT,
        checksum: checksum(analysis)?,
        analysis: analysis.clone(),
    };
    let mut bytes = serde_json::to_vec_pretty(&envelope)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parse and verify an on-disk envelope read from `path`.
pub fn decode_analysis(path: &Path, bytes: &[u8]) -> Result<Analysis> {
    let corrupt = |reason: String| BuildError::AnalysisCorrupt {
        path: path.to_path_buf(),
        reason,
    };

    let envelope: PersistedAnalysis =
        serde_json::from_slice(bytes).map_err(|e| corrupt(format!("unreadable: {e}")))?;

    if envelope.format != ANALYSIS_FORMAT {
        return Err(corrupt(format!(
            "unsupported format {} (expected {})",
            envelope.format, ANALYSIS_FORMAT
        )));
    }

    let actual = checksum(&envelope.analysis)?;
    if actual != envelope.checksum {
        return Err(corrupt(format!(
            "checksum mismatch (recorded {}, computed {})",
            envelope.checksum, actual
        )));
    }

    Ok(envelope.analysis)
}

/// Stores the analysis in a file, written atomically (temp file + rename).
#[derive(Debug)]
pub struct FileAnalysisStore {
    path: PathBuf,
    fs: Arc<dyn FileSystem>,
    current: Analysis,
    snapshot: Analysis,
    /// Whether the file on disk holds exactly `snapshot`.
    on_disk: bool,
}

impl FileAnalysisStore {
    pub fn new(path: PathBuf, fs: Arc<dyn FileSystem>) -> Self {
        Self {
            path,
            fs,
            current: Analysis::default(),
            snapshot: Analysis::default(),
            on_disk: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name: OsString = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl AnalysisStore for FileAnalysisStore {
    fn load(&mut self) -> Result<()> {
        self.current = Analysis::default();
        self.snapshot = Analysis::default();
        self.on_disk = false;

        if !self.fs.exists(&self.path) {
            debug!(path = ?self.path, "no persisted analysis; starting empty");
            return Ok(());
        }

        let bytes = self.fs.read(&self.path)?;
        let analysis = decode_analysis(&self.path, &bytes)?;
        debug!(
            path = ?self.path,
            sources = analysis.all_sources().len(),
            "loaded analysis"
        );
        self.snapshot = analysis.clone();
        self.current = analysis;
        self.on_disk = true;
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        if self.on_disk && self.current == self.snapshot {
            debug!(path = ?self.path, "analysis unchanged; not rewriting");
            return Ok(());
        }

        let bytes = encode_analysis(&self.current)?;
        let temp = self.temp_path();
        self.fs.write(&temp, &bytes)?;
        self.fs.rename(&temp, &self.path)?;
        self.snapshot = self.current.clone();
        self.on_disk = true;

        info!(
            path = ?self.path,
            sources = self.current.all_sources().len(),
            "saved analysis"
        );
        Ok(())
    }

    fn revert(&mut self) {
        debug!(path = ?self.path, "reverting analysis to last persisted state");
        self.current = self.snapshot.clone();
    }

    fn clear(&mut self) {
        self.current.clear();
    }

    fn analysis(&self) -> &Analysis {
        &self.current
    }

    fn analysis_mut(&mut self) -> &mut Analysis {
        &mut self.current
    }
}

/// Keeps the "persisted" snapshot in memory only (lost on exit).
#[derive(Debug, Default)]
pub struct MemoryAnalysisStore {
    current: Analysis,
    snapshot: Analysis,
}

impl MemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The state as of the last save.
    pub fn persisted(&self) -> &Analysis {
        &self.snapshot
    }
}

impl AnalysisStore for MemoryAnalysisStore {
    fn load(&mut self) -> Result<()> {
        self.current = self.snapshot.clone();
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        self.snapshot = self.current.clone();
        info!(
            sources = self.current.all_sources().len(),
            "saved analysis (memory)"
        );
        Ok(())
    }

    fn revert(&mut self) {
        self.current = self.snapshot.clone();
    }

    fn clear(&mut self) {
        self.current.clear();
    }

    fn analysis(&self) -> &Analysis {
        &self.current
    }

    fn analysis_mut(&mut self) -> &mut Analysis {
        &mut self.current
    }
}
