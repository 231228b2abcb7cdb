// src/incremental/compile.rs

//! One incremental compilation pass and the tasks that run it.
//!
//! A pass loads the analysis, detects changes, deletes stale artifacts,
//! hands the dirty sources to the compiler and then either saves the updated
//! analysis (success) or reverts to the last saved one (failure). A failed
//! pass never leaves a partial analysis on disk, and the artifacts it wrote
//! are deleted so its sources are compiled again by the next pass.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::Task;
use crate::errors::{BuildError, Result};
use crate::fs::FileSystem;
use crate::incremental::analysis::Analysis;
use crate::incremental::compiler::{AnalysisRecorder, CompileRequest, CompilerAdapter};
use crate::incremental::detect::{detect_changes, ConditionalAnalysis};
use crate::incremental::oracle::Oracle;
use crate::incremental::sources::SourceSet;
use crate::incremental::store::AnalysisStore;
use crate::types::{ActionResult, CorruptAnalysisBehaviour};

/// Static inputs of a compile pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileSettings {
    pub label: String,
    pub search_path: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub options: Vec<String>,
    pub corrupt_analysis: CorruptAnalysisBehaviour,
    /// Root that relative artifact paths are resolved against when deleting.
    pub root: Option<PathBuf>,
}

impl Default for CompileSettings {
    fn default() -> Self {
        Self {
            label: "main".to_string(),
            search_path: Vec::new(),
            output_dir: PathBuf::from("target/classes"),
            options: Vec::new(),
            corrupt_analysis: CorruptAnalysisBehaviour::default(),
            root: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    /// Nothing changed; the compiler was not invoked.
    UpToDate,
    /// The analysis was updated and saved.
    Compiled(ConditionalAnalysis),
    /// The compiler failed; the analysis was reverted.
    Failed {
        message: String,
        changes: ConditionalAnalysis,
    },
}

impl CompileOutcome {
    pub fn changes(&self) -> Option<&ConditionalAnalysis> {
        match self {
            CompileOutcome::UpToDate => None,
            CompileOutcome::Compiled(changes) => Some(changes),
            CompileOutcome::Failed { changes, .. } => Some(changes),
        }
    }

    pub fn into_action_result(self) -> ActionResult {
        match self {
            CompileOutcome::Failed { message, .. } => Err(message),
            _ => Ok(()),
        }
    }
}

/// A compile action assembled from explicit collaborators.
#[derive(Debug)]
pub struct IncrementalCompile {
    settings: CompileSettings,
    fs: Arc<dyn FileSystem>,
    sources: Box<dyn SourceSet>,
    store: Box<dyn AnalysisStore>,
    oracle: Box<dyn Oracle>,
    compiler: Box<dyn CompilerAdapter>,
}

impl IncrementalCompile {
    pub fn new(
        settings: CompileSettings,
        fs: Arc<dyn FileSystem>,
        sources: Box<dyn SourceSet>,
        store: Box<dyn AnalysisStore>,
        oracle: Box<dyn Oracle>,
        compiler: Box<dyn CompilerAdapter>,
    ) -> Self {
        Self {
            settings,
            fs,
            sources,
            store,
            oracle,
            compiler,
        }
    }

    pub fn settings(&self) -> &CompileSettings {
        &self.settings
    }

    /// The in-memory analysis as left by the last pass.
    pub fn analysis(&self) -> &Analysis {
        self.store.analysis()
    }

    /// Run one pass. `Err` is reserved for analysis I/O problems; a compiler
    /// failure is reported as [`CompileOutcome::Failed`].
    pub fn run(&mut self) -> Result<CompileOutcome> {
        self.load_analysis()?;

        let snapshot = self.sources.snapshot()?;
        let changes = detect_changes(&snapshot, self.store.analysis_mut(), self.oracle.as_ref());

        if changes.is_up_to_date() {
            info!(label = %self.settings.label, sources = snapshot.len(), "compilation up to date");
            self.store.save()?;
            return Ok(CompileOutcome::UpToDate);
        }

        self.delete_products(&changes.stale_products);

        if changes.dirty_sources.is_empty() {
            info!(
                label = %self.settings.label,
                removed = changes.removed_sources_count,
                "only removals; nothing to compile"
            );
            self.store.save()?;
            return Ok(CompileOutcome::Compiled(changes));
        }

        info!(
            label = %self.settings.label,
            dirty = changes.dirty_sources.len(),
            clean = changes.clean_sources.len(),
            "compiling modified sources"
        );

        let request = CompileRequest {
            label: &self.settings.label,
            sources: &changes.dirty_sources,
            search_path: &self.settings.search_path,
            output_dir: &self.settings.output_dir,
            options: &self.settings.options,
        };

        let (result, generated) = {
            let mut recorder = AnalysisRecorder::new(self.store.analysis_mut(), &snapshot);
            let result = self.compiler.compile(&request, &mut recorder);
            (result, recorder.into_generated_products())
        };

        match result {
            Ok(()) => {
                self.store.save()?;
                Ok(CompileOutcome::Compiled(changes))
            }
            Err(message) => {
                warn!(
                    label = %self.settings.label,
                    written = generated.len(),
                    "compilation failed; removing partial output and reverting analysis"
                );
                // Output of a failed pass must not look up to date next time,
                // including artifacts rewritten without being reported.
                let partial: BTreeSet<PathBuf> =
                    generated.union(&changes.stale_products).cloned().collect();
                self.delete_products(&partial);
                self.store.revert();
                Ok(CompileOutcome::Failed { message, changes })
            }
        }
    }

    /// Delete every recorded artifact and persist an empty analysis.
    /// Returns how many artifacts were recorded.
    pub fn clean(&mut self) -> Result<usize> {
        self.load_analysis()?;
        let products = self.store.analysis().all_products();
        self.delete_products(&products);
        self.store.clear();
        self.store.save()?;
        info!(label = %self.settings.label, artifacts = products.len(), "cleaned");
        Ok(products.len())
    }

    fn load_analysis(&mut self) -> Result<()> {
        match self.store.load() {
            Ok(()) => Ok(()),
            Err(err @ BuildError::AnalysisCorrupt { .. }) => match self.settings.corrupt_analysis {
                CorruptAnalysisBehaviour::Reset => {
                    warn!(error = %err, "discarding unreadable analysis; everything will be recompiled");
                    self.store.clear();
                    Ok(())
                }
                CorruptAnalysisBehaviour::Fail => Err(err),
            },
            Err(err) => Err(err),
        }
    }

    fn delete_products(&self, products: &BTreeSet<PathBuf>) {
        for product in products {
            let path = self.resolve(product);
            if !self.fs.exists(&path) {
                continue;
            }
            match self.fs.remove_file(&path) {
                Ok(()) => debug!(artifact = ?path, "deleted stale artifact"),
                Err(err) => warn!(artifact = ?path, error = %err, "failed to delete stale artifact"),
            }
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.settings.root {
            Some(root) => root.join(path),
            None => path.to_path_buf(),
        }
    }
}

/// Task running one compile pass.
pub fn compile_task(compile: &Rc<RefCell<IncrementalCompile>>) -> Task {
    let compile = Rc::clone(compile);
    Task::new(move || {
        let mut compile = compile
            .try_borrow_mut()
            .map_err(|_| "compile is already running".to_string())?;
        match compile.run() {
            Ok(outcome) => outcome.into_action_result(),
            Err(err) => Err(err.to_string()),
        }
    })
    .described_as("compile")
}

/// Task deleting all compiled artifacts and the analysis.
pub fn clean_task(compile: &Rc<RefCell<IncrementalCompile>>) -> Task {
    let compile = Rc::clone(compile);
    Task::new(move || {
        let mut compile = compile
            .try_borrow_mut()
            .map_err(|_| "compile is already running".to_string())?;
        compile.clean().map(|_| ()).map_err(|err| err.to_string())
    })
    .described_as("clean")
}
