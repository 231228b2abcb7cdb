// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::incremental::store::DEFAULT_ANALYSIS_PATH;
use crate::types::{AnalysisStorageMode, CorruptAnalysisBehaviour};

/// Build definition exactly as read from TOML, before validation.
///
/// ```toml
/// [config]
/// analysis_path = ".steadybuild/analysis.json"
///
/// [sources]
/// include = ["src/**/*.java"]
///
/// [compile]
/// cmd = "javac-adapter"
/// search_path = ["lib"]
///
/// [task.package]
/// cmd = "jar cf app.jar -C target/classes ."
/// after = ["compile"]
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    #[serde(default)]
    pub sources: SourcesSection,

    /// Present only if the project compiles sources incrementally.
    #[serde(default)]
    pub compile: Option<CompileSection>,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// A validated build definition.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (or
/// [`ConfigFile::new_unchecked`] in tests that build one by hand).
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    sources: SourcesSection,
    compile: Option<CompileSection>,
    task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    pub fn new_unchecked(
        config: ConfigSection,
        sources: SourcesSection,
        compile: Option<CompileSection>,
        task: BTreeMap<String, TaskConfig>,
    ) -> Self {
        Self {
            config,
            sources,
            compile,
            task,
        }
    }

    pub fn config(&self) -> &ConfigSection {
        &self.config
    }

    pub fn sources(&self) -> &SourcesSection {
        &self.sources
    }

    pub fn compile(&self) -> Option<&CompileSection> {
        self.compile.as_ref()
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }
}

/// `[config]` section: where and how the analysis is kept.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Relative paths are resolved against the config file's directory.
    #[serde(default = "default_analysis_path")]
    pub analysis_path: PathBuf,

    #[serde(default)]
    pub analysis_storage: AnalysisStorageMode,

    #[serde(default)]
    pub corrupt_analysis: CorruptAnalysisBehaviour,
}

fn default_analysis_path() -> PathBuf {
    PathBuf::from(DEFAULT_ANALYSIS_PATH)
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            analysis_path: default_analysis_path(),
            analysis_storage: AnalysisStorageMode::default(),
            corrupt_analysis: CorruptAnalysisBehaviour::default(),
        }
    }
}

/// `[sources]` section: which files are source units.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct SourcesSection {
    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,
}

/// `[compile]` section: the compiler adapter and its inputs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompileSection {
    /// Shell command of the compiler adapter.
    pub cmd: String,

    #[serde(default = "default_label")]
    pub label: String,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Externals are only available if they resolve against these entries.
    #[serde(default)]
    pub search_path: Vec<PathBuf>,

    #[serde(default)]
    pub options: Vec<String>,
}

fn default_label() -> String {
    "main".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("target/classes")
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// The command to execute.
    pub cmd: String,

    /// This task depends on every task listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Shown in logs and `--dry-run`; defaults to the task name.
    #[serde(default)]
    pub description: Option<String>,

    /// Interactive tasks are never re-run automatically by `--watch`.
    #[serde(default)]
    pub interactive: bool,
}
