// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod incremental;
pub mod logging;
pub mod types;
pub mod watch;

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::{CompileSection, ConfigFile};
use crate::dag::{topological_sort, Task, TaskName, TaskRegistry};
use crate::fs::{FileSystem, RealFileSystem};
use crate::incremental::{
    clean_task, compile_task, AnalysisStore, CommandCompiler, CompileSettings, FileAnalysisStore,
    FsOracle, GlobSourceSet, IncrementalCompile, MemoryAnalysisStore,
};
use crate::types::AnalysisStorageMode;
use crate::watch::{relative_str, spawn_watcher, ChangeFilter, SourcePatterns, DEFAULT_DEBOUNCE};

/// Everything built from a validated build definition.
#[derive(Debug)]
pub struct Project {
    pub registry: TaskRegistry,
    /// Shared by the `compile` and `clean` tasks; `None` without `[compile]`.
    pub compile: Option<Rc<RefCell<IncrementalCompile>>>,
    /// Source selection, minus generated directories.
    pub patterns: SourcePatterns,
}

impl Project {
    pub fn build(cfg: &ConfigFile, root: &Path, fs: Arc<dyn FileSystem>) -> Result<Self> {
        let patterns = source_patterns(cfg, root)?;

        let mut builtins: Vec<(TaskName, Task)> = Vec::new();
        let compile = match cfg.compile() {
            Some(section) => {
                let compile = incremental_compile(cfg, section, root, fs, patterns.clone());
                let compile = Rc::new(RefCell::new(compile));
                builtins.push(("compile".to_string(), compile_task(&compile)));
                builtins.push(("clean".to_string(), clean_task(&compile)));
                Some(compile)
            }
            None => None,
        };

        let registry = TaskRegistry::from_config(cfg, root, builtins)?;
        debug!(tasks = registry.len(), "task registry built");

        Ok(Self {
            registry,
            compile,
            patterns,
        })
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - task registry and the incremental compile
/// - running the requested tasks
/// - (optional) test listing and the file watcher
pub fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let root = config_root_dir(&config_path);
    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let project = Project::build(&cfg, &root, fs)?;

    let requested = requested_tasks(&args, &cfg, &project.registry)?;
    info!(tasks = ?requested.iter().map(|(n, _)| n).collect::<Vec<_>>(), "running requested tasks");

    let outcome = run_requested(&requested, args.deps_only);

    if args.list_tests {
        print_tests(&project);
    }

    if args.watch {
        return watch_and_rerun(&project, &root, &requested, args.deps_only);
    }

    outcome
}

/// Directory the build definition lives in; everything relative is resolved
/// against it.
///
/// A bare file name like `Steadybuild.toml` (parent = "") falls back to the
/// current working directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// The `[sources]` patterns with the output and analysis directories
/// excluded, so generated files are never sources.
pub fn source_patterns(cfg: &ConfigFile, root: &Path) -> Result<SourcePatterns> {
    let patterns = SourcePatterns::new(&cfg.sources().include, &cfg.sources().exclude)?;

    let mut generated: Vec<PathBuf> = Vec::new();
    if let Some(section) = cfg.compile() {
        generated.push(root.join(&section.output_dir));
    }
    if let Some(dir) = root.join(&cfg.config().analysis_path).parent() {
        generated.push(dir.to_path_buf());
    }

    let extra: Vec<String> = generated
        .iter()
        .filter_map(|dir| relative_str(root, dir))
        .filter(|rel| !rel.is_empty())
        .map(|rel| format!("{}/**", rel.trim_end_matches('/')))
        .collect();

    patterns.excluding(&extra)
}

fn incremental_compile(
    cfg: &ConfigFile,
    section: &CompileSection,
    root: &Path,
    fs: Arc<dyn FileSystem>,
    patterns: SourcePatterns,
) -> IncrementalCompile {
    let settings = CompileSettings {
        label: section.label.clone(),
        search_path: section.search_path.clone(),
        output_dir: section.output_dir.clone(),
        options: section.options.clone(),
        corrupt_analysis: cfg.config().corrupt_analysis,
        root: Some(root.to_path_buf()),
    };

    let store: Box<dyn AnalysisStore> = match cfg.config().analysis_storage {
        AnalysisStorageMode::File => Box::new(FileAnalysisStore::new(
            root.join(&cfg.config().analysis_path),
            Arc::clone(&fs),
        )),
        AnalysisStorageMode::Memory => Box::new(MemoryAnalysisStore::new()),
    };

    let sources = GlobSourceSet::new(Arc::clone(&fs), root, patterns);
    let oracle = FsOracle::new(Arc::clone(&fs), section.search_path.clone()).with_root(root);
    let compiler = CommandCompiler::new(section.cmd.clone(), root);

    IncrementalCompile::new(
        settings,
        fs,
        Box::new(sources),
        store,
        Box::new(oracle),
        Box::new(compiler),
    )
}

/// Resolve the task names from the command line, defaulting to `compile`.
///
/// Every name is looked up before anything runs.
pub fn requested_tasks(
    args: &CliArgs,
    cfg: &ConfigFile,
    registry: &TaskRegistry,
) -> Result<Vec<(TaskName, Task)>> {
    let names: Vec<TaskName> = if args.tasks.is_empty() {
        if cfg.compile().is_none() {
            bail!("no task given and no [compile] section to default to");
        }
        vec!["compile".to_string()]
    } else {
        args.tasks.clone()
    };

    names
        .into_iter()
        .map(|name| -> Result<(TaskName, Task)> {
            let task = registry.get(&name)?;
            Ok((name, task))
        })
        .collect()
}

/// Run each requested task in order, stopping at the first failure.
pub fn run_requested(tasks: &[(TaskName, Task)], deps_only: bool) -> Result<()> {
    for (name, task) in tasks {
        let report = if deps_only {
            task.run_dependencies_only()?
        } else {
            task.run()?
        };

        if let Some(failure) = report.failure {
            error!(task = %name, failed = %failure.task, "build failed");
            return Err(anyhow!("task '{}' failed: {}", failure.task, failure.message));
        }
        info!(task = %name, invoked = report.invoked.len(), "task finished");
    }
    Ok(())
}

/// Whether `task` or anything it depends on is interactive.
fn involves_interactive(task: &Task) -> Result<bool> {
    Ok(topological_sort(task)?.iter().any(Task::is_interactive))
}

fn watch_and_rerun(
    project: &Project,
    root: &Path,
    requested: &[(TaskName, Task)],
    deps_only: bool,
) -> Result<()> {
    let mut rerun: Vec<(TaskName, Task)> = Vec::new();
    for (name, task) in requested {
        if involves_interactive(task)? {
            warn!(task = %name, "interactive task; it will not be re-run on changes");
        } else {
            rerun.push((name.clone(), task.clone()));
        }
    }
    if rerun.is_empty() {
        bail!("--watch: every requested task is interactive; nothing to re-run");
    }

    let watcher = spawn_watcher(ChangeFilter::new(root, project.patterns.clone()))?;
    watcher.run(DEFAULT_DEBOUNCE, |changed| {
        debug!(?changed, "re-running tasks");
        if let Err(err) = run_requested(&rerun, deps_only) {
            // Keep watching; the next change may fix it.
            error!("{err:#}");
        }
    });
    Ok(())
}

/// Print the tests the compiler reported, one per line.
fn print_tests(project: &Project) {
    let Some(compile) = &project.compile else {
        warn!("--list-tests: no [compile] section, no tests to list");
        return;
    };
    let compile = compile.borrow();
    for (source, test) in compile.analysis().tests() {
        let kind = if test.is_module { " (module)" } else { "" };
        println!(
            "{}: {} extends {}{}",
            source.display(),
            test.class_name,
            test.superclass_name,
            kind
        );
    }
}

/// Simple dry-run output: print compile settings and tasks.
fn print_dry_run(cfg: &ConfigFile) {
    println!("steadybuild dry-run");
    println!("  config.analysis_path = {}", cfg.config().analysis_path.display());
    println!("  config.analysis_storage = {:?}", cfg.config().analysis_storage);
    println!("  config.corrupt_analysis = {:?}", cfg.config().corrupt_analysis);
    println!();

    if let Some(compile) = cfg.compile() {
        println!("compile ({}):", compile.label);
        println!("      cmd: {}", compile.cmd);
        println!("      sources: {:?}", cfg.sources().include);
        if !cfg.sources().exclude.is_empty() {
            println!("      exclude: {:?}", cfg.sources().exclude);
        }
        println!("      output_dir: {}", compile.output_dir.display());
        if !compile.search_path.is_empty() {
            println!("      search_path: {:?}", compile.search_path);
        }
        if !compile.options.is_empty() {
            println!("      options: {:?}", compile.options);
        }
        println!("  built-in tasks: compile, clean");
        println!();
    }

    println!("tasks ({}):", cfg.tasks().len());
    for (name, task) in cfg.tasks().iter() {
        println!("  - {name}");
        if let Some(ref description) = task.description {
            println!("      description: {description}");
        }
        println!("      cmd: {}", task.cmd);
        if !task.after.is_empty() {
            println!("      after: {:?}", task.after);
        }
        if task.interactive {
            println!("      interactive: true");
        }
    }

    debug!("dry-run complete (no execution)");
}
