// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BuildError, Result};
use crate::watch::patterns::SourcePatterns;

/// Tasks that exist whenever `[compile]` is present.
pub const BUILTIN_TASKS: [&str; 2] = ["compile", "clean"];

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(
            raw.config,
            raw.sources,
            raw.compile,
            raw.task,
        ))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_work(cfg)?;
    validate_compile_section(cfg)?;
    validate_sources(cfg)?;
    validate_task_names(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_work(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() && cfg.compile.is_none() {
        return Err(BuildError::ConfigError(
            "config must contain a [compile] section or at least one [task.<name>] section"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_compile_section(cfg: &RawConfigFile) -> Result<()> {
    let Some(compile) = &cfg.compile else {
        return Ok(());
    };
    if compile.cmd.trim().is_empty() {
        return Err(BuildError::ConfigError(
            "[compile].cmd must not be empty".to_string(),
        ));
    }
    if compile.label.trim().is_empty() {
        return Err(BuildError::ConfigError(
            "[compile].label must not be empty".to_string(),
        ));
    }
    if cfg.sources.include.is_empty() {
        return Err(BuildError::ConfigError(
            "[sources].include must list at least one pattern when [compile] is present"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_sources(cfg: &RawConfigFile) -> Result<()> {
    SourcePatterns::new(&cfg.sources.include, &cfg.sources.exclude)
        .map_err(|e| BuildError::ConfigError(format!("[sources]: {e:#}")))?;
    Ok(())
}

fn validate_task_names(cfg: &RawConfigFile) -> Result<()> {
    for name in cfg.task.keys() {
        if name.trim().is_empty() {
            return Err(BuildError::ConfigError(
                "task names must not be empty".to_string(),
            ));
        }
        if cfg.compile.is_some() && BUILTIN_TASKS.contains(&name.as_str()) {
            return Err(BuildError::ConfigError(format!(
                "task '{}' clashes with the built-in task of the same name",
                name
            )));
        }
        if cfg.task[name].cmd.trim().is_empty() {
            return Err(BuildError::ConfigError(format!(
                "task '{}' has an empty `cmd`",
                name
            )));
        }
    }
    Ok(())
}

fn is_known_task(cfg: &RawConfigFile, name: &str) -> bool {
    cfg.task.contains_key(name) || (cfg.compile.is_some() && BUILTIN_TASKS.contains(&name))
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if dep == name {
                return Err(BuildError::ConfigError(format!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                )));
            }
            if !is_known_task(cfg, dep) {
                return Err(BuildError::ConfigError(format!(
                    "task '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task
    // For:
    //   [task.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(BuildError::DagCycle(format!(
            "cycle detected in task graph involving task '{}'",
            cycle.node_id()
        ))),
    }
}
