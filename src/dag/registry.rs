// src/dag/registry.rs

//! Named tasks of a build definition.
//!
//! The registry is filled explicitly while the build definition is
//! constructed; nothing is discovered by scanning. Dependencies are resolved
//! by name at registration time, so a task can only depend on tasks that were
//! registered before it.

use std::collections::BTreeMap;
use std::path::Path;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::config::model::ConfigFile;
use crate::dag::task::Task;
use crate::dag::TaskName;
use crate::errors::{BuildError, Result};
use crate::exec::command_task;

#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<TaskName, Task>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
        }
    }

    /// Register `task` under `name`. Names are unique.
    pub fn register(&mut self, name: impl Into<TaskName>, task: Task) -> Result<()> {
        let name = name.into();
        if self.tasks.contains_key(&name) {
            return Err(BuildError::ConfigError(format!(
                "task '{}' is defined more than once",
                name
            )));
        }
        debug!(task = %name, deps = task.dependencies().len(), "registered task");
        self.tasks.insert(name, task);
        Ok(())
    }

    /// Register `task` with the already-registered tasks named in `after`
    /// appended to its dependencies, and return the registered task.
    ///
    /// Fails with [`BuildError::MissingDependency`] before registering
    /// anything if a name is not known yet.
    pub fn register_after(
        &mut self,
        name: impl Into<TaskName>,
        task: Task,
        after: &[TaskName],
    ) -> Result<Task> {
        let name = name.into();
        let deps = self.lookup_dependencies(&name, after)?;
        let task = task.depends_on(&deps);
        self.register(name, task.clone())?;
        Ok(task)
    }

    fn lookup_dependencies(&self, dependent: &str, names: &[TaskName]) -> Result<Vec<Task>> {
        names
            .iter()
            .map(|dep| {
                self.tasks.get(dep).cloned().ok_or_else(|| {
                    BuildError::MissingDependency(format!(
                        "task '{}' depends on '{}', which is not defined yet \
                         (check the order in which tasks are defined)",
                        dependent, dep
                    ))
                })
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Result<Task> {
        self.tasks
            .get(name)
            .cloned()
            .ok_or_else(|| BuildError::TaskNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Build the registry for a validated config.
    ///
    /// `builtins` (e.g. `compile`, `clean`) are registered first; command
    /// tasks from `[task.<name>]` follow in dependency order and run their
    /// command from `root`.
    pub fn from_config(
        cfg: &ConfigFile,
        root: &Path,
        builtins: Vec<(TaskName, Task)>,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for (name, task) in builtins {
            registry.register(name, task)?;
        }

        for name in definition_order(cfg)? {
            if registry.contains(&name) {
                continue;
            }
            let Some(tc) = cfg.tasks().get(&name) else {
                continue;
            };
            let description = tc.description.clone().unwrap_or_else(|| name.clone());
            let task = command_task(&name, &tc.cmd, root, tc.interactive).described_as(description);
            registry.register_after(name, task, &tc.after)?;
        }

        Ok(registry)
    }
}

/// Task names in an order where every `after` entry precedes its dependent.
fn definition_order(cfg: &ConfigFile) -> Result<Vec<TaskName>> {
    // Edge direction: dep -> task
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for (name, task) in cfg.tasks().iter() {
        graph.add_node(name.as_str());
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(|s| s.to_string()).collect()),
        Err(cycle) => Err(BuildError::DagCycle(format!(
            "cycle detected in task graph involving task '{}'",
            cycle.node_id()
        ))),
    }
}
