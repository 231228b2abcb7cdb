// src/dag/task.rs

//! Composable units of deferred build work.

use std::fmt;
use std::ops::BitAnd;
use std::rc::Rc;

use crate::dag::graph::Dag;
use crate::dag::scheduler::{self, RunReport};
use crate::errors::Result;
use crate::types::ActionResult;

type Action = Rc<dyn Fn() -> ActionResult>;

struct TaskInner {
    description: Option<String>,
    dependencies: Vec<Task>,
    interactive: bool,
    action: Action,
}

/// A deferred, possibly-failing action plus the tasks it depends on.
///
/// Tasks are immutable and cheap to clone (clones share identity). Every
/// combinator returns a new task, so a dependency list can only point at
/// tasks that already exist.
#[derive(Clone)]
pub struct Task {
    inner: Rc<TaskInner>,
}

impl Task {
    /// A task running `action` with no dependencies.
    pub fn new<F>(action: F) -> Self
    where
        F: Fn() -> ActionResult + 'static,
    {
        Self::build(None, Vec::new(), false, Rc::new(action))
    }

    /// Like [`Task::new`], but flagged interactive: callers should not fan it
    /// out automatically (e.g. re-run it on file changes).
    pub fn interactive<F>(action: F) -> Self
    where
        F: Fn() -> ActionResult + 'static,
    {
        Self::build(None, Vec::new(), true, Rc::new(action))
    }

    /// A task whose own action always succeeds; useful as an aggregate.
    pub fn noop() -> Self {
        Self::new(|| Ok(()))
    }

    fn build(
        description: Option<String>,
        dependencies: Vec<Task>,
        interactive: bool,
        action: Action,
    ) -> Self {
        Self {
            inner: Rc::new(TaskInner {
                description,
                dependencies,
                interactive,
                action,
            }),
        }
    }

    /// New task with `tasks` appended to the dependency list.
    ///
    /// A task already present is not added twice.
    pub fn depends_on(&self, tasks: &[Task]) -> Task {
        let mut dependencies = self.inner.dependencies.clone();
        push_unique(&mut dependencies, tasks);
        Self::build(
            self.inner.description.clone(),
            dependencies,
            self.inner.interactive,
            Rc::clone(&self.inner.action),
        )
    }

    /// New task identical to this one except for its description.
    pub fn described_as(&self, description: impl Into<String>) -> Task {
        Self::build(
            Some(description.into()),
            self.inner.dependencies.clone(),
            self.inner.interactive,
            Rc::clone(&self.inner.action),
        )
    }

    /// Fallback composition.
    ///
    /// The resulting action runs this task's action; if it succeeded that
    /// success is reported, otherwise `other`'s action runs and its outcome
    /// is reported. Dependency lists are merged, this task's first.
    pub fn and(&self, other: &Task) -> Task {
        let mut dependencies = self.inner.dependencies.clone();
        push_unique(&mut dependencies, &other.inner.dependencies);

        let left = Rc::clone(&self.inner.action);
        let right = Rc::clone(&other.inner.action);
        let action: Action = Rc::new(move || match left() {
            Ok(()) => Ok(()),
            Err(_) => right(),
        });

        Self::build(
            None,
            dependencies,
            self.inner.interactive || other.inner.interactive,
            action,
        )
    }

    pub fn description(&self) -> Option<&str> {
        self.inner.description.as_deref()
    }

    pub fn dependencies(&self) -> &[Task] {
        &self.inner.dependencies
    }

    pub fn is_interactive(&self) -> bool {
        self.inner.interactive
    }

    /// Whether both handles refer to the same task.
    pub fn same_as(&self, other: &Task) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Invoke this task's own action, ignoring dependencies.
    pub fn invoke(&self) -> ActionResult {
        (self.inner.action)()
    }

    /// Run the dependency closure and then this task. See [`scheduler::run`].
    pub fn run(&self) -> Result<RunReport> {
        scheduler::run(self)
    }

    /// Run the dependency closure but not this task's own action.
    pub fn run_dependencies_only(&self) -> Result<RunReport> {
        scheduler::run_dependencies_only(self)
    }
}

fn push_unique(into: &mut Vec<Task>, tasks: &[Task]) {
    for task in tasks {
        if !into.iter().any(|t| t.same_as(task)) {
            into.push(task.clone());
        }
    }
}

impl Dag for Task {
    type Key = usize;

    fn key(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    fn predecessors(&self) -> Vec<Task> {
        self.inner.dependencies.clone()
    }

    fn label(&self) -> String {
        self.inner
            .description
            .clone()
            .unwrap_or_else(|| "<unnamed task>".to_string())
    }
}

impl BitAnd for Task {
    type Output = Task;

    fn bitand(self, rhs: Task) -> Task {
        self.and(&rhs)
    }
}

impl BitAnd<&Task> for &Task {
    type Output = Task;

    fn bitand(self, rhs: &Task) -> Task {
        self.and(rhs)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("description", &self.inner.description)
            .field("dependencies", &self.inner.dependencies.len())
            .field("interactive", &self.inner.interactive)
            .finish_non_exhaustive()
    }
}
