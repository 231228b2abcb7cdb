use tracing::{debug, info, warn};

use crate::dag::graph::{topological_sort, Dag};
use crate::dag::task::Task;
use crate::errors::Result;
use crate::types::ActionResult;

/// The task that stopped a run, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub task: String,
    pub message: String,
}

/// Structured result of executing a task graph.
///
/// Action failures live here rather than in the `Err` side of the returned
/// `Result`, which is reserved for wiring errors such as cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Labels of the tasks whose actions were invoked, in invocation order.
    pub invoked: Vec<String>,
    /// First failure in topological order, if any. Nothing ran after it.
    pub failure: Option<TaskFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }

    /// Collapse into the uniform action outcome.
    pub fn outcome(&self) -> ActionResult {
        match &self.failure {
            Some(failure) => Err(failure.message.clone()),
            None => Ok(()),
        }
    }
}

/// Invoke every task in the dependency closure of `task`, each exactly once,
/// dependencies before dependents, stopping at the first failure.
pub fn run(task: &Task) -> Result<RunReport> {
    execute(task, true)
}

/// Like [`run`], but the root task's own action is skipped.
pub fn run_dependencies_only(task: &Task) -> Result<RunReport> {
    execute(task, false)
}

fn execute(root: &Task, include_root: bool) -> Result<RunReport> {
    let order = topological_sort(root)?;
    debug!(
        tasks = order.len(),
        include_root,
        root = %root.label(),
        "scheduler: executing dependency closure"
    );

    let mut report = RunReport::default();

    for task in order {
        if !include_root && task.same_as(root) {
            continue;
        }

        let label = task.label();
        debug!(task = %label, "invoking task action");
        report.invoked.push(label.clone());

        if let Err(message) = task.invoke() {
            warn!(task = %label, %message, "task failed; skipping remaining tasks");
            report.failure = Some(TaskFailure {
                task: label,
                message,
            });
            return Ok(report);
        }
    }

    info!(
        root = %root.label(),
        invoked = report.invoked.len(),
        "scheduler: run finished successfully"
    );
    Ok(report)
}
