// src/dag/mod.rs

//! Task graph representation and execution.
//!
//! - [`graph`] is the generic DAG utility: topological ordering and cycle
//!   detection over anything that can list its predecessors.
//! - [`task`] holds the immutable, composable [`Task`] node.
//! - [`scheduler`] runs a task's dependency closure in order.
//! - [`registry`] maps task names of a build definition to tasks.

pub mod graph;
pub mod registry;
pub mod scheduler;
pub mod task;

/// Canonical task name type used throughout the build definition.
pub type TaskName = String;

pub use graph::{topological_sort, Dag};
pub use registry::TaskRegistry;
pub use scheduler::{run, run_dependencies_only, RunReport, TaskFailure};
pub use task::Task;
