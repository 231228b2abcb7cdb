// src/exec/mod.rs

//! Process execution layer.
//!
//! Command tasks and the command compiler adapter both run shell commands
//! through here. Execution is blocking: an action does not return until its
//! process has exited, so a dependency's side effects are complete before
//! any dependent starts.

pub mod command;

pub use command::{command_task, run_shell, shell_command};
