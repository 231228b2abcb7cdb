// src/exec/command.rs

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info, warn};

use crate::dag::Task;
use crate::types::ActionResult;

/// Build a shell command appropriate for the platform.
pub fn shell_command(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

/// Run `cmd` in `cwd` with inherited stdio and wait for it to exit.
///
/// A non-zero exit (or failure to spawn) becomes a failed [`ActionResult`].
pub fn run_shell(task: &str, cmd: &str, cwd: &Path) -> ActionResult {
    info!(task = %task, cmd = %cmd, "starting task process");

    let status = shell_command(cmd)
        .current_dir(cwd)
        .status()
        .map_err(|e| format!("task '{task}': failed to spawn `{cmd}`: {e}"))?;

    let code = status.code().unwrap_or(-1);
    debug!(task = %task, exit_code = code, success = status.success(), "task process exited");

    if status.success() {
        Ok(())
    } else {
        warn!(task = %task, exit_code = code, "task process failed");
        Err(format!("task '{task}': `{cmd}` exited with code {code}"))
    }
}

/// A task that runs a shell command from `cwd`.
pub fn command_task(name: &str, cmd: &str, cwd: &Path, interactive: bool) -> Task {
    let name = name.to_string();
    let cmd = cmd.to_string();
    let cwd: PathBuf = cwd.to_path_buf();
    let action = move || run_shell(&name, &cmd, &cwd);

    if interactive {
        Task::interactive(action)
    } else {
        Task::new(action)
    }
}
