//! Thin wrapper around [std::process::Command] for the `git` and `ssh` invocations that `git2`
//! cannot perform.

use crate::errors::{GrrError, GrrResult};
use itertools::Itertools;
use std::{path::Path, process::Command};
use tracing::trace;

/// The captured result of a finished subprocess.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct CommandOutput {
    /// Captured standard output, lossily decoded.
    pub stdout: String,
    /// Captured standard error, lossily decoded.
    pub stderr: String,
    /// The exit code, or `-1` if the process was killed by a signal.
    pub code: i32,
}

impl CommandOutput {
    /// Whether the process exited with status zero.
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Runs `program` with `args`, returning its output regardless of exit status.
///
/// ## Takes
/// - `program` - The executable to run.
/// - `args` - The arguments to pass.
/// - `cwd` - The working directory, or the current one if [None].
///
/// ## Returns
/// - `Ok(CommandOutput)` - The process ran to completion.
/// - `Err(_)` - The process could not be spawned.
pub fn run_unchecked(program: &str, args: &[&str], cwd: Option<&Path>) -> GrrResult<CommandOutput> {
    trace!(program, args = %args.iter().join(" "), "running external command");

    let mut command = Command::new(program);
    command.args(args);
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }
    let output = command.output()?;

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        code: output.status.code().unwrap_or(-1),
    })
}

/// Runs `program` with `args`, failing with [GrrError::ExternalTool] on a nonzero exit.
pub fn run(program: &str, args: &[&str], cwd: Option<&Path>) -> GrrResult<CommandOutput> {
    let output = run_unchecked(program, args, cwd)?;
    if !output.success() {
        return Err(GrrError::ExternalTool {
            command: format!("{} {}", program, args.iter().join(" ")),
            code: output.code,
            stderr: output.stderr,
        });
    }
    Ok(output)
}
