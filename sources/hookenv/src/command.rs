//! Checked wrappers around `std::process::Command`.
//!
//! Every hook tool, package manager and init system call goes through here so failures carry
//! the command line and stderr.

use crate::error::{self, Result};
use log::trace;
use snafu::{ensure, ResultExt};
use std::ffi::OsStr;
use std::io::Write;
use std::process::{Command, Stdio};

/// Runs `bin_path` with `args`, returning stdout if the command exits zero.
pub fn run<I, S>(bin_path: &str, args: I) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(bin_path);
    command.args(args);
    output(command, None)
}

/// Like `run`, with extra environment variables set for the child.
pub fn run_with_env<I, S>(bin_path: &str, args: I, env: &[(&str, &str)]) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(bin_path);
    command.args(args);
    for (key, value) in env {
        command.env(key, value);
    }
    output(command, None)
}

/// Like `run`, feeding `input` to the child's stdin.  Used for data that shouldn't appear on a
/// command line, like relation settings carrying credentials.
pub fn run_with_stdin<I, S>(bin_path: &str, args: I, input: &[u8]) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(bin_path);
    command.args(args);
    output(command, Some(input))
}

fn output(mut command: Command, input: Option<&[u8]>) -> Result<String> {
    let display = display_command(&command);
    trace!("Running '{}'", display);

    let output = match input {
        None => command
            .output()
            .context(error::ExecutionFailureSnafu { command: &display })?,
        Some(input) => {
            let mut child = command
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .context(error::ExecutionFailureSnafu { command: &display })?;
            if let Some(mut stdin) = child.stdin.take() {
                stdin
                    .write_all(input)
                    .context(error::CommandStdinSnafu { command: &display })?;
            }
            child
                .wait_with_output()
                .context(error::ExecutionFailureSnafu { command: &display })?
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    trace!("stdout: {}", stdout);
    trace!("stderr: {}", stderr);

    ensure!(
        output.status.success(),
        error::CommandFailureSnafu {
            command: display,
            stderr,
        }
    );
    Ok(stdout)
}

fn display_command(command: &Command) -> String {
    let mut parts = vec![command.get_program().to_string_lossy().to_string()];
    parts.extend(command.get_args().map(|a| a.to_string_lossy().to_string()));
    parts.join(" ")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::Error;

    #[test]
    fn stdout_returned() {
        assert_eq!(run("echo", ["hello"]).unwrap(), "hello\n");
    }

    #[test]
    fn stdin_forwarded() {
        assert_eq!(run_with_stdin("cat", Vec::<&str>::new(), b"abc").unwrap(), "abc");
    }

    #[test]
    fn env_forwarded() {
        let out = run_with_env(
            "sh",
            ["-c", "printf %s \"$HOOKENV_TEST\""],
            &[("HOOKENV_TEST", "x")],
        )
        .unwrap();
        assert_eq!(out, "x");
    }

    #[test]
    fn nonzero_exit_is_failure() {
        match run("sh", ["-c", "echo oops >&2; exit 3"]) {
            Err(Error::CommandFailure { command, stderr }) => {
                assert_eq!(command, "sh -c echo oops >&2; exit 3");
                assert_eq!(stderr, "oops\n");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn missing_binary_is_execution_failure() {
        assert!(matches!(
            run("/nonexistent/hookenv-test-binary", ["x"]),
            Err(Error::ExecutionFailure { .. })
        ));
    }
}
