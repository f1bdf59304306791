//! Builder for executing external tool commands with timeout support.
//!
//! Arguments are always passed to the child as a discrete vector. Nothing is
//! ever handed to a shell, so caller-supplied strings cannot inject extra
//! commands or options beyond the argument slot they occupy.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;
use trimforge_common::ProcessError;

/// Default command timeout: 5 minutes.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Output captured from a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Process exit status.
    pub status: ExitStatus,
    /// Captured standard output (lossy UTF-8).
    pub stdout: String,
    /// Captured standard error (lossy UTF-8).
    pub stderr: String,
}

/// A builder for constructing and executing external tool invocations.
///
/// # Example
///
/// ```no_run
/// use trimforge_av::ToolCommand;
/// use std::path::PathBuf;
///
/// # async fn example() -> Result<(), trimforge_common::ProcessError> {
/// let output = ToolCommand::new(PathBuf::from("ffmpeg"))
///     .arg("-hide_banner")
///     .arg("-version")
///     .execute()
///     .await?;
/// println!("{}", output.stdout);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    timeout: Duration,
}

impl ToolCommand {
    /// Create a new command for the given program path.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            current_dir: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Run the process with this working directory.
    pub fn current_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Set the maximum execution time.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = d;
        self
    }

    /// The argument vector as it will be passed to the process.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Execute the command, capturing stdout and stderr.
    ///
    /// The child is killed if it outlives the timeout or if the returned
    /// future is dropped before completion.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::Environment`] if spawning or waiting on the process
    ///   fails.
    /// - [`ProcessError::ToolFailed`] with the exit code if the process exits
    ///   unsuccessfully (message includes stderr).
    /// - [`ProcessError::ToolFailed`] without a code if the timeout expires.
    pub async fn execute(&self) -> Result<ToolOutput, ProcessError> {
        let program_name = self
            .program
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.program.to_string_lossy().to_string());

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| {
            ProcessError::environment(format!("failed to spawn {program_name}: {e}"))
        })?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let tool_output = ToolOutput {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if !output.status.success() {
                    return Err(ProcessError::tool_failed(
                        output.status.code(),
                        format!(
                            "{program_name} exited with {}: {}",
                            output.status,
                            tool_output.stderr.trim()
                        ),
                    ));
                }

                Ok(tool_output)
            }
            Ok(Err(e)) => Err(ProcessError::environment(format!(
                "I/O error waiting for {program_name}: {e}"
            ))),
            // Dropping the wait future drops the child, and kill_on_drop
            // terminates it.
            Err(_elapsed) => Err(ProcessError::tool_failed(
                None,
                format!("{program_name} timed out after {:?}", self.timeout),
            )),
        }
    }
}
