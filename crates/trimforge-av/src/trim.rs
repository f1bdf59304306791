//! Trimming a source video with the external transcoder.
//!
//! [`ProcessRunner::run`] cuts `[trim_start, trim_end]` out of the source in
//! stream-copy mode. Whatever happens during the attempt, the source
//! artifact is removed afterwards: uploads are never retained past one
//! processing attempt.

use std::path::{Path, PathBuf};
use std::time::Duration;

use trimforge_common::ProcessError;

use crate::command::{ToolCommand, DEFAULT_TIMEOUT};

/// Inputs for one trim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimJob {
    /// Source artifact. Deleted after the attempt.
    pub source: PathBuf,
    /// Seek-to position, in transcoder duration syntax.
    pub trim_start: String,
    /// Seek-until position, in transcoder duration syntax.
    pub trim_end: String,
    /// Working directory for the transcoder process.
    pub working_dir: PathBuf,
    /// Where the trimmed artifact is written.
    pub output: PathBuf,
}

/// Deletes a source artifact when dropped.
///
/// Holding one of these ties the artifact's lifetime to a scope: every exit
/// from that scope (early return, `?`, panic unwinding, a cancelled future)
/// removes the file.
#[derive(Debug)]
pub struct SourceGuard {
    path: Option<PathBuf>,
}

impl SourceGuard {
    /// Guard the artifact at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

impl Drop for SourceGuard {
    fn drop(&mut self) {
        let Some(path) = self.path.take() else {
            return;
        };

        match std::fs::remove_file(&path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed source artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove source artifact"
            ),
        }
    }
}

/// Runs the external transcoder for a [`TrimJob`].
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    leading_args: Vec<String>,
    timeout: Duration,
}

impl ProcessRunner {
    /// Create a runner for the given transcoder program.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Arguments placed before the generated trim arguments.
    pub fn with_leading_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Bound each transcoder invocation by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the transcoder invocation for `job`.
    ///
    /// Arguments: `-hide_banner -loglevel error -nostdin -y -i <source>
    /// -ss <start> -to <end> -c copy <output>`.
    ///
    /// Relative source and output paths are resolved against this process's
    /// current directory, not `working_dir`.
    pub fn build_command(&self, job: &TrimJob) -> ToolCommand {
        let mut cmd = ToolCommand::new(self.program.clone());
        cmd.args(self.leading_args.iter().cloned())
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-y"])
            .arg("-i")
            .arg(path_arg(&absolute(&job.source)))
            .arg("-ss")
            .arg(job.trim_start.as_str())
            .arg("-to")
            .arg(job.trim_end.as_str())
            .args(["-c", "copy"])
            .arg(path_arg(&absolute(&job.output)))
            .current_dir(&job.working_dir)
            .timeout(self.timeout);
        cmd
    }

    /// Trim `job.source` into `job.output`, then delete `job.source`.
    ///
    /// # Errors
    ///
    /// - [`ProcessError::SourceMissing`] if the source does not exist.
    /// - [`ProcessError::Environment`] if the working directory is unusable
    ///   or the transcoder cannot be spawned.
    /// - [`ProcessError::ToolFailed`] if the transcoder exits unsuccessfully
    ///   or times out.
    ///
    /// No failure is retried here.
    pub async fn run(&self, job: &TrimJob) -> Result<(), ProcessError> {
        let _cleanup = SourceGuard::new(&job.source);

        match tokio::fs::metadata(&job.source).await {
            Ok(meta) if meta.is_file() => {}
            _ => return Err(ProcessError::SourceMissing(job.source.clone())),
        }

        match tokio::fs::metadata(&job.working_dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(ProcessError::environment(format!(
                    "working directory is not a directory: {}",
                    job.working_dir.display()
                )))
            }
            Err(e) => {
                return Err(ProcessError::environment(format!(
                    "working directory {} is inaccessible: {e}",
                    job.working_dir.display()
                )))
            }
        }

        let cmd = self.build_command(job);
        tracing::debug!(
            program = %self.program.display(),
            args = ?cmd.get_args(),
            "Running transcoder"
        );

        let output = cmd.execute().await?;
        if !output.stderr.trim().is_empty() {
            tracing::debug!(stderr = %output.stderr.trim(), "Transcoder diagnostics");
        }

        Ok(())
    }
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Render a path as a single argument that cannot be mistaken for an option.
fn path_arg(path: &Path) -> String {
    let rendered = path.to_string_lossy();
    if rendered.starts_with('-') {
        format!("./{rendered}")
    } else {
        rendered.into_owned()
    }
}
