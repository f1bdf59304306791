//! External tool detection.

use std::path::{Path, PathBuf};
use std::process::Command;

use trimforge_common::ProcessError;

/// Information about an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// First line of the version output, if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Check if a tool is available using the given version argument.
///
/// # Example
///
/// ```no_run
/// use trimforge_av::check_tool;
///
/// let info = check_tool("ffmpeg", "-version");
/// if info.available {
///     println!("ffmpeg version: {:?}", info.version);
/// }
/// ```
pub fn check_tool(name: &str, version_arg: &str) -> ToolInfo {
    match Command::new(name).arg(version_arg).output() {
        Ok(output) if output.status.success() => ToolInfo {
            name: name.to_string(),
            available: true,
            version: String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string()),
            path: which::which(name).ok(),
        },
        _ => ToolInfo {
            name: name.to_string(),
            available: false,
            version: None,
            path: None,
        },
    }
}

/// Check the tools trimforge depends on.
///
/// `transcoder` is the configured transcoder program (usually `ffmpeg`).
pub fn check_tools(transcoder: &Path) -> Vec<ToolInfo> {
    vec![check_tool(&transcoder.to_string_lossy(), "-version")]
}

/// Resolve a program to an executable path.
///
/// Paths containing a separator must exist as given; bare names are looked
/// up on `PATH`.
///
/// # Errors
///
/// Returns [`ProcessError::Environment`] if the tool cannot be found.
pub fn require_tool(program: &Path) -> Result<PathBuf, ProcessError> {
    if program.components().count() > 1 {
        return if program.is_file() {
            Ok(program.to_path_buf())
        } else {
            Err(ProcessError::environment(format!(
                "tool not found: {}",
                program.display()
            )))
        };
    }

    which::which(program).map_err(|_| {
        ProcessError::environment(format!("tool not found on PATH: {}", program.display()))
    })
}
