//! Edit request validation.

use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use trimforge_common::{Error, Result};

/// `[HH:]MM:SS[.frac]`, minutes and seconds below 60.
static CLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d+:)?[0-5]?\d:[0-5]?\d(?:\.\d+)?$").unwrap());

/// `N[.frac]` with an optional `s`, `ms` or `us` suffix.
static SECONDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)(s|ms|us)?$").unwrap());

/// A request to trim a previously uploaded video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRequest {
    /// The caller's identity (email).
    pub user: String,
    /// Upload-relative reference to the source artifact.
    pub source_ref: String,
    pub trim_start: String,
    pub trim_end: String,
}

impl EditRequest {
    pub fn new(
        user: impl Into<String>,
        source_ref: impl Into<String>,
        trim_start: impl Into<String>,
        trim_end: impl Into<String>,
    ) -> Self {
        Self {
            user: user.into(),
            source_ref: source_ref.into(),
            trim_start: trim_start.into(),
            trim_end: trim_end.into(),
        }
    }
}

/// Resolve `source_ref` to a path inside `upload_dir`.
///
/// The reference must be a non-empty relative path made only of normal
/// components; anything that could step outside the upload directory is
/// rejected.
pub fn resolve_source(upload_dir: &Path, source_ref: &str) -> Result<PathBuf> {
    if source_ref.trim().is_empty() {
        return Err(Error::validation("source reference is empty"));
    }

    let mut relative = PathBuf::new();
    for component in Path::new(source_ref).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(Error::validation(format!(
                    "source reference must stay inside the upload directory: {source_ref}"
                )))
            }
        }
    }

    if relative.as_os_str().is_empty() {
        return Err(Error::validation(format!(
            "source reference does not name a file: {source_ref}"
        )));
    }

    Ok(upload_dir.join(relative))
}

/// Parse a trim marker into seconds.
///
/// Accepts the transcoder's duration syntax: `[HH:]MM:SS[.frac]` or a
/// number of seconds with an optional `s`, `ms` or `us` suffix.
pub fn parse_marker(field: &str, value: &str) -> Result<f64> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::validation(format!("{field} is empty")));
    }

    if CLOCK.is_match(value) {
        let seconds = value
            .split(':')
            .try_fold(0.0_f64, |acc, part| part.parse::<f64>().map(|v| acc * 60.0 + v))
            .map_err(|_| Error::validation(format!("{field} is not a valid time: {value}")))?;
        return Ok(seconds);
    }

    if let Some(caps) = SECONDS.captures(value) {
        let amount: f64 = caps[1]
            .parse()
            .map_err(|_| Error::validation(format!("{field} is not a valid time: {value}")))?;
        let seconds = match caps.get(2).map(|unit| unit.as_str()) {
            Some("ms") => amount / 1_000.0,
            Some("us") => amount / 1_000_000.0,
            _ => amount,
        };
        return Ok(seconds);
    }

    Err(Error::validation(format!(
        "{field} is not a valid time: {value}"
    )))
}

/// Check both markers are well-formed and describe a non-empty range.
pub fn validate_trim_range(trim_start: &str, trim_end: &str) -> Result<()> {
    let start = parse_marker("trim_start", trim_start)?;
    let end = parse_marker("trim_end", trim_end)?;
    if end <= start {
        return Err(Error::validation(format!(
            "trim_end ({trim_end}) must be after trim_start ({trim_start})"
        )));
    }
    Ok(())
}
