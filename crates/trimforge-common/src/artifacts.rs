//! Collision-free artifact naming.
//!
//! Output files are named from a random v4 UUID rather than a clock reading,
//! so two submissions landing in the same instant still get distinct names.

use uuid::Uuid;

/// Prefix used for trimmed output artifacts.
pub const OUTPUT_PREFIX: &str = "trim_";

/// Extension used for trimmed output artifacts.
pub const OUTPUT_EXTENSION: &str = ".mp4";

/// Generate a unique artifact file name.
///
/// The name is `prefix`, followed by 32 lowercase hex digits of a random
/// UUID, followed by `extension`. An extension given without a leading dot
/// gets one; an empty extension is left off.
///
/// # Panics
///
/// Panics if the operating system's randomness source is unavailable.
///
/// # Examples
///
/// ```
/// use trimforge_common::artifacts::new_artifact_name;
///
/// let name = new_artifact_name("clip_", "mp4");
/// assert!(name.starts_with("clip_"));
/// assert!(name.ends_with(".mp4"));
/// assert_eq!(name.len(), "clip_".len() + 32 + ".mp4".len());
/// ```
pub fn new_artifact_name(prefix: &str, extension: &str) -> String {
    let token = Uuid::new_v4().simple();
    match extension {
        "" => format!("{prefix}{token}"),
        ext if ext.starts_with('.') => format!("{prefix}{token}{ext}"),
        ext => format!("{prefix}{token}.{ext}"),
    }
}

/// Generate a name for a trimmed output artifact.
pub fn new_output_name() -> String {
    new_artifact_name(OUTPUT_PREFIX, OUTPUT_EXTENSION)
}

/// Check whether `name` has the shape produced by [`new_output_name`].
pub fn is_output_name(name: &str) -> bool {
    name.strip_prefix(OUTPUT_PREFIX)
        .and_then(|rest| rest.strip_suffix(OUTPUT_EXTENSION))
        .is_some_and(|token| {
            token.len() == 32
                && token
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_extension_handling() {
        assert!(new_artifact_name("a_", ".mkv").ends_with(".mkv"));
        assert!(new_artifact_name("a_", "mkv").ends_with(".mkv"));
        assert_eq!(new_artifact_name("a_", "").len(), 2 + 32);
    }

    #[test]
    fn test_output_name_format() {
        let name = new_output_name();
        assert!(is_output_name(&name), "unexpected name: {name}");
        assert!(!is_output_name("trim_20240101_120000.mp4"));
        assert!(!is_output_name("clip.mp4"));
    }

    #[test]
    fn test_no_collisions_across_many_names() {
        let names: HashSet<String> = (0..20_000).map(|_| new_output_name()).collect();
        assert_eq!(names.len(), 20_000);
    }

    #[test]
    fn test_no_collisions_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| (0..2_500).map(|_| new_output_name()).collect::<Vec<_>>()))
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for name in handle.join().unwrap() {
                assert!(seen.insert(name), "duplicate artifact name generated");
            }
        }
        assert_eq!(seen.len(), 20_000);
    }
}
