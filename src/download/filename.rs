//! Output naming for downloaded artifacts.

use std::path::{Component, Path, PathBuf};

const FALLBACK_STEM: &str = "artifact";
const ARTIFACT_EXTENSION: &str = "ipa";

/// Replaces characters that are invalid on common filesystems
/// (`/ \ : * ? " < > |` and control characters) with `_`.
///
/// Names that would still resolve to `.`/`..` have their dots replaced too.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }
    if is_plain_segment(&sanitized) {
        sanitized
    } else {
        sanitized.replace('.', "_")
    }
}

fn is_plain_segment(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Default artifact file name: `<display name>_<version>.ipa`.
#[must_use]
pub fn artifact_file_name(display_name: &str, version: &str) -> String {
    let stem = match (display_name.trim(), version.trim()) {
        ("", "") => FALLBACK_STEM.to_string(),
        (name, "") => name.to_string(),
        ("", version) => format!("{FALLBACK_STEM}_{version}"),
        (name, version) => format!("{name}_{version}"),
    };
    sanitize_filename(&format!("{stem}.{ARTIFACT_EXTENSION}"))
}

/// Resolves where an artifact is written.
///
/// No explicit path writes `default_name` in the working directory; an
/// existing directory receives `default_name`; anything else is used as-is.
#[must_use]
pub fn resolve_output_path(explicit: Option<&Path>, default_name: &str) -> PathBuf {
    match explicit {
        None => PathBuf::from(default_name),
        Some(path) if path.is_dir() => path.join(default_name),
        Some(path) => path.to_path_buf(),
    }
}
