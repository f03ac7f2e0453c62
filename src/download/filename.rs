//! Filename cleanup and collision-free path selection.

use std::path::{Path, PathBuf};

use url::Url;

use super::constants::MAX_NAME_ATTEMPTS;
use crate::platform::FileSystem;

/// Replaces characters that are invalid on common filesystems with `_`.
///
/// Each of `\ / : * ? " < > | [ ]` is replaced individually.
#[must_use]
pub fn cleanup_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '[' | ']' => '_',
            c => c,
        })
        .collect()
}

/// Picks a path for `name` inside `dir` that does not exist yet.
///
/// Collisions get `" (N)"` inserted before the extension for N in 1..=29.
/// When every candidate exists the last one is returned anyway.
#[must_use]
pub fn build_file(fs: &dyn FileSystem, dir: &Path, name: &str) -> PathBuf {
    let (stem, ext) = split_extension(name);
    let mut path = dir.join(name);
    let mut attempt = 1;
    while fs.exists(&path) && attempt < MAX_NAME_ATTEMPTS {
        let candidate = match ext {
            Some(ext) => format!("{stem} ({attempt}).{ext}"),
            None => format!("{stem} ({attempt})"),
        };
        path = dir.join(candidate);
        attempt += 1;
    }
    path
}

/// Derives a filename from the last URL path segment.
///
/// Percent-encoding is decoded and the result passed through
/// [`cleanup_filename`]. Returns `None` when the path has no usable segment.
#[must_use]
pub fn filename_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let mut segments = parsed.path_segments()?;
    let last = segments.next_back().filter(|s| !s.is_empty())?;
    let decoded = urlencoding::decode(last).map_or_else(|_| last.to_string(), |s| s.into_owned());
    let cleaned = cleanup_filename(&decoded);
    (!cleaned.trim().is_empty()).then_some(cleaned)
}

/// Splits `name` into stem and extension at the last dot.
///
/// Leading dots (hidden files) are not treated as extension separators.
pub(crate) fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(pos) if pos > 0 && pos + 1 < name.len() => (&name[..pos], Some(&name[pos + 1..])),
        _ => (name, None),
    }
}
