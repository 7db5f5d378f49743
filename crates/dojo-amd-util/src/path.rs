//! Lexical path helpers.
//!
//! None of these functions touch the filesystem. They mirror the semantics of
//! a JavaScript host's `path.resolve` / `path.relative` closely enough for
//! module-id bookkeeping: `.` segments are dropped, `..` segments are folded,
//! and trailing separators disappear.

use std::path::{Component, Path, PathBuf};

/// Replace every backslash with a forward slash.
#[must_use]
pub fn to_slash(path: &str) -> String {
    path.replace('\\', "/")
}

/// Render a path with forward slashes regardless of platform.
#[must_use]
pub fn display_slash(path: &Path) -> String {
    to_slash(&path.to_string_lossy())
}

/// Whether `specifier` looks like a filesystem-absolute path on any platform.
///
/// Accepts POSIX roots (`/x`), UNC-ish roots (`\x`) and drive-absolute
/// Windows paths (`C:\x`, `c:/x`), so module ids authored on one platform
/// are classified the same way on another.
#[must_use]
pub fn is_absolute(specifier: &str) -> bool {
    if specifier.starts_with('/') || specifier.starts_with('\\') {
        return true;
    }
    let bytes = specifier.as_bytes();
    bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'/' || bytes[2] == b'\\')
}

/// Lexically normalize a path.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `..` at the root stays at the root
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.iter().map(|c| c.as_os_str()).collect()
}

/// Resolve `specifier` against `base`, like `path.resolve(base, specifier)`.
#[must_use]
pub fn resolve(base: &Path, specifier: &str) -> PathBuf {
    let specifier_path = Path::new(specifier);
    if specifier_path.is_absolute() {
        normalize(specifier_path)
    } else {
        normalize(&base.join(specifier_path))
    }
}

/// Compute the relative path from `from` to `to`, like `path.relative`.
///
/// Returns an empty path when both point to the same location.
#[must_use]
pub fn relative(from: &Path, to: &Path) -> PathBuf {
    let from = normalize(from);
    let to = normalize(to);
    let from_parts: Vec<_> = from.components().collect();
    let to_parts: Vec<_> = to.components().collect();

    let common = from_parts
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common..from_parts.len() {
        result.push("..");
    }
    for part in &to_parts[common..] {
        result.push(part.as_os_str());
    }
    result
}
