//! Dojo loader module-id rules.
//!
//! [`DojoRequire`] is the seam the orchestrator uses to turn a (possibly
//! relative) module id into an absolute one. [`LoaderConfig`] is the default
//! implementation, following the Dojo loader's `toAbsMid`:
//!
//! 1. **Passthrough** - absolute paths, URLs, `*.js` and relative ids with no
//!    reference module are returned untouched
//! 2. **Compaction** - relative ids are joined to the reference module's
//!    directory, `.` and `..` segments folded away
//! 3. **Map** - the reference module's own map, else `map["*"]`, applied to
//!    relative and absolute ids alike
//! 4. **Packages** - a bare package name becomes `<name>/<main>`
//! 5. **Aliases** - exact-id aliases are re-resolved from scratch

use crate::error::{Error, Result};
use dojo_amd_util::path as upath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Guard against alias chains that loop back on themselves.
const MAX_ALIAS_DEPTH: usize = 16;

/// The subset of the Dojo loader the resolution hooks need.
pub trait DojoRequire: Send + Sync {
    /// Convert `mid` to an absolute module id, relative to `reference` if given.
    fn to_abs_mid(&self, mid: &str, reference: Option<&str>) -> Result<String>;

    /// The loader's base URL on disk.
    fn base_url(&self) -> &Path;
}

/// A Dojo package definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageConfig {
    pub name: String,
    /// Package directory, relative to `baseUrl` unless absolute.
    #[serde(default)]
    pub location: Option<String>,
    /// Module loaded for the bare package name.
    #[serde(default)]
    pub main: Option<String>,
}

impl PackageConfig {
    fn main(&self) -> &str {
        self.main.as_deref().unwrap_or("main")
    }
}

/// Dojo loader configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoaderConfig {
    pub base_url: PathBuf,
    pub packages: Vec<PackageConfig>,
    /// Reference-module prefix (or `*`) to a map of id prefix replacements.
    pub map: BTreeMap<String, BTreeMap<String, String>>,
    /// Exact module-id aliases, applied in order.
    pub aliases: Vec<(String, String)>,
}

impl LoaderConfig {
    /// Create a loader config rooted at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<PathBuf>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Add a package.
    #[must_use]
    pub fn package(mut self, name: &str, location: Option<&str>, main: Option<&str>) -> Self {
        self.packages.push(PackageConfig {
            name: name.to_string(),
            location: location.map(str::to_string),
            main: main.map(str::to_string),
        });
        self
    }

    /// Add a map entry for modules under `reference` (or `*`).
    #[must_use]
    pub fn map(mut self, reference: &str, from: &str, to: &str) -> Self {
        self.map
            .entry(reference.to_string())
            .or_default()
            .insert(from.to_string(), to.to_string());
        self
    }

    /// Add an alias.
    #[must_use]
    pub fn alias(mut self, from: &str, to: &str) -> Self {
        self.aliases.push((from.to_string(), to.to_string()));
        self
    }

    fn find_package(&self, name: &str) -> Option<&PackageConfig> {
        self.packages.iter().find(|pkg| pkg.name == name)
    }

    /// File location of an absolute module id (without extension probing).
    #[must_use]
    pub fn module_path(&self, mid: &str) -> PathBuf {
        let (pid, rest) = match mid.split_once('/') {
            Some((pid, rest)) => (pid, Some(rest)),
            None => (mid, None),
        };
        if let Some(pkg) = self.find_package(pid) {
            let location = pkg.location.as_deref().unwrap_or(pid);
            let root = upath::resolve(&self.base_url, location);
            return root.join(rest.unwrap_or_else(|| pkg.main()));
        }
        upath::resolve(&self.base_url, mid)
    }

    fn to_abs_mid_inner(&self, mid: &str, reference: Option<&str>, depth: usize) -> Result<String> {
        let is_relative = mid.starts_with('.');
        if mid.is_empty()
            || mid.starts_with('/')
            || mid.contains(':')
            || mid.ends_with(".js")
            || (is_relative && reference.is_none())
        {
            return Ok(mid.to_string());
        }

        let mut mid = match reference {
            Some(reference) if is_relative => compact_path(&format!("{reference}/../{mid}")),
            _ => compact_path(mid),
        };
        if mid.starts_with('.') {
            return Err(Error::IrrationalPath { mid });
        }

        // the reference module's own scope shadows `*` entirely
        let scope = reference
            .and_then(|reference| {
                let scoped = self.map.iter().filter(|(key, _)| key.as_str() != "*");
                longest_prefix(reference, scoped)
            })
            .map(|(_, scope)| scope)
            .or_else(|| self.map.get("*"));
        if let Some((from_len, to)) = scope.and_then(|scope| run_map_prog(&mid, scope)) {
            mid = format!("{to}{}", &mid[from_len..]);
        }

        let (pid, rest) = match mid.split_once('/') {
            Some((pid, rest)) => (pid, Some(rest)),
            None => (mid.as_str(), None),
        };
        if let Some(pkg) = self.find_package(pid) {
            mid = format!("{}/{}", pkg.name, rest.unwrap_or_else(|| pkg.main()));
        }

        if let Some((_, target)) = self.aliases.iter().find(|(from, _)| *from == mid) {
            if depth >= MAX_ALIAS_DEPTH {
                return Err(Error::other(format!("alias cycle while resolving {mid}")));
            }
            return self.to_abs_mid_inner(target, None, depth + 1);
        }
        Ok(mid)
    }
}

impl DojoRequire for LoaderConfig {
    fn to_abs_mid(&self, mid: &str, reference: Option<&str>) -> Result<String> {
        self.to_abs_mid_inner(mid, reference, 0)
    }

    fn base_url(&self) -> &Path {
        &self.base_url
    }
}

/// Fold `.` and `..` segments out of a slash-separated id.
///
/// A `..` with nothing left to pop (or following another `..`) is kept.
#[must_use]
pub fn compact_path(path: &str) -> String {
    let normalized = upath::to_slash(path);
    let mut result: Vec<&str> = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            ".." if result.last().is_some_and(|last| *last != "..") => {
                result.pop();
            }
            "." => {}
            other => result.push(other),
        }
    }
    result.join("/")
}

/// Longest key of `map` that equals `target` or is a segment prefix of it.
fn longest_prefix<'a, V: 'a>(
    target: &str,
    map: impl Iterator<Item = (&'a String, &'a V)>,
) -> Option<(&'a String, &'a V)> {
    map.filter(|(key, _)| is_segment_prefix(key, target))
        .max_by_key(|(key, _)| key.len())
}

fn run_map_prog<'a>(mid: &str, map: &'a BTreeMap<String, String>) -> Option<(usize, &'a str)> {
    longest_prefix(mid, map.iter()).map(|(from, to)| (from.len(), to.as_str()))
}

fn is_segment_prefix(prefix: &str, target: &str) -> bool {
    target == prefix
        || (target.starts_with(prefix) && target.as_bytes().get(prefix.len()) == Some(&b'/'))
}
