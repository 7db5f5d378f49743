//! Default request resolution.
//!
//! Resolves a (possibly loader-chained) request to files on disk.
//!
//! ## Segment Types
//!
//! - Relative: `./nls/strings`, `../lib/foo` (against the request context)
//! - Absolute: `/abs/path/to/module`
//! - Module id: `dojo/on`, `dijit/form/Button` (against the loader's `baseUrl`
//!   and package locations)
//!
//! Every `!`-separated segment but the last names a loader module; the last
//! names the resource.

use crate::host::{LoaderUse, ResolveData};
use crate::loader::LoaderConfig;
use dojo_amd_util::path as upath;
use std::path::{Path, PathBuf};

/// Error during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveError {
    pub request: String,
    pub message: String,
}

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Cannot resolve '{}': {}", self.request, self.message)
    }
}

impl std::error::Error for ResolveError {}

/// The host's default resolution step.
pub trait NormalResolver {
    /// Name of the step in the resolver chain.
    fn name(&self) -> &str {
        "NormalModuleFactory"
    }

    /// Resolve `data.request`, filling in `data.create_data`.
    fn resolve(&self, data: &mut ResolveData) -> Result<(), ResolveError>;
}

/// Filesystem-backed resolver.
#[derive(Debug, Clone)]
pub struct FsResolver {
    loader: LoaderConfig,
}

impl FsResolver {
    /// Extensions tried when a segment does not name an existing file.
    pub const EXTENSIONS: &'static [&'static str] = &["js", "jsx"];

    #[must_use]
    pub fn new(loader: LoaderConfig) -> Self {
        Self { loader }
    }

    fn resolve_segment(&self, segment: &str, context: &Path) -> Result<PathBuf, String> {
        let target = if upath::is_absolute(segment) {
            PathBuf::from(segment)
        } else if segment.starts_with('.') {
            upath::resolve(context, segment)
        } else {
            self.loader.module_path(segment)
        };

        if target.is_file() {
            return dunce::canonicalize(&target).map_err(|e| e.to_string());
        }
        for ext in Self::EXTENSIONS {
            let mut with_ext = target.clone().into_os_string();
            with_ext.push(".");
            with_ext.push(ext);
            let with_ext = PathBuf::from(with_ext);
            if with_ext.is_file() {
                return dunce::canonicalize(&with_ext).map_err(|e| e.to_string());
            }
        }
        Err(format!("File not found: {}", target.display()))
    }
}

impl NormalResolver for FsResolver {
    fn resolve(&self, data: &mut ResolveData) -> Result<(), ResolveError> {
        let request = data.request.trim_start_matches('!');
        let segments: Vec<&str> = request.split('!').collect();
        let mut resolved = Vec::with_capacity(segments.len());
        let mut loaders = Vec::new();

        for (idx, segment) in segments.iter().enumerate() {
            let (path_part, query) = match segment.split_once('?') {
                Some((path, query)) => (path, Some(query)),
                None => (*segment, None),
            };
            let path = self
                .resolve_segment(path_part, &data.context)
                .map_err(|message| ResolveError {
                    request: data.request.clone(),
                    message,
                })?;
            let mut rendered = upath::display_slash(&path);
            if let Some(query) = query {
                rendered.push('?');
                rendered.push_str(query);
            }
            if idx + 1 < segments.len() {
                loaders.push(LoaderUse::new(rendered.clone(), query.map(str::to_string)));
            } else {
                data.create_data.resource = Some(path);
            }
            resolved.push(rendered);
        }

        data.create_data.request = resolved.join("!");
        data.create_data.loaders = loaders;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn setup() -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        fs::create_dir_all(root.join("js/dojo")).unwrap();
        fs::create_dir_all(root.join("js/app/nls")).unwrap();
        fs::write(root.join("js/dojo/text.js"), "define({});").unwrap();
        fs::write(root.join("js/app/main.js"), "define([], 1);").unwrap();
        fs::write(root.join("js/app/tpl.html"), "<div></div>").unwrap();
        (dir, root)
    }

    #[test]
    fn test_resolve_module_id() {
        let (_dir, root) = setup();
        let resolver = FsResolver::new(LoaderConfig::new(root.join("js")));
        let mut data = ResolveData::new("app/main", &root);

        resolver.resolve(&mut data).unwrap();
        assert_eq!(
            data.create_data.resource,
            Some(root.join("js/app/main.js"))
        );
        assert!(data.create_data.loaders.is_empty());
    }

    #[test]
    fn test_resolve_loader_chain() {
        let (_dir, root) = setup();
        let resolver = FsResolver::new(LoaderConfig::new(root.join("js")));
        let mut data = ResolveData::new("dojo/text!./tpl.html", root.join("js/app"));

        resolver.resolve(&mut data).unwrap();
        assert_eq!(data.create_data.resource, Some(root.join("js/app/tpl.html")));
        assert_eq!(data.create_data.loaders.len(), 1);
        assert!(data.create_data.request.ends_with("/js/app/tpl.html"));
        assert!(data.create_data.request.contains("/js/dojo/text.js!"));
    }

    #[test]
    fn test_resolve_missing() {
        let (_dir, root) = setup();
        let resolver = FsResolver::new(LoaderConfig::new(root.join("js")));
        let mut data = ResolveData::new("app/nope", &root);

        let err = resolver.resolve(&mut data).unwrap_err();
        assert_eq!(err.request, "app/nope");
        assert!(err.to_string().contains("Cannot resolve 'app/nope'"));
        assert!(data.create_data.resource.is_none());
    }
}
