//! Host bundler model.
//!
//! The pieces of the bundler's compilation state the resolution hooks read and
//! write: the compiler, a compilation with its module graph, module records and
//! the transient per-request resolve data.

use crate::absmid::{AbsMids, AliasEntry};
use crate::dependencies::ItemDependency;
use crate::error::Result;
use std::path::{Path, PathBuf};

/// Unique identifier for a module in the graph.
pub type ModuleId = usize;

/// The compiler driving one or more compilations.
#[derive(Debug, Clone)]
pub struct Compiler {
    /// Project context directory.
    pub context: PathBuf,
    /// Whether this is a watch run.
    pub watch: bool,
}

impl Compiler {
    #[must_use]
    pub fn new(context: impl Into<PathBuf>) -> Self {
        Self {
            context: context.into(),
            watch: false,
        }
    }
}

/// One compilation and its modules.
#[derive(Debug, Default)]
pub struct Compilation {
    /// Compilation name (child compilations carry their plugin's name).
    pub name: String,
    pub graph: ModuleGraph,
}

impl Compilation {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            graph: ModuleGraph::new(),
        }
    }
}

/// A loader applied to a module's source before parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderUse {
    pub loader: String,
    pub options: Option<String>,
}

impl LoaderUse {
    #[must_use]
    pub fn new(loader: impl Into<String>, options: Option<String>) -> Self {
        Self {
            loader: loader.into(),
            options,
        }
    }
}

/// Extra information carried alongside a request.
#[derive(Debug, Clone, Default)]
pub struct ContextInfo {
    /// Request as seen by the resolve stage, after canonicalization.
    pub original_request: Option<String>,
}

/// What the default resolver produced for a request.
#[derive(Debug, Clone, Default)]
pub struct CreateData {
    /// Full resolved request: loaders and resource joined by `!`.
    pub request: String,
    pub resource: Option<PathBuf>,
    pub loaders: Vec<LoaderUse>,
}

/// A request on its way through before-resolve, resolve and after-resolve.
#[derive(Debug, Clone, Default)]
pub struct ResolveData {
    /// Requested module id; `!` separates loader-chain segments.
    pub request: String,
    /// Directory relative file requests resolve against.
    pub context: PathBuf,
    /// Dependencies that caused this request.
    pub dependencies: Vec<ItemDependency>,
    pub context_info: ContextInfo,
    /// absMids collected before a module exists.
    pub absmids: AbsMids,
    pub create_data: CreateData,
}

impl ResolveData {
    #[must_use]
    pub fn new(request: impl Into<String>, context: impl Into<PathBuf>) -> Self {
        Self {
            request: request.into(),
            context: context.into(),
            ..Default::default()
        }
    }

    /// Attach the dependency that caused this request.
    #[must_use]
    pub fn with_dependency(mut self, dep: ItemDependency) -> Self {
        self.dependencies.push(dep);
        self
    }
}

/// A module in the compilation.
#[derive(Debug, Clone)]
pub struct ModuleRecord {
    /// Resolved request; modules with equal requests are the same module.
    pub request: String,
    pub resource: PathBuf,
    pub loaders: Vec<LoaderUse>,
    pub absmids: AbsMids,
    /// Request the module was created from, recorded at creation time.
    pub original_request: Option<String>,
    /// Set when the parser detects an AMD `define` in the module.
    pub is_amd: bool,
}

impl ModuleRecord {
    #[must_use]
    pub fn new(request: impl Into<String>, resource: impl Into<PathBuf>) -> Self {
        Self {
            request: request.into(),
            resource: resource.into(),
            loaders: Vec::new(),
            absmids: AbsMids::new(),
            original_request: None,
            is_amd: false,
        }
    }

    /// Build a module from the output of the default resolver.
    #[must_use]
    pub fn from_resolve_data(data: &ResolveData) -> Self {
        let resource = data.create_data.resource.clone().unwrap_or_default();
        let mut module = Self::new(data.create_data.request.clone(), resource);
        module.loaders = data.create_data.loaders.clone();
        module
    }

    /// The primary absMid.
    #[must_use]
    pub fn abs_mid(&self) -> Option<&str> {
        self.absmids.primary()
    }

    /// Add an absMid alias.
    ///
    /// With no name, the current primary absMid is made non-provisional so
    /// that it survives seal-time pruning.
    pub fn add_abs_mid(&mut self, name: Option<&str>, is_provisional: bool) -> Result<()> {
        match name {
            Some(name) => self.absmids.add(name, is_provisional),
            None => self.absmids.promote_primary(),
        }
    }

    /// Prune absMid aliases.
    pub fn filter_abs_mids<F>(&mut self, keep: F)
    where
        F: FnMut(&str, bool) -> bool,
    {
        self.absmids.filter(keep);
    }

    #[must_use]
    pub fn aliases(&self) -> &[AliasEntry] {
        self.absmids.aliases()
    }
}

/// The module graph of a compilation.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: Vec<ModuleRecord>,
    issuers: Vec<Option<ModuleId>>,
}

impl ModuleGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module to the graph, returning its ID.
    pub fn add(&mut self, module: ModuleRecord) -> ModuleId {
        let id = self.modules.len();
        self.modules.push(module);
        self.issuers.push(None);
        id
    }

    #[must_use]
    pub fn get(&self, id: ModuleId) -> Option<&ModuleRecord> {
        self.modules.get(id)
    }

    pub fn get_mut(&mut self, id: ModuleId) -> Option<&mut ModuleRecord> {
        self.modules.get_mut(id)
    }

    /// Record which module first requested `id`. The first issuer wins.
    pub fn set_issuer(&mut self, id: ModuleId, issuer: ModuleId) {
        if let Some(slot) = self.issuers.get_mut(id) {
            if slot.is_none() && id != issuer {
                *slot = Some(issuer);
            }
        }
    }

    /// The module that first requested `id`.
    #[must_use]
    pub fn issuer(&self, id: ModuleId) -> Option<&ModuleRecord> {
        self.issuers
            .get(id)
            .copied()
            .flatten()
            .and_then(|issuer| self.modules.get(issuer))
    }

    /// The primary absMid of `id`, if it has one.
    #[must_use]
    pub fn abs_mid(&self, id: ModuleId) -> Option<&str> {
        self.modules.get(id).and_then(ModuleRecord::abs_mid)
    }

    /// Get a module by its resource path.
    #[must_use]
    pub fn find_by_resource(&self, resource: &Path) -> Option<ModuleId> {
        self.modules.iter().position(|m| m.resource == resource)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ModuleRecord> {
        self.modules.iter_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_issuer() {
        let mut graph = ModuleGraph::new();
        let a = graph.add(ModuleRecord::new("/js/a.js", "/js/a.js"));
        let b = graph.add(ModuleRecord::new("/js/b.js", "/js/b.js"));
        let c = graph.add(ModuleRecord::new("/js/c.js", "/js/c.js"));

        graph.set_issuer(b, a);
        graph.set_issuer(b, c);
        graph.set_issuer(a, a);

        assert_eq!(graph.issuer(b).unwrap().request, "/js/a.js");
        assert!(graph.issuer(a).is_none());
        assert!(graph.issuer(99).is_none());
        assert_eq!(graph.find_by_resource(Path::new("/js/c.js")), Some(c));
    }

    #[test]
    fn test_module_add_abs_mid_promotes() {
        let mut module = ModuleRecord::new("/js/a.js", "/js/a.js");
        module.add_abs_mid(Some("app/a"), true).unwrap();
        assert!(module.aliases()[0].is_provisional);

        module.add_abs_mid(None, false).unwrap();
        assert_eq!(module.aliases(), [AliasEntry::new("app/a", false)]);
        assert_eq!(module.abs_mid(), Some("app/a"));
    }

    #[test]
    fn test_module_from_resolve_data() {
        let mut data = ResolveData::new("dojo/text!./x.html", "/js");
        data.create_data = CreateData {
            request: "dojo/text.js!/js/x.html".to_string(),
            resource: Some(PathBuf::from("/js/x.html")),
            loaders: vec![LoaderUse::new("dojo/text", None)],
        };
        let module = ModuleRecord::from_resolve_data(&data);
        assert_eq!(module.request, "dojo/text.js!/js/x.html");
        assert_eq!(module.resource, PathBuf::from("/js/x.html"));
        assert_eq!(module.loaders.len(), 1);
        assert!(module.absmids.is_empty());
    }
}
