//! Module factory.
//!
//! Drives requests through the plugin hooks and the default resolver, and
//! grows a compilation's module graph from the AMD calls found in each module.
//!
//! ## Usage
//!
//! ```ignore
//! use dojo_amd_core::{Compilation, Compiler, DojoAmdOptions, DojoAmdPlugin, FsResolver, ModuleFactory, ResolveData};
//!
//! let mut factory = ModuleFactory::new(Compiler::new("/app"), FsResolver::new(loader));
//! factory.add_plugin(Box::new(DojoAmdPlugin::new(options)?));
//! factory.run()?;
//!
//! let mut compilation = Compilation::new("main");
//! let entry = factory.create(&mut compilation, ResolveData::new("app/main", "/app"))?;
//! ```

use crate::dependencies::ItemDependency;
use crate::hooks::{HookResult, Plugin, PluginContainer};
use crate::host::{Compilation, Compiler, ModuleId, ModuleRecord, ResolveData};
use crate::parser::{CallExpr, Param, ParserState, RequireCallHandler, Verb};
use crate::resolve::NormalResolver;
use rustc_hash::FxHashMap as HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// An AMD call found by the JavaScript parser.
#[derive(Debug, Clone)]
pub struct AmdCall {
    pub verb: Verb,
    pub expr: CallExpr,
    pub args: Vec<Param>,
    /// The call sits inside a `try` block.
    pub in_try: bool,
}

impl AmdCall {
    #[must_use]
    pub fn new(verb: Verb, expr: CallExpr, args: Vec<Param>) -> Self {
        Self {
            verb,
            expr,
            args,
            in_try: false,
        }
    }

    #[must_use]
    pub fn in_try(mut self, in_try: bool) -> Self {
        self.in_try = in_try;
        self
    }
}

/// Creates modules for requests.
pub struct ModuleFactory {
    plugins: PluginContainer,
    resolver: Box<dyn NormalResolver>,
}

impl ModuleFactory {
    #[must_use]
    pub fn new(compiler: Compiler, resolver: impl NormalResolver + 'static) -> Self {
        Self {
            plugins: PluginContainer::new(compiler),
            resolver: Box::new(resolver),
        }
    }

    /// Register a plugin.
    pub fn add_plugin(&mut self, plugin: Box<dyn Plugin>) {
        self.plugins.add(plugin);
    }

    /// Register a plugin (builder form).
    pub fn plugin(mut self, plugin: Box<dyn Plugin>) -> Self {
        self.add_plugin(plugin);
        self
    }

    #[must_use]
    pub fn compiler(&self) -> &Compiler {
        self.plugins.compiler()
    }

    /// Switch between single and watch runs.
    pub fn set_watch(&mut self, watch: bool) {
        self.plugins.set_watch(watch);
    }

    /// Start a (re)build.
    pub fn run(&mut self) -> HookResult<()> {
        self.plugins.run()
    }

    /// Resolve a request and bind it to a module of `compilation`.
    ///
    /// Returns the id of the module the request ended up bound to, which may
    /// be an existing module.
    pub fn create(
        &mut self,
        compilation: &mut Compilation,
        mut data: ResolveData,
    ) -> HookResult<ModuleId> {
        let resolver = self.resolver.as_ref();
        self.plugins.before_resolve(&mut data, compilation, resolver)?;
        self.plugins.resolve(&mut data, compilation, resolver)?;
        self.plugins.after_resolve(&mut data, compilation, resolver)?;

        let module = ModuleRecord::from_resolve_data(&data);
        let id = self.plugins.module(module, &data, compilation)?;
        if let Some(issuer) = data.dependencies.iter().find_map(|dep| dep.issuer) {
            compilation.graph.set_issuer(id, issuer);
        }
        debug!(request = %data.request, id, "Created module");
        Ok(id)
    }

    /// Build a module: run the build hooks, then process its AMD calls.
    ///
    /// A module is marked AMD when it calls `define`, whatever the arguments.
    pub fn build(
        &mut self,
        compilation: &mut Compilation,
        id: ModuleId,
        calls: &[AmdCall],
    ) -> HookResult<ParserState> {
        self.plugins.build_module(compilation, id)?;

        let mut state = ParserState::new(id);
        let mut is_amd = false;
        for call in calls {
            state.scope.in_try = call.in_try;
            RequireCallHandler::new(call.verb).process_call(&mut state, &call.expr, &call.args);
            is_amd |= call.verb == Verb::Define;
        }
        state.scope.in_try = false;

        if let Some(module) = compilation.graph.get_mut(id) {
            module.is_amd = is_amd;
        }
        Ok(state)
    }

    /// Create the modules a parsed module depends on.
    ///
    /// Failures of optional dependencies (inside `try`) are logged and
    /// skipped; any other failure is returned.
    pub fn process_dependencies(
        &mut self,
        compilation: &mut Compilation,
        state: &ParserState,
    ) -> HookResult<HashMap<String, ModuleId>> {
        let context = compilation
            .graph
            .get(state.module)
            .and_then(|module| module.resource.parent().map(PathBuf::from))
            .unwrap_or_else(|| self.compiler().context.clone());

        let mut resolved = HashMap::default();
        for dep in state.items() {
            if resolved.contains_key(&dep.request) {
                continue;
            }
            let data = ResolveData::new(dep.request.clone(), context.clone())
                .with_dependency(with_issuer(dep, state.module));
            match self.create(compilation, data) {
                Ok(id) => {
                    resolved.insert(dep.request.clone(), id);
                }
                Err(err) if dep.optional => {
                    warn!(request = %dep.request, error = %err, "Optional dependency not found");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(resolved)
    }

    /// Finish the compilation.
    pub fn seal(&mut self, compilation: &mut Compilation) -> HookResult<()> {
        self.plugins.seal(compilation)
    }
}

fn with_issuer(dep: &ItemDependency, issuer: ModuleId) -> ItemDependency {
    match dep.issuer {
        Some(_) => dep.clone(),
        None => dep.clone().with_issuer(issuer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DojoAmdConfig, DojoAmdOptions};
    use crate::dependencies::Span;
    use crate::loader::LoaderConfig;
    use crate::plugins::DojoAmdPlugin;
    use crate::resolve::ResolveError;

    struct MapResolver;

    impl NormalResolver for MapResolver {
        fn resolve(&self, data: &mut ResolveData) -> Result<(), ResolveError> {
            if data.request.starts_with("missing") {
                return Err(ResolveError {
                    request: data.request.clone(),
                    message: "not found".to_string(),
                });
            }
            let resource = PathBuf::from(format!("/js/{}.js", data.request));
            data.create_data.request = resource.to_string_lossy().into_owned();
            data.create_data.resource = Some(resource);
            Ok(())
        }
    }

    fn deps(values: &[&str]) -> Param {
        Param::ConstArray {
            values: values.iter().map(|v| (*v).to_string()).collect(),
            range: Span::new(7, 30),
        }
    }

    #[test]
    fn test_create_without_plugins() {
        let mut factory = ModuleFactory::new(Compiler::new("/app"), MapResolver);
        let mut compilation = Compilation::new("main");

        let id = factory
            .create(&mut compilation, ResolveData::new("app/main", "/app"))
            .unwrap();
        let module = compilation.graph.get(id).unwrap();
        assert_eq!(module.resource, PathBuf::from("/js/app/main.js"));
        assert!(module.absmids.is_empty());
    }

    #[test]
    fn test_build_marks_amd() {
        let mut factory = ModuleFactory::new(Compiler::new("/app"), MapResolver);
        let mut compilation = Compilation::new("main");
        let id = compilation
            .graph
            .add(ModuleRecord::new("/js/a.js", "/js/a.js"));

        let define = AmdCall::new(
            Verb::Define,
            CallExpr::new("define", Span::new(0, 40)),
            vec![deps(&["require", "app/b"])],
        );
        let state = factory.build(&mut compilation, id, &[define]).unwrap();
        assert!(compilation.graph.get(id).unwrap().is_amd);
        assert_eq!(state.items().count(), 1);

        let require = AmdCall::new(
            Verb::Require,
            CallExpr::new("require", Span::new(0, 40)),
            vec![deps(&["app/b"])],
        );
        factory.build(&mut compilation, id, &[require]).unwrap();
        assert!(!compilation.graph.get(id).unwrap().is_amd);
    }

    #[test]
    fn test_define_without_deps_keeps_aliases_at_seal() {
        let config = DojoAmdConfig {
            loader: LoaderConfig::new("/js"),
            ..Default::default()
        };
        let plugin = DojoAmdPlugin::new(DojoAmdOptions::from_config(config).unwrap()).unwrap();
        let mut factory =
            ModuleFactory::new(Compiler::new("/app"), MapResolver).plugin(Box::new(plugin));
        factory.run().unwrap();
        let mut compilation = Compilation::new("main");

        let factory_fn = factory
            .create(&mut compilation, ResolveData::new("app/factory", "/js"))
            .unwrap();
        let bundle = factory
            .create(&mut compilation, ResolveData::new("app/nls/strings", "/js"))
            .unwrap();
        let plain = factory
            .create(&mut compilation, ResolveData::new("app/plain", "/js"))
            .unwrap();

        // define(function () {...}) and define({ root: {...} })
        let define = |arg: Param| {
            AmdCall::new(
                Verb::Define,
                CallExpr::new("define", Span::new(0, 40)),
                vec![arg],
            )
        };
        factory
            .build(
                &mut compilation,
                factory_fn,
                &[define(Param::Expression {
                    range: Span::new(7, 30),
                })],
            )
            .unwrap();
        factory
            .build(
                &mut compilation,
                bundle,
                &[define(Param::Expression {
                    range: Span::new(7, 20),
                })],
            )
            .unwrap();
        factory.build(&mut compilation, plain, &[]).unwrap();
        assert!(compilation.graph.get(factory_fn).unwrap().is_amd);

        factory.seal(&mut compilation).unwrap();
        assert_eq!(compilation.graph.abs_mid(factory_fn), Some("app/factory"));
        assert_eq!(compilation.graph.abs_mid(bundle), Some("app/nls/strings"));
        assert_eq!(compilation.graph.abs_mid(plain), None);
    }

    #[test]
    fn test_process_dependencies_sets_issuer() {
        let mut factory = ModuleFactory::new(Compiler::new("/app"), MapResolver);
        let mut compilation = Compilation::new("main");
        let id = compilation
            .graph
            .add(ModuleRecord::new("/js/a.js", "/js/a.js"));

        let define = AmdCall::new(
            Verb::Define,
            CallExpr::new("define", Span::new(0, 40)),
            vec![deps(&["app/b", "app/c", "app/b"])],
        );
        let state = factory.build(&mut compilation, id, &[define]).unwrap();
        let resolved = factory.process_dependencies(&mut compilation, &state).unwrap();

        assert_eq!(resolved.len(), 2);
        let b = resolved["app/b"];
        assert_eq!(compilation.graph.issuer(b).unwrap().request, "/js/a.js");
    }

    #[test]
    fn test_optional_dependency_failure_skipped() {
        let mut factory = ModuleFactory::new(Compiler::new("/app"), MapResolver);
        let mut compilation = Compilation::new("main");
        let id = compilation
            .graph
            .add(ModuleRecord::new("/js/a.js", "/js/a.js"));

        let call = AmdCall::new(
            Verb::Require,
            CallExpr::new("require", Span::new(0, 40)),
            vec![deps(&["missing/x", "app/ok"])],
        );
        let state = factory
            .build(&mut compilation, id, &[call.clone().in_try(true)])
            .unwrap();
        let resolved = factory.process_dependencies(&mut compilation, &state).unwrap();
        assert_eq!(resolved.len(), 1);
        assert!(resolved.contains_key("app/ok"));

        let state = factory.build(&mut compilation, id, &[call]).unwrap();
        let err = factory
            .process_dependencies(&mut compilation, &state)
            .unwrap_err();
        assert_eq!(err.hook, "resolve");
    }
}
