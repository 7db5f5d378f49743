//! Hook system for module-factory plugins.
//!
//! Plugins tap into the life of a request and of the compilation:
//!
//! 1. **Run** - `run` / `watch_run` at the start of every (re)build
//! 2. **Resolution** - `before_resolve`, `resolve`, `after_resolve` per request
//! 3. **Module binding** - `module` when a module object is created for a
//!    resolved request
//! 4. **Build** - `build_module` before each module is parsed
//! 5. **Seal** - `seal` once the module graph is complete
//!
//! ## Example
//!
//! ```ignore
//! use dojo_amd_core::hooks::{Plugin, HookResult, ResolveContext};
//! use dojo_amd_core::host::ResolveData;
//!
//! struct Lowercase;
//!
//! impl Plugin for Lowercase {
//!     fn name(&self) -> &str { "lowercase" }
//!
//!     fn before_resolve(&mut self, data: &mut ResolveData, _cx: &ResolveContext<'_>) -> HookResult<()> {
//!         data.request = data.request.to_lowercase();
//!         Ok(())
//!     }
//! }
//! ```

use crate::host::{Compilation, Compiler, ModuleId, ModuleRecord, ResolveData};
use crate::resolve::NormalResolver;

/// Result type for plugin hooks.
pub type HookResult<T> = Result<T, HookError>;

/// Error from a plugin.
#[derive(Debug)]
pub struct HookError {
    /// Plugin name that caused the error.
    pub plugin: String,
    /// Hook that failed.
    pub hook: &'static str,
    /// Error message.
    pub message: String,
}

impl HookError {
    #[must_use]
    pub fn new(plugin: &str, hook: &'static str, err: impl std::fmt::Display) -> Self {
        Self {
            plugin: plugin.to_string(),
            hook,
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for HookError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.plugin, self.hook, self.message)
    }
}

impl std::error::Error for HookError {}

/// Outcome of a plugin's resolve hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The request was resolved; later plugins are skipped.
    Resolved,
    /// Resolution failed softly; later plugins may still succeed.
    Unresolved,
}

/// A module on its way through the `module` hook.
#[derive(Debug)]
pub enum ModuleBinding {
    /// Not yet part of the graph.
    Pending(ModuleRecord),
    /// Bound to a module already in the graph.
    Bound(ModuleId),
}

/// What resolution hooks can see.
pub struct ResolveContext<'a> {
    pub compiler: &'a Compiler,
    pub compilation: &'a Compilation,
    /// The host's default resolution step.
    pub normal: &'a dyn NormalResolver,
}

/// Plugin enforcement ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PluginEnforce {
    /// Runs before normal plugins.
    Pre,
    /// Default ordering (no enforcement).
    #[default]
    Normal,
    /// Runs after normal plugins.
    Post,
}

/// A module-factory plugin.
///
/// All hooks have no-op defaults, so you only implement the ones you need.
pub trait Plugin: Send + Sync {
    /// Plugin name for debugging and error messages.
    fn name(&self) -> &str;

    /// Plugin ordering: `Pre`, `Normal` (default), or `Post`.
    fn enforce(&self) -> PluginEnforce {
        PluginEnforce::Normal
    }

    /// Called at the start of a run.
    fn run(&mut self, _compiler: &Compiler) -> HookResult<()> {
        Ok(())
    }

    /// Called at the start of every watch rebuild.
    fn watch_run(&mut self, _compiler: &Compiler) -> HookResult<()> {
        Ok(())
    }

    /// Inspect or rewrite a request before resolution.
    fn before_resolve(&mut self, _data: &mut ResolveData, _cx: &ResolveContext<'_>) -> HookResult<()> {
        Ok(())
    }

    /// Resolve a request.
    ///
    /// Return `Some(Resolved)` to finish resolution, `Some(Unresolved)` or
    /// `None` to let the next plugin or the default resolver handle it.
    fn resolve(
        &mut self,
        _data: &mut ResolveData,
        _cx: &ResolveContext<'_>,
    ) -> HookResult<Option<ResolveOutcome>> {
        Ok(None)
    }

    /// Inspect or amend the resolution result.
    fn after_resolve(&mut self, _data: &mut ResolveData, _cx: &ResolveContext<'_>) -> HookResult<()> {
        Ok(())
    }

    /// Bind a freshly created module, possibly to an existing one.
    fn module(
        &mut self,
        binding: ModuleBinding,
        _data: &ResolveData,
        _compilation: &mut Compilation,
    ) -> HookResult<ModuleBinding> {
        Ok(binding)
    }

    /// Called before a module is built.
    fn build_module(&mut self, _compilation: &mut Compilation, _id: ModuleId) -> HookResult<()> {
        Ok(())
    }

    /// Called once the module graph is complete.
    fn seal(&mut self, _compilation: &mut Compilation) -> HookResult<()> {
        Ok(())
    }
}

/// A container for managing multiple plugins.
///
/// Plugins are sorted by their `enforce()` ordering: `Pre` → `Normal` → `Post`.
/// Within the same enforcement level, insertion order is preserved.
pub struct PluginContainer {
    plugins: Vec<Box<dyn Plugin>>,
    compiler: Compiler,
    /// Whether plugins need re-sorting after insertion.
    needs_sort: bool,
}

impl PluginContainer {
    /// Create a new plugin container.
    #[must_use]
    pub fn new(compiler: Compiler) -> Self {
        Self {
            plugins: Vec::new(),
            compiler,
            needs_sort: false,
        }
    }

    /// Add a plugin. Plugins are automatically sorted by enforce order.
    pub fn add(&mut self, plugin: Box<dyn Plugin>) {
        if plugin.enforce() != PluginEnforce::Normal {
            self.needs_sort = true;
        }
        self.plugins.push(plugin);
    }

    /// Uses a stable sort to preserve insertion order within each level.
    fn ensure_sorted(&mut self) {
        if self.needs_sort {
            self.plugins.sort_by_key(|p| p.enforce());
            self.needs_sort = false;
        }
    }

    #[must_use]
    pub fn compiler(&self) -> &Compiler {
        &self.compiler
    }

    /// Set watch mode.
    pub fn set_watch(&mut self, watch: bool) {
        self.compiler.watch = watch;
    }

    /// Check if any plugins are registered.
    #[must_use]
    pub fn has_plugins(&self) -> bool {
        !self.plugins.is_empty()
    }

    /// Call `run` (or `watch_run` in watch mode) on all plugins.
    pub fn run(&mut self) -> HookResult<()> {
        self.ensure_sorted();
        for plugin in &mut self.plugins {
            if self.compiler.watch {
                plugin.watch_run(&self.compiler)?;
            } else {
                plugin.run(&self.compiler)?;
            }
        }
        Ok(())
    }

    /// Call `before_resolve` on all plugins.
    pub fn before_resolve(
        &mut self,
        data: &mut ResolveData,
        compilation: &Compilation,
        normal: &dyn NormalResolver,
    ) -> HookResult<()> {
        self.ensure_sorted();
        let cx = ResolveContext {
            compiler: &self.compiler,
            compilation,
            normal,
        };
        for plugin in &mut self.plugins {
            plugin.before_resolve(data, &cx)?;
        }
        Ok(())
    }

    /// Resolve through plugins, falling back to the default resolver.
    pub fn resolve(
        &mut self,
        data: &mut ResolveData,
        compilation: &Compilation,
        normal: &dyn NormalResolver,
    ) -> HookResult<()> {
        self.ensure_sorted();
        let cx = ResolveContext {
            compiler: &self.compiler,
            compilation,
            normal,
        };
        for plugin in &mut self.plugins {
            if plugin.resolve(data, &cx)? == Some(ResolveOutcome::Resolved) {
                return Ok(());
            }
        }
        normal
            .resolve(data)
            .map_err(|err| HookError::new(normal.name(), "resolve", err))
    }

    /// Call `after_resolve` on all plugins.
    pub fn after_resolve(
        &mut self,
        data: &mut ResolveData,
        compilation: &Compilation,
        normal: &dyn NormalResolver,
    ) -> HookResult<()> {
        self.ensure_sorted();
        let cx = ResolveContext {
            compiler: &self.compiler,
            compilation,
            normal,
        };
        for plugin in &mut self.plugins {
            plugin.after_resolve(data, &cx)?;
        }
        Ok(())
    }

    /// Pass a new module through all plugins and return its graph id.
    ///
    /// Stops at the first plugin that binds the module; a module nobody bound
    /// is added to the graph as-is.
    pub fn module(
        &mut self,
        module: ModuleRecord,
        data: &ResolveData,
        compilation: &mut Compilation,
    ) -> HookResult<ModuleId> {
        self.ensure_sorted();
        let mut binding = ModuleBinding::Pending(module);
        for plugin in &mut self.plugins {
            binding = plugin.module(binding, data, compilation)?;
            if let ModuleBinding::Bound(id) = binding {
                return Ok(id);
            }
        }
        match binding {
            ModuleBinding::Pending(module) => Ok(compilation.graph.add(module)),
            ModuleBinding::Bound(id) => Ok(id),
        }
    }

    /// Call `build_module` on all plugins.
    pub fn build_module(&mut self, compilation: &mut Compilation, id: ModuleId) -> HookResult<()> {
        self.ensure_sorted();
        for plugin in &mut self.plugins {
            plugin.build_module(compilation, id)?;
        }
        Ok(())
    }

    /// Call `seal` on all plugins.
    pub fn seal(&mut self, compilation: &mut Compilation) -> HookResult<()> {
        self.ensure_sorted();
        for plugin in &mut self.plugins {
            plugin.seal(compilation)?;
        }
        Ok(())
    }
}
