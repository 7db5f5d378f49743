//! Dojo AMD module-factory plugin.
//!
//! Computes absMid aliases for every module of a compilation, so that Dojo
//! code can reach a module at runtime by any of the ids it was requested as.
//!
//! ## How It Works
//!
//! 1. `before_resolve` - global `require` of a relative id resolves against the
//!    global context; `absMid=` query args become aliases; the request is
//!    canonicalized against the issuer's absMid
//! 2. `resolve` - the same again for the post-substitution request, then the
//!    default resolver; a failure restores the request it came in with
//! 3. `after_resolve` - NLS bundles get a locale-filtering loader when the
//!    locale set is restricted
//! 4. `module` - aliases move from the request onto the module; duplicate
//!    modules (same resolved request) merge into the first one
//! 5. `build_module` - a last attempt at an alias, now that the issuer is known
//! 6. `seal` - provisional aliases of non-AMD modules are pruned

use crate::config::DojoAmdOptions;
use crate::error::{Error, Result};
use crate::hooks::{
    HookError, HookResult, ModuleBinding, Plugin, PluginEnforce, ResolveContext, ResolveOutcome,
};
use crate::host::{Compilation, Compiler, LoaderUse, ModuleGraph, ModuleId, ModuleRecord, ResolveData};
use crate::mid;
use dojo_amd_util::path as upath;
use regex_lite::Regex;
use rustc_hash::FxHashMap as HashMap;
use std::path::Path;
use tracing::{debug, trace};

const PLUGIN_NAME: &str = "dojo-amd-module-factory";

/// Loader that strips unwanted locales from NLS root bundles.
pub const I18N_ROOT_MODIFIER_LOADER: &str = "dojo-amd/i18nRootModifier";

const NLS_BUNDLE_PATTERN: &str = r"/nls/[^/]*\.js$";

fn hook_error(hook: &'static str) -> impl FnOnce(Error) -> HookError {
    move |err| HookError::new(PLUGIN_NAME, hook, err)
}

/// The Dojo AMD module-factory plugin.
pub struct DojoAmdPlugin {
    options: DojoAmdOptions,
    /// Compiled only when the locale set is restricted.
    nls_bundle: Option<Regex>,
    /// Per compilation: resolved request to the module that owns it.
    /// Reset at the start of every run.
    modules: HashMap<String, HashMap<String, ModuleId>>,
}

impl DojoAmdPlugin {
    /// Create the plugin.
    pub fn new(options: DojoAmdOptions) -> Result<Self> {
        let nls_bundle = if options.locales.is_restricted() {
            let re = Regex::new(NLS_BUNDLE_PATTERN)
                .map_err(|e| Error::other(format!("invalid NLS pattern: {e}")))?;
            Some(re)
        } else {
            None
        };
        Ok(Self {
            options,
            nls_bundle,
            modules: HashMap::default(),
        })
    }

    /// Forget every module seen in the previous run.
    pub fn reset_for_run(&mut self) {
        self.modules.clear();
    }

    /// Number of distinct module identities recorded for `compilation`.
    #[must_use]
    pub fn identity_count(&self, compilation: &str) -> usize {
        self.modules.get(compilation).map_or(0, HashMap::len)
    }

    /// Collect absMids implied by the request itself.
    ///
    /// Explicit `absMid=` query args are added as non-provisional aliases and
    /// stripped. Then, unless the request starts with `!`, it is canonicalized
    /// against the issuer's absMid; a fully canonical result becomes a
    /// provisional alias and replaces the request.
    fn add_abs_mids_from_request(&self, data: &mut ResolveData, graph: &ModuleGraph) -> Result<()> {
        let (request, query_mids) = mid::take_abs_mid_query_args(&data.request);
        for abs_mid in &query_mids {
            debug!(request = %data.request, absmid = %abs_mid, "absMid from query args");
            data.absmids.add(abs_mid, false)?;
        }
        data.request = request;

        if data.request.starts_with('!') {
            return Ok(());
        }

        let context = data
            .dependencies
            .iter()
            .find_map(|dep| dep.issuer.and_then(|id| graph.abs_mid(id)));
        let Some(abs_mid) =
            mid::canonicalize(&data.request, context, self.options.dojo_require())
        else {
            if !data.request.is_empty() && mid::is_abs_mid_request(&data.request) {
                data.absmids.add(&data.request, true)?;
            }
            return Ok(());
        };
        if mid::is_abs_mid_request(&abs_mid) {
            trace!(request = %data.request, absmid = %abs_mid, "Provisional absMid");
            data.absmids.add(&abs_mid, true)?;
        }
        data.request = abs_mid;
        Ok(())
    }

    /// Map a relative segment onto `baseUrl` if it names `resource`.
    fn base_relative(&self, part: &str, resource: &Path) -> Option<String> {
        if !part.starts_with('.') {
            return None;
        }
        let resource = upath::display_slash(resource);
        let stripped = resource
            .strip_suffix(".js")
            .or_else(|| resource.strip_suffix(".jsx"))
            .unwrap_or(&resource);
        let stripped = upath::normalize(Path::new(stripped));

        let base_url = self.options.dojo_require().base_url();
        if upath::resolve(base_url, part) != stripped {
            return None;
        }
        let relative = upath::display_slash(&upath::relative(base_url, &stripped));
        relative.contains('/').then_some(relative)
    }
}

impl Plugin for DojoAmdPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn enforce(&self) -> PluginEnforce {
        // module ids must be rewritten before anything else sees the request
        PluginEnforce::Pre
    }

    fn run(&mut self, _compiler: &Compiler) -> HookResult<()> {
        debug!("Resetting module identities for run");
        self.reset_for_run();
        Ok(())
    }

    fn watch_run(&mut self, _compiler: &Compiler) -> HookResult<()> {
        debug!("Resetting module identities for watch run");
        self.reset_for_run();
        Ok(())
    }

    fn before_resolve(&mut self, data: &mut ResolveData, cx: &ResolveContext<'_>) -> HookResult<()> {
        let global = data
            .dependencies
            .first()
            .is_some_and(|dep| dep.using_global_require);
        if global && data.request.starts_with('.') {
            // Dojo resolves relative ids passed to the global require against the page
            let global_path = self.options.global_context(cx.compiler);
            let resolved = upath::resolve(&global_path, &data.request);
            let relative = upath::display_slash(&upath::relative(&global_path, &resolved));
            data.request = resolved.to_string_lossy().into_owned();
            if !relative.is_empty() && mid::is_abs_mid_request(&relative) {
                data.absmids
                    .add(&format!("./{relative}"), true)
                    .map_err(hook_error("before_resolve"))?;
            }
        }
        self.add_abs_mids_from_request(data, &cx.compilation.graph)
            .map_err(hook_error("before_resolve"))
    }

    fn resolve(
        &mut self,
        data: &mut ResolveData,
        cx: &ResolveContext<'_>,
    ) -> HookResult<Option<ResolveOutcome>> {
        // Done here as well as in before_resolve so both the pre- and
        // post-substitution ids become aliases.
        let entry_request = data.request.clone();
        self.add_abs_mids_from_request(data, &cx.compilation.graph)
            .map_err(hook_error("resolve"))?;
        data.context_info.original_request = Some(data.request.clone());

        match cx.normal.resolve(data) {
            Ok(()) => Ok(Some(ResolveOutcome::Resolved)),
            Err(err) => {
                debug!(request = %data.request, error = %err, "Default resolution failed");
                data.request = entry_request;
                Ok(Some(ResolveOutcome::Unresolved))
            }
        }
    }

    fn after_resolve(&mut self, data: &mut ResolveData, _cx: &ResolveContext<'_>) -> HookResult<()> {
        let (Some(re), Some(tags)) = (&self.nls_bundle, self.options.locales.tags()) else {
            return Ok(());
        };
        let Some(resource) = &data.create_data.resource else {
            return Ok(());
        };
        if re.is_match(&upath::display_slash(resource)) {
            debug!(resource = %resource.display(), "Filtering NLS bundle locales");
            data.create_data.loaders.push(LoaderUse::new(
                I18N_ROOT_MODIFIER_LOADER,
                Some(format!("bundledLocales={}", tags.join("|"))),
            ));
        }
        Ok(())
    }

    fn module(
        &mut self,
        binding: ModuleBinding,
        data: &ResolveData,
        compilation: &mut Compilation,
    ) -> HookResult<ModuleBinding> {
        if self.options.is_skip_compilation(compilation) {
            return Ok(binding);
        }
        let ModuleBinding::Pending(mut module) = binding else {
            return Ok(binding);
        };

        if !data.absmids.is_empty() {
            module.absmids.init_from(data.absmids.aliases());
        }
        module.original_request = data.context_info.original_request.clone();

        let identities = self.modules.entry(compilation.name.clone()).or_default();
        if let Some(&existing) = identities.get(&module.request) {
            // The new module is discarded; its aliases live on in the existing one.
            if let Some(target) = compilation.graph.get_mut(existing) {
                for entry in module.aliases() {
                    target
                        .absmids
                        .add(&entry.name, entry.is_provisional)
                        .map_err(hook_error("module"))?;
                }
            }
            debug!(request = %module.request, id = existing, "Merged duplicate module");
            return Ok(ModuleBinding::Bound(existing));
        }

        let request = module.request.clone();
        let id = compilation.graph.add(module);
        identities.insert(request, id);
        Ok(ModuleBinding::Bound(id))
    }

    fn build_module(&mut self, compilation: &mut Compilation, id: ModuleId) -> HookResult<()> {
        if self.options.is_skip_compilation(compilation) {
            return Ok(());
        }
        let graph = &mut compilation.graph;
        let Some(module) = graph.get_mut(id) else {
            return Ok(());
        };
        // A rebuilt module must be re-detected as AMD by the parser.
        module.is_amd = false;
        if module.abs_mid().is_some() {
            return Ok(());
        }
        let Some(original) = module.original_request.clone() else {
            return Ok(());
        };
        let resource = module.resource.clone();

        let issuer_abs_mid = graph
            .issuer(id)
            .and_then(ModuleRecord::abs_mid)
            .map(str::to_string);
        let abs_mid = mid::canonicalize(
            &original,
            issuer_abs_mid.as_deref(),
            self.options.dojo_require(),
        )
        .unwrap_or(original);

        let parts: Vec<String> = abs_mid
            .split('!')
            .map(|part| {
                self.base_relative(part, &resource)
                    .unwrap_or_else(|| part.to_string())
            })
            .collect();
        if !mid::is_abs_mid(parts.iter().map(String::as_str)) {
            return Ok(());
        }
        let name = parts.join("!");
        if name.is_empty() {
            return Ok(());
        }
        if let Some(module) = graph.get_mut(id) {
            debug!(request = %module.request, absmid = %name, "absMid recovered at build");
            module
                .add_abs_mid(Some(&name), true)
                .map_err(hook_error("build_module"))?;
        }
        Ok(())
    }

    fn seal(&mut self, compilation: &mut Compilation) -> HookResult<()> {
        if self.options.is_skip_compilation(compilation) {
            return Ok(());
        }
        let mut pruned = 0usize;
        for module in compilation.graph.iter_mut() {
            let is_amd = module.is_amd;
            let before = module.absmids.len();
            // once one entry is kept, every later entry is kept too
            let mut keep = false;
            module.filter_abs_mids(|_, is_provisional| {
                keep = keep || is_amd || !is_provisional;
                keep
            });
            pruned += before - module.absmids.len();
        }
        debug!(pruned, modules = compilation.graph.len(), "Trimmed absMids");
        Ok(())
    }
}
