//! Dependency emission for AMD `require`/`define` calls.
//!
//! The JavaScript parser evaluates a call's arguments into [`Param`]s and hands
//! them to a [`DependencyEmitter`] configured for the call's verb. The emitter
//! turns them into [`Dependency`] records on the [`ParserState`] of the module
//! being parsed.

use crate::dependencies::{
    ArrayDependency, ArrayElement, ConstDependency, Dependency, ItemDependency, LocalModule,
    LocalModuleDependency, Span, DYNAMIC_TRAILER, MODULE_TOKEN, REQUIRE_TOKEN,
};
use crate::host::ModuleId;
use rustc_hash::FxHashMap as HashMap;

/// Names bound to the loader's own objects rather than to modules.
const RESERVED: [&str; 3] = ["require", "module", "exports"];

/// The AMD call being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Require,
    Define,
}

impl Verb {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Require => "require",
            Self::Define => "define",
        }
    }
}

/// An evaluated call argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Param {
    /// A string literal.
    String { value: String, range: Span },
    /// An array literal whose items are not all constant.
    Array { items: Vec<Param>, range: Span },
    /// An array literal of string constants.
    ConstArray { values: Vec<String>, range: Span },
    /// Anything else; only known at runtime.
    Expression { range: Span },
}

impl Param {
    #[must_use]
    pub fn string(value: impl Into<String>, range: Span) -> Self {
        Self::String {
            value: value.into(),
            range,
        }
    }

    #[must_use]
    pub fn range(&self) -> Span {
        match self {
            Self::String { range, .. }
            | Self::Array { range, .. }
            | Self::ConstArray { range, .. }
            | Self::Expression { range } => *range,
        }
    }

    fn is_array_like(&self) -> bool {
        matches!(self, Self::Array { .. } | Self::ConstArray { .. })
    }
}

/// A call expression with an identifier callee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallExpr {
    /// Callee identifier as written (`require`, `req`, `define`, ...).
    pub callee: String,
    pub span: Span,
}

impl CallExpr {
    #[must_use]
    pub fn new(callee: impl Into<String>, span: Span) -> Self {
        Self {
            callee: callee.into(),
            span,
        }
    }
}

/// Lexical scope facts at the call site.
#[derive(Debug, Clone, Default)]
pub struct ParserScope {
    /// The call is inside a `try` block.
    pub in_try: bool,
    /// Local identifiers known to alias a free variable (`req` -> `require`).
    pub renames: HashMap<String, String>,
}

impl ParserScope {
    /// Record that `local` refers to `target`.
    pub fn rename(&mut self, local: &str, target: &str) {
        self.renames.insert(local.to_string(), target.to_string());
    }

    fn renamed(&self, name: &str) -> Option<&str> {
        self.renames.get(name).map(String::as_str)
    }
}

/// Per-module parser state the emitter writes into.
#[derive(Debug, Clone)]
pub struct ParserState {
    /// The module being parsed.
    pub module: ModuleId,
    pub scope: ParserScope,
    pub local_modules: Vec<LocalModule>,
    pub dependencies: Vec<Dependency>,
}

impl ParserState {
    #[must_use]
    pub fn new(module: ModuleId) -> Self {
        Self {
            module,
            scope: ParserScope::default(),
            local_modules: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    /// Register a named `define` in this file.
    pub fn add_local_module(&mut self, name: &str) -> LocalModule {
        let module = LocalModule {
            name: name.to_string(),
            idx: self.local_modules.len(),
        };
        self.local_modules.push(module.clone());
        module
    }

    /// Find a local module, resolving `./` names against `named_module`.
    #[must_use]
    pub fn local_module(&self, name: &str, named_module: Option<&str>) -> Option<&LocalModule> {
        let name = match named_module {
            Some(parent) => lookup_relative(parent, name),
            None => name.to_string(),
        };
        self.local_modules.iter().find(|m| m.name == name)
    }

    pub fn add_dependency(&mut self, dep: Dependency) {
        self.dependencies.push(dep);
    }

    /// Item dependencies in emission order.
    pub fn items(&self) -> impl Iterator<Item = &ItemDependency> {
        self.dependencies.iter().filter_map(Dependency::as_item)
    }
}

fn lookup_relative(parent: &str, name: &str) -> String {
    if !name.starts_with('.') {
        return name.to_string();
    }
    let mut path: Vec<&str> = parent.split('/').collect();
    path.pop();
    for seg in name.split('/') {
        match seg {
            ".." => {
                path.pop();
            }
            "." => {}
            other => path.push(other),
        }
    }
    path.join("/")
}

/// Identifier slots bound to reserved names, by argument position.
pub type Identifiers = Vec<Option<String>>;

fn bind_identifier(identifiers: &mut Option<&mut Identifiers>, idx: usize, name: &str) {
    if let Some(identifiers) = identifiers.as_deref_mut() {
        if identifiers.len() <= idx {
            identifiers.resize(idx + 1, None);
        }
        identifiers[idx] = Some(name.to_string());
    }
}

/// Emits dependency records for one verb.
#[derive(Debug, Clone, Copy)]
pub struct DependencyEmitter {
    verb: Verb,
}

impl DependencyEmitter {
    #[must_use]
    pub fn new(verb: Verb) -> Self {
        Self { verb }
    }

    #[must_use]
    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// Whether this call goes to the page-level `require` rather than a
    /// module-local one.
    fn uses_global_require(&self, state: &ParserState, expr: &CallExpr) -> bool {
        self.verb == Verb::Require && state.scope.renamed(&expr.callee) != Some("require")
    }

    fn item_dependency(
        &self,
        state: &ParserState,
        expr: &CallExpr,
        request: &str,
        range: Option<Span>,
    ) -> ItemDependency {
        ItemDependency {
            request: request.to_string(),
            range,
            loc: expr.span,
            optional: state.scope.in_try,
            using_global_require: self.uses_global_require(state, expr),
            issuer: Some(state.module),
        }
    }

    /// Emit dependencies for a dependency-array argument.
    ///
    /// Returns `false` when `param` is not an array, leaving the call to the
    /// caller's fallback.
    pub fn add_array_dependency(
        &self,
        state: &mut ParserState,
        expr: &CallExpr,
        param: &Param,
        mut identifiers: Option<&mut Identifiers>,
        named_module: Option<&str>,
    ) -> bool {
        match param {
            Param::Array { items, .. } => {
                for (idx, item) in items.iter().enumerate() {
                    if let Param::String { value, .. } = item {
                        if RESERVED.contains(&value.as_str()) {
                            bind_identifier(&mut identifiers, idx, value);
                        }
                    }
                    self.add_item_dependency(state, expr, item, named_module);
                }
                true
            }
            Param::ConstArray { values, range } => {
                let mut elements = Vec::with_capacity(values.len());
                for (idx, request) in values.iter().enumerate() {
                    let element = match request.as_str() {
                        "require" => {
                            bind_identifier(&mut identifiers, idx, request);
                            ArrayElement::Token(REQUIRE_TOKEN.to_string())
                        }
                        "module" => {
                            bind_identifier(&mut identifiers, idx, request);
                            ArrayElement::Token(MODULE_TOKEN.to_string())
                        }
                        "exports" => {
                            bind_identifier(&mut identifiers, idx, request);
                            ArrayElement::Token(request.clone())
                        }
                        _ => {
                            if let Some(local) = state.local_module(request, None).cloned() {
                                let dep = LocalModuleDependency {
                                    module: local,
                                    range: None,
                                    loc: expr.span,
                                    optional: false,
                                };
                                state.add_dependency(Dependency::LocalModule(dep.clone()));
                                ArrayElement::LocalModule(dep)
                            } else {
                                let dep = self.item_dependency(state, expr, request, None);
                                state.add_dependency(Dependency::Item(dep.clone()));
                                ArrayElement::Item(dep)
                            }
                        }
                    };
                    elements.push(element);
                }
                state.add_dependency(Dependency::Array(ArrayDependency {
                    elements,
                    range: *range,
                    loc: expr.span,
                    optional: state.scope.in_try,
                }));
                true
            }
            Param::String { .. } | Param::Expression { .. } => false,
        }
    }

    /// Emit dependencies for a single module-id argument.
    ///
    /// Dynamic arguments are wrapped in a runtime require call so the id can be
    /// resolved when it becomes known.
    pub fn add_item_dependency(
        &self,
        state: &mut ParserState,
        expr: &CallExpr,
        param: &Param,
        named_module: Option<&str>,
    ) -> bool {
        let optional = state.scope.in_try;
        if let Param::String { value, range } = param {
            let dep = match value.as_str() {
                "require" => Dependency::Const(ConstDependency::new(REQUIRE_TOKEN, *range)),
                "module" => Dependency::Const(ConstDependency::new(MODULE_TOKEN, *range)),
                "exports" => Dependency::Const(ConstDependency::new(value.clone(), *range)),
                _ => match state.local_module(value, named_module).cloned() {
                    Some(local) => Dependency::LocalModule(LocalModuleDependency {
                        module: local,
                        range: Some(*range),
                        loc: expr.span,
                        optional,
                    }),
                    None => Dependency::Item(self.item_dependency(
                        state,
                        expr,
                        value,
                        Some(*range),
                    )),
                },
            };
            let dep = match dep {
                Dependency::Const(mut c) => {
                    c.loc = expr.span;
                    c.optional = optional;
                    Dependency::Const(c)
                }
                other => other,
            };
            state.add_dependency(dep);
        } else {
            let range = param.range();
            let callee = match self.verb {
                Verb::Define => REQUIRE_TOKEN,
                Verb::Require => expr.callee.as_str(),
            };
            let mut open = ConstDependency::new(format!("{callee}("), Span::at(range.start));
            open.loc = Span::at(expr.span.start);
            open.optional = optional;
            let mut close = ConstDependency::new(DYNAMIC_TRAILER, Span::at(range.end));
            close.loc = Span::at(expr.span.end);
            close.optional = optional;
            state.add_dependency(Dependency::Const(open));
            state.add_dependency(Dependency::Const(close));
        }
        true
    }
}

/// Routes whole `require(...)`/`define(...)` calls to the emitter.
#[derive(Debug, Clone, Copy)]
pub struct RequireCallHandler {
    emitter: DependencyEmitter,
}

impl RequireCallHandler {
    #[must_use]
    pub fn new(verb: Verb) -> Self {
        Self {
            emitter: DependencyEmitter::new(verb),
        }
    }

    /// Process a call and return the identifier bindings for the callback's
    /// parameters, or `None` if the call shape is not AMD.
    ///
    /// Handled shapes:
    /// - `require(deps)`, `require(deps, callback[, errback])`, `require(id)`
    /// - `define([name,] deps, factory)`, `define([name,] deps)`
    pub fn process_call(
        &self,
        state: &mut ParserState,
        expr: &CallExpr,
        args: &[Param],
    ) -> Option<Identifiers> {
        let mut identifiers = Identifiers::new();
        let handled = match self.emitter.verb() {
            Verb::Require => match args {
                [single] if !single.is_array_like() => {
                    self.emitter.add_item_dependency(state, expr, single, None)
                }
                [deps, ..] => {
                    self.emitter
                        .add_array_dependency(state, expr, deps, Some(&mut identifiers), None)
                }
                [] => false,
            },
            Verb::Define => {
                let (named, rest) = match args {
                    [Param::String { value, .. }, rest @ ..] if !rest.is_empty() => {
                        (Some(value.as_str()), rest)
                    }
                    _ => (None, args),
                };
                let handled = match rest {
                    [deps, ..] if deps.is_array_like() => self.emitter.add_array_dependency(
                        state,
                        expr,
                        deps,
                        Some(&mut identifiers),
                        named,
                    ),
                    _ => false,
                };
                if let Some(name) = named {
                    state.add_local_module(name);
                }
                handled
            }
        };
        handled.then_some(identifiers)
    }
}
