//! Dependency records produced from `require`/`define` calls.
//!
//! These are what the bundler turns into module edges (item dependencies) and
//! source rewrites (constant replacements, rendered dependency arrays).

use crate::host::ModuleId;

/// Runtime call returning a context-aware `require` for the current module.
pub const REQUIRE_TOKEN: &str = "__webpack_require__.dj.c(module.i)";

/// Runtime call returning the current module object.
pub const MODULE_TOKEN: &str = "__webpack_require__.dj.m(module)";

/// Trailer closing a dynamically wrapped require call.
pub const DYNAMIC_TRAILER: &str = ",null,false)";

/// Byte range in the module source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    #[must_use]
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Zero-width span at `pos`.
    #[must_use]
    pub fn at(pos: u32) -> Self {
        Self::new(pos, pos)
    }
}

/// A reference to another module by request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDependency {
    pub request: String,
    /// Source range of the string literal, for single-item forms.
    pub range: Option<Span>,
    /// Range of the enclosing call expression.
    pub loc: Span,
    /// Set when the call sits inside a `try` block.
    pub optional: bool,
    /// Set for `require` calls that reach the global (page-level) require.
    pub using_global_require: bool,
    /// Module whose source contains the call.
    pub issuer: Option<ModuleId>,
}

impl ItemDependency {
    #[must_use]
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            range: None,
            loc: Span::default(),
            optional: false,
            using_global_require: false,
            issuer: None,
        }
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: ModuleId) -> Self {
        self.issuer = Some(issuer);
        self
    }

    #[must_use]
    pub fn using_global_require(mut self, global: bool) -> Self {
        self.using_global_require = global;
        self
    }
}

/// A module defined by a named `define` in the same file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalModule {
    pub name: String,
    pub idx: usize,
}

impl LocalModule {
    /// Variable holding the local module's exports in the output.
    #[must_use]
    pub fn variable_name(&self) -> String {
        format!("__WEBPACK_LOCAL_MODULE_{}__", self.idx)
    }
}

/// A reference to a local module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalModuleDependency {
    pub module: LocalModule,
    pub range: Option<Span>,
    pub loc: Span,
    pub optional: bool,
}

/// Replace a source range with fixed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstDependency {
    pub replacement: String,
    pub range: Span,
    pub loc: Span,
    pub optional: bool,
}

impl ConstDependency {
    #[must_use]
    pub fn new(replacement: impl Into<String>, range: Span) -> Self {
        Self {
            replacement: replacement.into(),
            range,
            loc: range,
            optional: false,
        }
    }
}

/// One slot of a dependency array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayElement {
    /// Runtime expression inserted verbatim.
    Token(String),
    Item(ItemDependency),
    LocalModule(LocalModuleDependency),
}

/// A dependency array literal, rewritten as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayDependency {
    pub elements: Vec<ArrayElement>,
    pub range: Span,
    pub loc: Span,
    pub optional: bool,
}

impl ArrayDependency {
    /// Render the array using `module_id` to look up built module ids.
    pub fn render<F>(&self, mut module_id: F) -> String
    where
        F: FnMut(&ItemDependency) -> Option<String>,
    {
        let parts: Vec<String> = self
            .elements
            .iter()
            .map(|element| match element {
                ArrayElement::Token(token) => token.clone(),
                ArrayElement::LocalModule(dep) => dep.module.variable_name(),
                ArrayElement::Item(dep) => match module_id(dep) {
                    Some(id) => format!("__webpack_require__({id})"),
                    None => missing_module(&dep.request),
                },
            })
            .collect();
        format!("[{}]", parts.join(", "))
    }
}

/// Any dependency record a call can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dependency {
    Item(ItemDependency),
    Array(ArrayDependency),
    LocalModule(LocalModuleDependency),
    Const(ConstDependency),
}

impl Dependency {
    #[must_use]
    pub fn as_item(&self) -> Option<&ItemDependency> {
        match self {
            Self::Item(dep) => Some(dep),
            _ => None,
        }
    }
}

fn missing_module(request: &str) -> String {
    format!(
        "!(function webpackMissingModule() {{ var e = new Error(\"Cannot find module '{request}'\"); e.code = 'MODULE_NOT_FOUND'; throw e; }}())"
    )
}

/// Apply constant replacements to `source`.
///
/// Replacements are applied in range order; zero-width insertions at the same
/// position keep the order they were emitted in. Overlapping or out-of-bounds
/// ranges are skipped.
#[must_use]
pub fn apply_replacements(source: &str, deps: &[Dependency]) -> String {
    let mut consts: Vec<&ConstDependency> = deps
        .iter()
        .filter_map(|dep| match dep {
            Dependency::Const(c) => Some(c),
            _ => None,
        })
        .collect();
    // stable: equal starts keep emission order
    consts.sort_by_key(|c| (c.range.start, c.range.end));

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0usize;
    for dep in consts {
        let start = dep.range.start as usize;
        let end = dep.range.end as usize;
        if start < cursor || end < start {
            continue;
        }
        let Some(before) = source.get(cursor..start) else {
            continue;
        };
        if source.get(start..end).is_none() {
            continue;
        }
        out.push_str(before);
        out.push_str(&dep.replacement);
        cursor = end;
    }
    out.push_str(source.get(cursor..).unwrap_or_default());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_replacements_insertions_keep_order() {
        let source = "require(name);";
        // `name` spans 8..12
        let deps = vec![
            Dependency::Const(ConstDependency::new("require(", Span::at(8))),
            Dependency::Const(ConstDependency::new(DYNAMIC_TRAILER, Span::at(12))),
        ];
        assert_eq!(
            apply_replacements(source, &deps),
            "require(require(name,null,false));"
        );
    }

    #[test]
    fn test_apply_replacements_replaces_ranges() {
        let source = r#"define("module", f)"#;
        let deps = vec![Dependency::Const(ConstDependency::new(
            MODULE_TOKEN,
            Span::new(7, 15),
        ))];
        assert_eq!(
            apply_replacements(source, &deps),
            "define(__webpack_require__.dj.m(module), f)"
        );
    }

    #[test]
    fn test_apply_replacements_skips_bad_ranges() {
        let source = "abc";
        let deps = vec![
            Dependency::Const(ConstDependency::new("X", Span::new(1, 2))),
            Dependency::Const(ConstDependency::new("Y", Span::new(1, 3))),
            Dependency::Const(ConstDependency::new("Z", Span::new(2, 40))),
        ];
        assert_eq!(apply_replacements(source, &deps), "aXc");
    }

    #[test]
    fn test_render_array() {
        let array = ArrayDependency {
            elements: vec![
                ArrayElement::Token(REQUIRE_TOKEN.to_string()),
                ArrayElement::Token("exports".to_string()),
                ArrayElement::LocalModule(LocalModuleDependency {
                    module: LocalModule {
                        name: "local".to_string(),
                        idx: 0,
                    },
                    range: None,
                    loc: Span::default(),
                    optional: false,
                }),
                ArrayElement::Item(ItemDependency::new("dojo/on")),
                ArrayElement::Item(ItemDependency::new("missing")),
            ],
            range: Span::new(0, 10),
            loc: Span::default(),
            optional: false,
        };
        let rendered = array.render(|dep| (dep.request == "dojo/on").then(|| "7".to_string()));
        assert!(rendered.starts_with(
            "[__webpack_require__.dj.c(module.i), exports, __WEBPACK_LOCAL_MODULE_0__, __webpack_require__(7), "
        ));
        assert!(rendered.contains("Cannot find module 'missing'"));
    }
}
