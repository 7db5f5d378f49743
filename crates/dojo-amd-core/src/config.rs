//! Plugin configuration.
//!
//! [`DojoAmdConfig`] is the serializable form, typically read from a JSON
//! file. [`DojoAmdOptions`] is the validated runtime form handed to the
//! resolution hooks; building it is where configuration errors surface.
//!
//! ## Config format
//!
//! ```json
//! {
//!   "locales": ["en", "fr"],
//!   "globalContext": "/app/web",
//!   "skipCompilations": ["html-webpack-plugin"],
//!   "loader": { "baseUrl": "/app/web/js", "packages": [{ "name": "dojo" }] }
//! }
//! ```

use crate::error::{Error, Result};
use crate::host::{Compilation, Compiler};
use crate::loader::{DojoRequire, LoaderConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Locales whose NLS bundles are kept in the build.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "LocalesRepr", into = "LocalesRepr")]
pub enum Locales {
    /// Keep every locale (`"*"`).
    #[default]
    All,
    /// Keep only the listed locale tags.
    Only(Vec<String>),
}

impl Locales {
    /// Whether the locale set is restricted (not a wildcard).
    #[must_use]
    pub fn is_restricted(&self) -> bool {
        matches!(self, Self::Only(_))
    }

    /// The restricted locale list, if any.
    #[must_use]
    pub fn tags(&self) -> Option<&[String]> {
        match self {
            Self::All => None,
            Self::Only(tags) => Some(tags),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum LocalesRepr {
    Wildcard(String),
    List(Vec<String>),
}

impl From<LocalesRepr> for Locales {
    fn from(repr: LocalesRepr) -> Self {
        match repr {
            LocalesRepr::Wildcard(_) => Self::All,
            LocalesRepr::List(tags) if tags.iter().any(|tag| tag == "*") => Self::All,
            LocalesRepr::List(tags) => Self::Only(tags),
        }
    }
}

impl From<Locales> for LocalesRepr {
    fn from(locales: Locales) -> Self {
        match locales {
            Locales::All => Self::Wildcard("*".to_string()),
            Locales::Only(tags) => Self::List(tags),
        }
    }
}

/// Serializable plugin configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DojoAmdConfig {
    pub locales: Locales,
    /// Directory relative global `require` calls resolve against.
    /// Defaults to the compiler context.
    pub global_context: Option<PathBuf>,
    /// Names of compilations the module hooks should leave alone.
    pub skip_compilations: Vec<String>,
    pub loader: LoaderConfig,
}

impl DojoAmdConfig {
    /// Parse a config from JSON text.
    pub fn from_json_str(json: &str, origin: &Path) -> Result<Self> {
        serde_json::from_str(json).map_err(|source| Error::ConfigParse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Read and parse a config file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json, path)
    }
}

type SkipFn = Arc<dyn Fn(&Compilation) -> bool + Send + Sync>;
type GlobalContextFn = Arc<dyn Fn(&Compiler) -> PathBuf + Send + Sync>;

/// Validated options consumed by the resolution hooks.
#[derive(Clone)]
pub struct DojoAmdOptions {
    pub locales: Locales,
    global_context: GlobalContextFn,
    skip_compilation: SkipFn,
    dojo_require: Arc<dyn DojoRequire>,
}

impl std::fmt::Debug for DojoAmdOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DojoAmdOptions")
            .field("locales", &self.locales)
            .field("base_url", &self.dojo_require.base_url())
            .finish_non_exhaustive()
    }
}

impl DojoAmdOptions {
    /// Validate a config and build runtime options from it.
    pub fn from_config(config: DojoAmdConfig) -> Result<Self> {
        if config.loader.base_url.as_os_str().is_empty() {
            return Err(Error::MissingOption {
                option: "loader.baseUrl",
            });
        }

        let global_context: GlobalContextFn = match config.global_context {
            Some(dir) => Arc::new(move |_: &Compiler| dir.clone()),
            None => Arc::new(|compiler: &Compiler| compiler.context.clone()),
        };
        let skipped = config.skip_compilations;
        let skip_compilation: SkipFn =
            Arc::new(move |compilation: &Compilation| skipped.contains(&compilation.name));

        Ok(Self {
            locales: config.locales,
            global_context,
            skip_compilation,
            dojo_require: Arc::new(config.loader),
        })
    }

    /// Replace the global-context lookup.
    #[must_use]
    pub fn with_global_context(
        mut self,
        f: impl Fn(&Compiler) -> PathBuf + Send + Sync + 'static,
    ) -> Self {
        self.global_context = Arc::new(f);
        self
    }

    /// Replace the skip-compilation predicate.
    #[must_use]
    pub fn with_skip_compilation(
        mut self,
        f: impl Fn(&Compilation) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.skip_compilation = Arc::new(f);
        self
    }

    /// Replace the loader used for module-id canonicalization.
    #[must_use]
    pub fn with_dojo_require(mut self, dojo_require: Arc<dyn DojoRequire>) -> Self {
        self.dojo_require = dojo_require;
        self
    }

    /// Directory relative global `require` calls resolve against.
    #[must_use]
    pub fn global_context(&self, compiler: &Compiler) -> PathBuf {
        (self.global_context)(compiler)
    }

    /// Whether the module hooks should skip `compilation`.
    #[must_use]
    pub fn is_skip_compilation(&self, compilation: &Compilation) -> bool {
        (self.skip_compilation)(compilation)
    }

    #[must_use]
    pub fn dojo_require(&self) -> &dyn DojoRequire {
        self.dojo_require.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_locales_parse() {
        let all: Locales = serde_json::from_str(r#""*""#).unwrap();
        assert_eq!(all, Locales::All);

        let wild_list: Locales = serde_json::from_str(r#"["en","*"]"#).unwrap();
        assert_eq!(wild_list, Locales::All);

        let only: Locales = serde_json::from_str(r#"["en","fr"]"#).unwrap();
        assert!(only.is_restricted());
        assert_eq!(only.tags().unwrap(), ["en".to_string(), "fr".to_string()]);
    }

    #[test]
    fn test_config_defaults() {
        let config = DojoAmdConfig::from_json_str("{}", Path::new("inline")).unwrap();
        assert_eq!(config.locales, Locales::All);
        assert!(config.global_context.is_none());
        assert!(config.skip_compilations.is_empty());
    }

    #[test]
    fn test_config_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"{"locales":["en"],"globalContext":"/web","skipCompilations":["child"],"loader":{"baseUrl":"/web/js"}}"#,
        )
        .unwrap();
        file.flush().unwrap();

        let config = DojoAmdConfig::from_path(file.path()).unwrap();
        assert_eq!(config.global_context, Some(PathBuf::from("/web")));
        assert_eq!(config.loader.base_url, PathBuf::from("/web/js"));

        let options = DojoAmdOptions::from_config(config).unwrap();
        let compiler = Compiler::new("/elsewhere");
        assert_eq!(options.global_context(&compiler), PathBuf::from("/web"));
        assert!(options.is_skip_compilation(&Compilation::new("child")));
        assert!(!options.is_skip_compilation(&Compilation::new("main")));
    }

    #[test]
    fn test_config_errors() {
        let err = DojoAmdConfig::from_path(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));

        let err = DojoAmdConfig::from_json_str("{not json", Path::new("inline")).unwrap_err();
        assert!(matches!(err, Error::ConfigParse { .. }));

        let err = DojoAmdOptions::from_config(DojoAmdConfig::default()).unwrap_err();
        assert!(matches!(err, Error::MissingOption { .. }));
    }

    #[test]
    fn test_global_context_defaults_to_compiler_context() {
        let config = DojoAmdConfig {
            loader: LoaderConfig::new("/app/js"),
            ..Default::default()
        };
        let options = DojoAmdOptions::from_config(config).unwrap();
        assert_eq!(
            options.global_context(&Compiler::new("/app")),
            PathBuf::from("/app")
        );
    }
}
