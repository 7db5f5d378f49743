#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

//! Dojo AMD support for a JavaScript bundler.
//!
//! Tracks the absolute module ids (absMids) each module can be reached by at
//! runtime, and turns `require`/`define` calls into bundler dependencies.

pub mod absmid;
pub mod config;
pub mod dependencies;
pub mod error;
pub mod factory;
pub mod hooks;
pub mod host;
pub mod loader;
pub mod mid;
pub mod parser;
pub mod plugins;
pub mod resolve;

pub use absmid::{AbsMids, AliasEntry};
pub use config::{DojoAmdConfig, DojoAmdOptions, Locales};
pub use error::{Error, Result};
pub use factory::{AmdCall, ModuleFactory};
pub use hooks::{HookError, HookResult, Plugin, PluginContainer};
pub use host::{Compilation, Compiler, ModuleGraph, ModuleId, ModuleRecord, ResolveData};
pub use loader::{DojoRequire, LoaderConfig};
pub use plugins::DojoAmdPlugin;
pub use resolve::{FsResolver, NormalResolver, ResolveError};
