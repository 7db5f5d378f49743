//! Built-in plugins.

mod dojo_amd;

pub use dojo_amd::{DojoAmdPlugin, I18N_ROOT_MODIFIER_LOADER};
