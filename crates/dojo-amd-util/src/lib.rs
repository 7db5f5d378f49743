#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Path helpers shared by the dojo-amd crates.
//!
//! Everything here is lexical: no filesystem access and no logging.

pub mod path;
