//! Report renderers for analyzer results.
//!
//! - [`terminal`]: colored tables per package manager; `--verbose` adds the
//!   reference tree of every scope.
//! - [`json`]: the full result set as pretty-printed JSON.

pub mod json;
pub mod terminal;
