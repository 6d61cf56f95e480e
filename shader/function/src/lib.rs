//! Shader functions traced from Rust closures and compiled to a single WGSL
//! module.
//!
//! A [`ShaderFn`] records its body once per [`TraceContext`] through a
//! [`FnBuilder`]. [`resolve`] walks everything reachable from a set of entry
//! points, names every declaration once and emits the module text.

mod binding;
mod builder;
mod builtin;
mod code_builder;
mod error;
mod func;
mod host;
mod ir;
mod naming;
mod resolve;
mod trace;
mod wgsl;

use std::{fmt, sync::Arc};

pub use binding::*;
pub use builder::*;
pub use builtin::*;
pub use code_builder::*;
pub use error::*;
use fast_hash_collection::*;
pub use func::*;
pub use host::*;
pub use ir::*;
pub use naming::*;
pub use resolve::*;
use smallvec::SmallVec;
pub use trace::*;
pub use typeshade_data::*;
pub use wgsl::*;

#[cfg(test)]
mod test;
