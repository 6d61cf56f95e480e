//! GPU data description for WGSL targets.
//!
//! This crate contains the type descriptors (what a piece of GPU data looks
//! like), the layout engine that maps a descriptor to the exact WGSL memory
//! layout, and the codec that moves host values in and out of packed byte
//! buffers using that layout.

mod codec;
mod error;
mod ident;
mod layout;
mod registry;
mod ty;
mod value;

use std::{fmt, ops::Range, sync::Arc};

pub use codec::*;
pub use error::*;
use fast_hash_collection::*;
pub use ident::*;
pub use layout::*;
pub use registry::*;
use smallvec::SmallVec;
pub use ty::*;
pub use value::*;

#[cfg(test)]
mod test;
