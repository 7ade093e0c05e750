//! Typed intermediate representation of a bitcode module.
//!
//! The semantic decoder in [`builder`] walks the generic block tree produced
//! by [`crate::bitstream`] and fills a [`Module`]: type table, module-level
//! values, global variables, declared functions and decoded function bodies.

pub mod codes;
mod types;
pub use types::*;

pub mod values;
pub use values::{Backpatch, UnresolvedValue, ValueTable};

pub mod builder;
pub use builder::decode_module;
