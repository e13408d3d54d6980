//! Typing module - Canonical types, values and the operation registry.

mod registry;
mod types;
mod value;

pub use registry::*;
pub use types::*;
pub use value::*;
