//! Tree module - Program trees, their construction and genetic operators.
//!
//! Trees are built for a requested return type by [`TreeBuilder`], which
//! only ever places a child whose return type matches the parent's declared
//! parameter. [`mutate`] and [`crossover`] keep that invariant by replacing
//! a subtree with one of the same type, located through [`analyze`].

mod analysis;
mod builder;
mod node;
mod operators;

pub use analysis::*;
pub use builder::*;
pub use node::*;
pub use operators::*;
