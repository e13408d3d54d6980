//! Typed GP - Strongly-typed genetic programming.
//!
//! This crate evolves programs built from a catalog of typed operations.
//! Every tree is type-correct by construction: a child is only ever placed
//! in a parameter slot of the type it returns, and mutation and crossover
//! only swap subtrees of equal type.
//!
//! # Architecture
//!
//! - `typing`: Canonical types, dynamic values and the operation registry
//! - `tree`: Trees, type-directed construction, structural analysis, genetic operators
//! - `search`: Objectives, tournament selection and the evolutionary loop
//! - `colony`: Pheromone-weighted child selection and failure diagnosis
//! - `schema`: Configuration and run statistics
//!
//! # Example
//!
//! ```rust,no_run
//! use typed_gp::{GpRng, TreeBuilder, TypeRegistry, schema::BuildConfig};
//!
//! let mut registry = TypeRegistry::new();
//! registry.declare_binary("add", ("Num", "Num"), "Num", |x: &i64, y: &i64| x + y);
//! registry.declare_constant("Num", 1i64);
//! registry.declare_constant("Num", 2i64);
//!
//! let builder = TreeBuilder::new(&registry, BuildConfig::default());
//! let tree = builder.build_random("Num", &mut GpRng::new(7)).unwrap();
//! let value = tree.evaluate().unwrap();
//! println!("{tree} = {}", value.get::<i64>().unwrap());
//! ```

pub mod colony;
pub mod error;
pub mod rng;
pub mod schema;
pub mod search;
pub mod tree;
pub mod typing;

// Re-export commonly used types
pub use colony::{Label, PheromoneModel, PheromoneSelection, diagnose};
pub use error::{EvalError, GpError};
pub use rng::GpRng;
pub use search::{Objective, SearchEngine, SearchResult, optimize};
pub use tree::{Node, Tree, TreeBuilder, analyze, crossover, mutate};
pub use typing::{Bindings, Operation, Type, TypeDecl, TypeRegistry, Value};
