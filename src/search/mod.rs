//! Search module - Objectives, tournament selection and the evolutionary loop.
//!
//! # Example
//!
//! ```rust,no_run
//! use typed_gp::schema::SearchConfig;
//! use typed_gp::search::{Objective, optimize};
//! use typed_gp::typing::TypeRegistry;
//!
//! let mut registry = TypeRegistry::new();
//! registry.declare_binary("add", ("Num", "Num"), "Num", |x: &i64, y: &i64| x + y);
//! registry.declare_binary("sub", ("Num", "Num"), "Num", |x: &i64, y: &i64| x - y);
//! registry.declare_constant("Num", 1i64);
//!
//! let objective = Objective::from_value("Num", |v| {
//!     v.get::<i64>().map_or(f64::NEG_INFINITY, |x| -((*x - 7).abs() as f64))
//! })
//! .with_max_score(0.0);
//!
//! let result = optimize(&registry, objective, SearchConfig::default()).unwrap();
//! println!("{} scored {}", result.best, result.best_score);
//! ```

mod engine;
mod objective;
mod selection;

pub use engine::*;
pub use objective::*;
pub use selection::*;
