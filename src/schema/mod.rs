//! Schema module - Configuration and statistics types for tree search.

mod config;
mod search;

pub use config::*;
pub use search::*;
