//! Error types for tree construction, evolution and evaluation.

use crate::schema::ConfigError;

/// Errors raised by the type registry, tree builder, genetic operators,
/// search loop and pheromone model.
///
/// None of these are fatal: each is scoped to the build, generation or
/// diagnosis attempt that produced it.
#[derive(Debug, thiserror::Error)]
pub enum GpError {
    /// A requested type has no satisfying operation.
    #[error("Unsatisfiable type: {0}")]
    UnsatisfiableType(String),
    /// A constraint (allow-list, pheromone filter, requirement) has no satisfying candidate.
    #[error("Unsatisfiable constraint: {0}")]
    UnsatisfiableConstraint(String),
    /// Construction retries were exhausted without producing a tree.
    #[error("Unable to construct tree after {attempts} attempts, consider raising the depth limit")]
    TreeConstruction { attempts: usize },
    /// The initial population could not be filled with requirement-satisfying trees.
    #[error("Could not meet input requirements: found only {found} of {requested} satisfying trees")]
    RequirementsUnmet { found: usize, requested: usize },
    /// A pheromone deposit was given a fitness outside [0, 1].
    #[error("Fitness {0} is outside [0, 1]")]
    InvalidFitness(f64),
    /// Diagnosis sampled every tree without observing a failure.
    #[error("Could not find any failures after {trials} trials")]
    NoFailures { trials: usize },
    /// Configuration rejected by validation.
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl GpError {
    /// True for both the type and the constraint flavour of unsatisfiability.
    ///
    /// A type error is a refinement of a constraint error, so callers that
    /// recover from one recover from both.
    pub fn is_unsatisfiable(&self) -> bool {
        matches!(
            self,
            Self::UnsatisfiableType(_) | Self::UnsatisfiableConstraint(_)
        )
    }
}

/// Errors raised while evaluating a tree.
///
/// These belong to the caller's domain. Trees and operators propagate them
/// unchanged; the search layer maps them to the worst score.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// An operation received a value of the wrong Rust type.
    #[error("Expected value of type {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    /// An operation was applied to the wrong number of arguments.
    #[error("{operation} expects {expected} arguments, got {found}")]
    Arity {
        operation: String,
        expected: usize,
        found: usize,
    },
    /// An input was read without a bound or initial value.
    #[error("Input `{0}` has no bound value")]
    UnboundInput(String),
    /// Failure raised by an operation body.
    #[error(transparent)]
    Domain(Box<dyn std::error::Error + Send + Sync>),
}

impl EvalError {
    /// Wrap a domain error raised by an operation body.
    pub fn domain<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Domain(error.into())
    }
}
