//! Scoring functions and the requirements they place on trees.

use std::fmt;
use std::sync::Arc;

use crate::tree::Tree;
use crate::typing::{Bindings, Operation, Type, TypeDecl, Value};

/// Score assigned to trees that fail to evaluate or miss a requirement.
pub const FAILED_SCORE: f64 = f64::NEG_INFINITY;

type ScoreFn = Arc<dyn Fn(&Tree) -> f64 + Send + Sync>;

/// What a search maximizes.
///
/// Couples the return type trees are built for with a scoring function,
/// required inputs and an optional maximum achievable score.
#[derive(Clone)]
pub struct Objective {
    target: Type,
    score: ScoreFn,
    required: Vec<Operation>,
    max_score: Option<f64>,
}

impl Objective {
    /// Score whole trees; the function controls evaluation and bindings.
    pub fn from_tree<F>(target: impl Into<TypeDecl>, score: F) -> Self
    where
        F: Fn(&Tree) -> f64 + Send + Sync + 'static,
    {
        Self {
            target: Into::<TypeDecl>::into(target).canonicalize(),
            score: Arc::new(score),
            required: Vec::new(),
            max_score: None,
        }
    }

    /// Score the evaluated value of a tree. Evaluation errors score [`FAILED_SCORE`].
    pub fn from_value<F>(target: impl Into<TypeDecl>, score: F) -> Self
    where
        F: Fn(&Value) -> f64 + Send + Sync + 'static,
    {
        Self::from_value_with(target, Bindings::default(), score)
    }

    /// Like [`Objective::from_value`], evaluating with fixed input bindings.
    pub fn from_value_with<F>(target: impl Into<TypeDecl>, bindings: Bindings, score: F) -> Self
    where
        F: Fn(&Value) -> f64 + Send + Sync + 'static,
    {
        Self::from_tree(target, move |tree: &Tree| match tree.evaluate_with(&bindings) {
            Ok(value) => score(&value),
            Err(_) => FAILED_SCORE,
        })
    }

    /// Trees not containing `input` score [`FAILED_SCORE`], and
    /// requirement-satisfying builds only return trees containing it.
    pub fn require(mut self, input: &Operation) -> Self {
        self.required.push(input.clone());
        self
    }

    /// Declare the best achievable score; reaching it stops a search early.
    pub fn with_max_score(mut self, max_score: f64) -> Self {
        self.max_score = Some(max_score);
        self
    }

    /// Negate the score, turning a cost into something to maximize.
    ///
    /// A declared maximum is kept as is and refers to the negated score.
    pub fn minimize(self) -> Self {
        let inner = self.score;
        Self {
            score: Arc::new(move |tree: &Tree| -inner(tree)),
            ..self
        }
    }

    /// Return type of the trees being scored.
    pub fn target(&self) -> &Type {
        &self.target
    }

    /// Inputs every scored tree must contain.
    pub fn required_inputs(&self) -> &[Operation] {
        &self.required
    }

    /// Declared best achievable score.
    pub fn max_score(&self) -> Option<f64> {
        self.max_score
    }

    /// True if `tree` contains every required input.
    pub fn satisfies_requirements(&self, tree: &Tree) -> bool {
        self.required.iter().all(|input| tree.contains(input))
    }

    /// True once `score` reaches the declared maximum.
    pub fn is_target_reached(&self, score: f64) -> bool {
        self.max_score.is_some_and(|max| score >= max)
    }

    /// Score a tree. Unmet requirements and NaN map to [`FAILED_SCORE`].
    pub fn score(&self, tree: &Tree) -> f64 {
        if !self.satisfies_requirements(tree) {
            return FAILED_SCORE;
        }
        let score = (self.score)(tree);
        if score.is_nan() { FAILED_SCORE } else { score }
    }
}

impl fmt::Debug for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Objective")
            .field("target", &self.target)
            .field("required", &self.required)
            .field("max_score", &self.max_score)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::tree::Node;
    use crate::typing::TypeRegistry;

    #[test]
    fn test_value_objective_maps_errors_to_failure() {
        let mut registry = TypeRegistry::new();
        let x = registry.declare_input("x", "Num", None);
        let one = registry.declare_constant("Num", 1i64);
        let boom = registry.declare("boom", Vec::<&str>::new(), "Num", |_| {
            Err(EvalError::domain("boom"))
        });

        let objective = Objective::from_value("Num", |v| *v.get::<i64>().unwrap() as f64);
        assert_eq!(objective.score(&Tree::new(Node::leaf(one).unwrap())), 1.0);
        assert_eq!(objective.score(&Tree::new(Node::leaf(boom).unwrap())), FAILED_SCORE);
        assert_eq!(objective.score(&Tree::new(Node::leaf(x.clone()).unwrap())), FAILED_SCORE);

        let bound = Objective::from_value_with("Num", Bindings::new().bind("x", 4i64), |v| {
            *v.get::<i64>().unwrap() as f64
        });
        assert_eq!(bound.score(&Tree::new(Node::leaf(x).unwrap())), 4.0);
    }

    #[test]
    fn test_requirements() {
        let mut registry = TypeRegistry::new();
        let x = registry.declare_input("x", "Num", Some(Value::new(2i64)));
        let one = registry.declare_constant("Num", 1i64);
        let objective = Objective::from_value("Num", |_| 1.0).require(&x);

        assert_eq!(objective.target(), &Type::named("Num"));
        assert_eq!(objective.required_inputs(), &[x.clone()]);
        assert_eq!(objective.score(&Tree::new(Node::leaf(one).unwrap())), FAILED_SCORE);
        assert_eq!(objective.score(&Tree::new(Node::leaf(x).unwrap())), 1.0);
    }

    #[test]
    fn test_minimize_and_max_score() {
        let mut registry = TypeRegistry::new();
        let three = registry.declare_constant("Num", 3i64);
        let objective = Objective::from_value("Num", |v| *v.get::<i64>().unwrap() as f64)
            .minimize()
            .with_max_score(0.0);
        assert_eq!(objective.score(&Tree::new(Node::leaf(three).unwrap())), -3.0);
        assert!(objective.is_target_reached(0.0));
        assert!(!objective.is_target_reached(-3.0));
        assert!(!Objective::from_value("Num", |_| 0.0).is_target_reached(1e9));
    }

    #[test]
    fn test_nan_is_failure() {
        let mut registry = TypeRegistry::new();
        let one = registry.declare_constant("Num", 1i64);
        let objective = Objective::from_tree("Num", |_| f64::NAN);
        assert_eq!(objective.score(&Tree::new(Node::leaf(one).unwrap())), FAILED_SCORE);
    }
}
