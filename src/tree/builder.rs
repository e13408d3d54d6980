//! Type-directed random tree construction.

use crate::error::GpError;
use crate::rng::GpRng;
use crate::schema::BuildConfig;
use crate::typing::{Operation, OperationSet, Type, TypeDecl, TypeRegistry};

use super::node::{Node, Tree};

/// Policy choosing one child operation per parameter of `parent`.
///
/// `candidates[i]` lists the operations allowed for parameter `i`; the
/// returned vector must hold one member of each list, in order.
pub trait SelectionStrategy {
    fn select(
        &mut self,
        parent: &Operation,
        candidates: &[Vec<Operation>],
        rng: &mut GpRng,
    ) -> Result<Vec<Operation>, GpError>;
}

/// Picks each child uniformly at random, independently per parameter.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformSelection;

impl SelectionStrategy for UniformSelection {
    fn select(
        &mut self,
        parent: &Operation,
        candidates: &[Vec<Operation>],
        rng: &mut GpRng,
    ) -> Result<Vec<Operation>, GpError> {
        candidates
            .iter()
            .map(|options| {
                if options.is_empty() {
                    return Err(GpError::UnsatisfiableType(format!(
                        "{parent} has a parameter that cannot be satisfied"
                    )));
                }
                Ok(options[rng.index(options.len())].clone())
            })
            .collect()
    }
}

/// Outcome of a failed attempt.
enum Abort {
    /// The depth limit was hit; a fresh attempt may succeed.
    Depth,
    /// Failures that retrying cannot fix.
    Fatal(GpError),
}

impl From<GpError> for Abort {
    fn from(error: GpError) -> Self {
        Self::Fatal(error)
    }
}

/// Builds trees for a requested return type from a registry.
#[derive(Debug, Clone, Copy)]
pub struct TreeBuilder<'r> {
    registry: &'r TypeRegistry,
    config: BuildConfig,
}

impl<'r> TreeBuilder<'r> {
    /// Create a builder over `registry`.
    pub fn new(registry: &'r TypeRegistry, config: BuildConfig) -> Self {
        Self { registry, config }
    }

    /// The registry operations are drawn from.
    pub fn registry(&self) -> &'r TypeRegistry {
        self.registry
    }

    /// Construction limits.
    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    /// Build with uniform child selection and no restriction.
    pub fn build_random(
        &self,
        return_type: impl Into<TypeDecl>,
        rng: &mut GpRng,
    ) -> Result<Tree, GpError> {
        self.build(return_type, None, &mut UniformSelection, rng)
    }

    /// Build a tree returning `return_type`.
    ///
    /// The root is drawn uniformly from the candidates; children are chosen
    /// by `strategy`. An attempt that exceeds the depth limit is abandoned
    /// and construction restarts from the root, up to `max_attempts` times.
    pub fn build(
        &self,
        return_type: impl Into<TypeDecl>,
        allowed: Option<&OperationSet>,
        strategy: &mut dyn SelectionStrategy,
        rng: &mut GpRng,
    ) -> Result<Tree, GpError> {
        let return_type = Into::<TypeDecl>::into(return_type).canonicalize();
        let roots = self.candidates(&return_type, allowed)?;
        if roots.is_empty() {
            return Err(GpError::UnsatisfiableType(format!(
                "No operations return {return_type}"
            )));
        }

        for attempt in 0..self.config.max_attempts {
            let root = roots[rng.index(roots.len())].clone();
            match self.grow(root, 1, allowed, strategy, rng) {
                Ok(node) => {
                    if attempt > 0 {
                        log::debug!("Built {return_type} after {} attempts", attempt + 1);
                    }
                    return Ok(Tree::new(node));
                }
                Err(Abort::Depth) => {
                    log::trace!("Attempt {} exceeded depth {}", attempt + 1, self.config.max_depth);
                }
                Err(Abort::Fatal(error)) => return Err(error),
            }
        }

        Err(GpError::TreeConstruction {
            attempts: self.config.max_attempts,
        })
    }

    fn candidates(
        &self,
        ty: &Type,
        allowed: Option<&OperationSet>,
    ) -> Result<Vec<Operation>, GpError> {
        self.registry.lookup(ty, allowed)
    }

    fn grow(
        &self,
        operation: Operation,
        depth: usize,
        allowed: Option<&OperationSet>,
        strategy: &mut dyn SelectionStrategy,
        rng: &mut GpRng,
    ) -> Result<Node, Abort> {
        if depth > self.config.max_depth {
            return Err(Abort::Depth);
        }
        if operation.is_leaf() {
            return Ok(Node::from_parts(operation, Vec::new()));
        }

        let candidates = operation
            .params()
            .iter()
            .map(|param| {
                let options = self.candidates(param, allowed)?;
                if options.is_empty() {
                    return Err(GpError::UnsatisfiableType(format!(
                        "{operation} has a parameter that cannot be satisfied"
                    )));
                }
                Ok(options)
            })
            .collect::<Result<Vec<_>, GpError>>()?;

        let chosen = strategy.select(&operation, &candidates, rng)?;
        if chosen.len() != operation.arity()
            || chosen
                .iter()
                .zip(operation.params())
                .any(|(child, param)| child.return_type() != param)
        {
            return Err(Abort::Fatal(GpError::UnsatisfiableConstraint(format!(
                "Selection for {operation} does not match its parameters"
            ))));
        }

        let children = chosen
            .into_iter()
            .map(|child| self.grow(child, depth + 1, allowed, strategy, rng))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Node::from_parts(operation, children))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::analyze;
    use crate::typing::Value;

    fn arithmetic() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.declare_binary("add", ("Num", "Num"), "Num", |x: &i64, y: &i64| x + y);
        registry.declare_constant("Num", 1i64);
        registry.declare_constant("Num", 2i64);
        registry
    }

    fn check_types(node: &Node) {
        assert_eq!(node.children().len(), node.operation().arity());
        for (child, param) in node.children().iter().zip(node.operation().params()) {
            assert_eq!(child.return_type(), param);
            check_types(child);
        }
    }

    #[test]
    fn test_build_is_type_correct() {
        let registry = arithmetic();
        let builder = TreeBuilder::new(&registry, BuildConfig::default());
        let mut rng = GpRng::new(3);
        for _ in 0..50 {
            let tree = builder.build_random("Num", &mut rng).unwrap();
            assert_eq!(tree.return_type(), &Type::named("Num"));
            check_types(tree.root());
            let value = *tree.evaluate().unwrap().get::<i64>().unwrap();
            assert!(value >= 1);
        }
    }

    #[test]
    fn test_unknown_type_is_unsatisfiable() {
        let registry = arithmetic();
        let builder = TreeBuilder::new(&registry, BuildConfig::default());
        let err = builder.build_random("Text", &mut GpRng::new(0)).unwrap_err();
        assert!(matches!(err, GpError::UnsatisfiableType(_)));
    }

    #[test]
    fn test_allowed_restricts_operations() {
        let mut registry = TypeRegistry::new();
        let add = registry.declare_binary("add", ("Num", "Num"), "Num", |x: &i64, y: &i64| x + y);
        let one = registry.declare_constant("Num", 1i64);
        registry.declare_constant("Num", 2i64);
        let allowed: OperationSet = [add, one.clone()].into_iter().collect();

        let builder = TreeBuilder::new(&registry, BuildConfig::default());
        let mut rng = GpRng::new(5);
        for _ in 0..20 {
            let tree = builder
                .build("Num", Some(&allowed), &mut UniformSelection, &mut rng)
                .unwrap();
            let info = analyze(&tree);
            for edge in &info.graph_edges {
                assert!(edge.children.iter().all(|op| allowed.contains(op)));
            }
        }

        let only_leaf: OperationSet = [one].into_iter().collect();
        let tree = builder
            .build("Num", Some(&only_leaf), &mut UniformSelection, &mut rng)
            .unwrap();
        assert_eq!(tree.evaluate().unwrap().get::<i64>().unwrap(), &1);
    }

    #[test]
    fn test_missing_leaf_is_reported() {
        let mut registry = TypeRegistry::new();
        registry.declare("wrap", ["Inner"], "Outer", |args| Ok(args[0].clone()));
        let builder = TreeBuilder::new(&registry, BuildConfig::default());
        let err = builder.build_random("Outer", &mut GpRng::new(0)).unwrap_err();
        assert!(err.to_string().contains("cannot be satisfied"));
    }

    #[test]
    fn test_depth_exhaustion() {
        let mut registry = TypeRegistry::new();
        // Every `Num` is built from another `Num`, so no attempt terminates.
        registry.declare("succ", ["Num"], "Num", |args| {
            Ok(Value::new(args[0].get::<i64>()? + 1))
        });
        let config = BuildConfig {
            max_depth: 8,
            max_attempts: 5,
        };
        let builder = TreeBuilder::new(&registry, config);
        let err = builder.build_random("Num", &mut GpRng::new(0)).unwrap_err();
        assert!(matches!(err, GpError::TreeConstruction { attempts: 5 }));
    }

    #[test]
    fn test_depth_limit_is_respected() {
        let registry = arithmetic();
        let config = BuildConfig {
            max_depth: 4,
            max_attempts: 99_999,
        };
        let builder = TreeBuilder::new(&registry, config);
        let mut rng = GpRng::new(11);
        for _ in 0..50 {
            let tree = builder.build_random("Num", &mut rng).unwrap();
            assert!(analyze(&tree).depth <= 4);
        }
    }

    #[test]
    fn test_same_seed_same_tree() {
        let registry = arithmetic();
        let builder = TreeBuilder::new(&registry, BuildConfig::default());
        let a = builder.build_random("Num", &mut GpRng::new(42)).unwrap();
        let b = builder.build_random("Num", &mut GpRng::new(42)).unwrap();
        assert_eq!(a.to_string(), b.to_string());
    }
}
