//! Property-based tests for type safety of construction and the genetic operators.
//!
//! Run with: cargo test --release properties

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;

use typed_gp::{
    GpRng, Node, Tree, TreeBuilder, TypeRegistry, analyze, crossover, mutate,
    schema::BuildConfig,
};

/// Numbers and booleans with operations crossing between them.
fn mixed() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.declare_binary("add", ("Num", "Num"), "Num", |x: &i64, y: &i64| {
        x.wrapping_add(*y)
    });
    registry.declare_binary("lt", ("Num", "Num"), "Bool", |x: &i64, y: &i64| x < y);
    registry.declare_unary("not", "Bool", "Bool", |b: &bool| !b);
    registry.declare("if", ["Bool", "Num", "Num"], "Num", |args| {
        let branch = if *args[0].get::<bool>()? { 1 } else { 2 };
        Ok(args[branch].clone())
    });
    registry.declare_constant("Num", 1i64);
    registry.declare_constant("Num", 2i64);
    registry.declare_constant("Bool", true);
    registry
}

fn config() -> BuildConfig {
    BuildConfig {
        max_depth: 8,
        max_attempts: 99_999,
    }
}

fn well_typed(node: &Node) -> bool {
    let params = node.operation().params();
    params.len() == node.children().len()
        && params
            .iter()
            .zip(node.children())
            .all(|(param, child)| child.return_type() == param && well_typed(child))
}

proptest! {
    /// Every built tree is well typed, returns the requested type and evaluates.
    #[test]
    fn prop_built_trees_are_well_typed(seed in any::<u64>(), boolean in any::<bool>()) {
        let registry = mixed();
        let builder = TreeBuilder::new(&registry, config());
        let target = if boolean { "Bool" } else { "Num" };

        let tree = builder.build_random(target, &mut GpRng::new(seed)).unwrap();

        prop_assert_eq!(tree.return_type().to_string(), target);
        prop_assert!(well_typed(tree.root()));
        prop_assert!(analyze(&tree).depth <= 8);
        prop_assert!(tree.evaluate().is_ok());
    }

    /// Structural statistics agree with each other.
    #[test]
    fn prop_analysis_is_consistent(seed in any::<u64>()) {
        let registry = mixed();
        let builder = TreeBuilder::new(&registry, config());
        let tree = builder.build_random("Num", &mut GpRng::new(seed)).unwrap();
        let info = analyze(&tree);

        let located: usize = info.nodes_by_type.values().map(Vec::len).sum();
        prop_assert_eq!(located, info.num_nodes);
        for (ty, locations) in &info.nodes_by_type {
            for location in locations {
                let node = tree.node_at(&info.path(location)).unwrap();
                prop_assert_eq!(node.return_type(), ty);
            }
        }
        prop_assert_eq!(info.num_nodes == 0, info.depth == 1);
    }

    /// Mutation keeps the root operation and leaves the tree well typed.
    #[test]
    fn prop_mutation_preserves_root(seed in any::<u64>()) {
        let registry = mixed();
        let builder = TreeBuilder::new(&registry, config());
        let mut rng = GpRng::new(seed);
        let mut tree = builder.build_random("Num", &mut rng).unwrap();
        let root = tree.root().operation().clone();

        mutate(&mut tree, &builder, None, &mut rng).unwrap();

        prop_assert_eq!(tree.root().operation(), &root);
        prop_assert!(well_typed(tree.root()));
        prop_assert!(tree.evaluate().is_ok());
    }

    /// Crossover either grafts a same-typed subtree or leaves both trees alone.
    #[test]
    fn prop_crossover_preserves_types(seed in any::<u64>()) {
        let registry = mixed();
        let builder = TreeBuilder::new(&registry, config());
        let mut rng = GpRng::new(seed);
        let mut first = builder.build_random("Num", &mut rng).unwrap();
        let mut second = builder.build_random("Bool", &mut rng).unwrap();
        let (first_before, second_before) = (first.to_string(), second.to_string());

        match crossover(&mut first, Some(&mut second), &mut rng) {
            Ok(_) => {
                prop_assert_eq!(first.return_type().to_string(), "Num");
                prop_assert_eq!(second.return_type().to_string(), "Bool");
                prop_assert!(well_typed(first.root()));
                prop_assert!(well_typed(second.root()));
                let changed = [first.to_string() != first_before, second.to_string() != second_before];
                prop_assert!(changed.iter().filter(|c| **c).count() <= 1);
            }
            Err(error) => {
                prop_assert!(error.is_unsatisfiable());
                prop_assert_eq!(first.to_string(), first_before);
                prop_assert_eq!(second.to_string(), second_before);
            }
        }
    }

    /// A tree with any non-root node can always cross with itself.
    #[test]
    fn prop_self_crossover_compatible(seed in any::<u64>()) {
        let registry = mixed();
        let builder = TreeBuilder::new(&registry, config());
        let mut rng = GpRng::new(seed);
        let mut tree: Tree = builder.build_random("Num", &mut rng).unwrap();
        let has_children = analyze(&tree).num_nodes > 0;

        let result = crossover(&mut tree, None, &mut rng);

        prop_assert_eq!(result.is_ok(), has_children);
        prop_assert!(well_typed(tree.root()));
    }
}
