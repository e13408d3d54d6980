//! Derived structural statistics of a tree.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::typing::{Operation, Type};

use super::node::Tree;

/// Position of a non-root node within one [`StructuralInfo`].
///
/// Locations are breadth-first slots; the root is slot 0. Resolve one into
/// child indices with [`StructuralInfo::path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeLocation {
    slot: usize,
    parent: usize,
    index: usize,
}

impl NodeLocation {
    /// Breadth-first slot of this node.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Breadth-first slot of the owning parent.
    pub fn parent_slot(&self) -> usize {
        self.parent
    }

    /// Index of this node in its parent's children.
    pub fn index(&self) -> usize {
        self.index
    }
}

/// A parent operation and the operations of its children, in order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphEdge {
    pub parent: Operation,
    pub children: Vec<Operation>,
}

/// Statistics derived from one traversal of a tree.
#[derive(Debug, Clone)]
pub struct StructuralInfo {
    /// Non-root node locations grouped by return type.
    pub nodes_by_type: BTreeMap<Type, Vec<NodeLocation>>,
    /// Number of levels; a lone root has depth 1.
    pub depth: usize,
    /// Number of nodes excluding the root.
    pub num_nodes: usize,
    /// Distinct inputs referenced anywhere in the tree.
    pub inputs: BTreeSet<Operation>,
    /// One edge per internal node, in breadth-first order.
    pub graph_edges: Vec<GraphEdge>,
    /// `(parent slot, child index)` per slot; the root's entry is unused.
    parents: Vec<(usize, usize)>,
}

impl StructuralInfo {
    /// Child indices from the root to `location`.
    pub fn path(&self, location: &NodeLocation) -> Vec<usize> {
        let mut path = Vec::new();
        let mut slot = location.slot;
        while slot != 0 {
            let (parent, index) = self.parents[slot];
            path.push(index);
            slot = parent;
        }
        path.reverse();
        path
    }
}

/// Compute [`StructuralInfo`] with a single breadth-first pass.
pub fn analyze(tree: &Tree) -> StructuralInfo {
    let mut info = StructuralInfo {
        nodes_by_type: BTreeMap::new(),
        depth: 0,
        num_nodes: 0,
        inputs: BTreeSet::new(),
        graph_edges: Vec::new(),
        parents: vec![(0, 0)],
    };

    let mut queue = VecDeque::from([(tree.root(), 0usize, 1usize)]);
    while let Some((node, slot, depth)) = queue.pop_front() {
        info.depth = info.depth.max(depth);
        if node.operation().is_input() {
            info.inputs.insert(node.operation().clone());
        }
        if !node.children().is_empty() {
            info.graph_edges.push(GraphEdge {
                parent: node.operation().clone(),
                children: node
                    .children()
                    .iter()
                    .map(|child| child.operation().clone())
                    .collect(),
            });
        }
        for (index, child) in node.children().iter().enumerate() {
            let location = NodeLocation {
                slot: info.parents.len(),
                parent: slot,
                index,
            };
            info.parents.push((slot, index));
            info.num_nodes += 1;
            info.nodes_by_type
                .entry(child.return_type().clone())
                .or_default()
                .push(location);
            queue.push_back((child, location.slot, depth + 1));
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Node;
    use crate::typing::TypeRegistry;

    #[test]
    fn test_root_with_two_leaves() {
        let mut registry = TypeRegistry::new();
        let add = registry.declare_binary("add", ("Num", "Num"), "Num", |x: &i64, y: &i64| x + y);
        let one = registry.declare_constant("Num", 1i64);
        let tree = Tree::new(
            Node::new(
                add.clone(),
                vec![Node::leaf(one.clone()).unwrap(), Node::leaf(one.clone()).unwrap()],
            )
            .unwrap(),
        );

        let info = analyze(&tree);
        assert_eq!(info.num_nodes, 2);
        assert_eq!(info.depth, 2);
        assert!(info.inputs.is_empty());
        assert_eq!(
            info.graph_edges,
            vec![GraphEdge {
                parent: add,
                children: vec![one.clone(), one],
            }]
        );
        let locations = &info.nodes_by_type[&Type::named("Num")];
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[1].parent_slot(), 0);
        assert_eq!(locations[1].index(), 1);
        assert_eq!(info.path(&locations[1]), vec![1]);
    }

    #[test]
    fn test_lone_root() {
        let mut registry = TypeRegistry::new();
        let x = registry.declare_input("x", "Num", None);
        let info = analyze(&Tree::new(Node::leaf(x.clone()).unwrap()));
        assert_eq!(info.num_nodes, 0);
        assert_eq!(info.depth, 1);
        assert!(info.nodes_by_type.is_empty());
        assert!(info.graph_edges.is_empty());
        assert!(info.inputs.contains(&x));
    }

    #[test]
    fn test_locations_match_types() {
        let mut registry = TypeRegistry::new();
        let len = registry.declare_unary("len", "Text", "Num", |s: &String| s.len() as i64);
        let neg = registry.declare_unary("neg", "Num", "Num", |x: &i64| -x);
        let word = registry.declare_constant("Text", String::from("abc"));
        let x = registry.declare_input("x", "Num", None);
        let inner = Node::new(len, vec![Node::leaf(word).unwrap()]).unwrap();
        let tree = Tree::new(
            Node::new(
                registry.declare_binary("add", ("Num", "Num"), "Num", |a: &i64, b: &i64| a + b),
                vec![Node::new(neg, vec![inner]).unwrap(), Node::leaf(x.clone()).unwrap()],
            )
            .unwrap(),
        );

        let info = analyze(&tree);
        assert_eq!(info.num_nodes, 4);
        assert_eq!(info.depth, 4);
        assert_eq!(info.graph_edges.len(), 3);
        assert_eq!(info.inputs.len(), 1);
        for (ty, locations) in &info.nodes_by_type {
            for location in locations {
                assert_eq!(tree.node_at(&info.path(location)).unwrap().return_type(), ty);
            }
        }
        assert_eq!(info.nodes_by_type[&Type::named("Text")].len(), 1);
    }

    #[test]
    fn test_deep_chain_is_linear() {
        let mut registry = TypeRegistry::new();
        let neg = registry.declare_unary("neg", "Num", "Num", |x: &i64| -x);
        let one = registry.declare_constant("Num", 1i64);
        let links = 10_000;
        let mut node = Node::leaf(one.clone()).unwrap();
        for _ in 0..links {
            node = Node::new(neg.clone(), vec![node]).unwrap();
        }
        let tree = Tree::new(node);

        let info = analyze(&tree);
        assert_eq!(info.num_nodes, links);
        assert_eq!(info.depth, links + 1);
        assert_eq!(info.graph_edges.len(), links);
        assert!(std::mem::size_of::<NodeLocation>() <= 3 * std::mem::size_of::<usize>());

        let deepest = info.nodes_by_type[&Type::named("Num")].last().copied().unwrap();
        let path = info.path(&deepest);
        assert_eq!(path.len(), links);
        assert_eq!(tree.node_at(&path).unwrap().operation(), &one);
    }
}
