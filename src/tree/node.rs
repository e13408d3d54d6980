//! Program trees and their recursive interpretation.

use std::fmt;

use crate::error::{EvalError, GpError};
use crate::typing::{Bindings, Operation, Type, Value};

/// A node holding one operation and one child per parameter.
///
/// Child `i` always returns the operation's `i`-th parameter type.
#[derive(Debug)]
pub struct Node {
    operation: Operation,
    children: Vec<Node>,
}

impl Node {
    /// A zero-parameter node.
    pub fn leaf(operation: Operation) -> Result<Self, GpError> {
        Self::new(operation, Vec::new())
    }

    /// Assemble a node from an operation and already built children.
    ///
    /// Fails when the children do not match the operation's parameters.
    pub fn new(operation: Operation, children: Vec<Node>) -> Result<Self, GpError> {
        if children.len() != operation.arity() {
            return Err(GpError::UnsatisfiableConstraint(format!(
                "{operation} takes {} children, got {}",
                operation.arity(),
                children.len()
            )));
        }
        for (param, child) in operation.params().iter().zip(&children) {
            if child.return_type() != param {
                return Err(GpError::UnsatisfiableType(format!(
                    "{operation} expects {param}, got {}",
                    child.return_type()
                )));
            }
        }
        Ok(Self::from_parts(operation, children))
    }

    /// Assemble without checking; callers guarantee the typing invariant.
    pub(crate) fn from_parts(operation: Operation, children: Vec<Node>) -> Self {
        Self {
            operation,
            children,
        }
    }

    /// The operation at this node.
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Children, in parameter order.
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Return type of this subtree.
    pub fn return_type(&self) -> &Type {
        self.operation.return_type()
    }

    /// Evaluate this subtree, reading inputs from `bindings`.
    ///
    /// Errors raised by operation bodies propagate unchanged.
    pub fn evaluate_with(&self, bindings: &Bindings) -> Result<Value, EvalError> {
        let args = self
            .children
            .iter()
            .map(|child| child.evaluate_with(bindings))
            .collect::<Result<Vec<_>, _>>()?;
        self.operation.apply(&args, bindings)
    }

    /// Descendant at `path`, a sequence of child indices. The empty path is `self`.
    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        path.iter()
            .try_fold(self, |node, &index| node.children.get(index))
    }

    /// Mutable descendant at `path`.
    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        path.iter()
            .try_fold(self, |node, &index| node.children.get_mut(index))
    }
}

impl Clone for Node {
    /// Deep copy using an explicit stack, so copy depth is not limited by
    /// the call stack.
    fn clone(&self) -> Self {
        let mut pending: Vec<(&Node, bool)> =
            self.children.iter().rev().map(|child| (child, false)).collect();
        let mut built: Vec<Node> = Vec::with_capacity(self.children.len());

        while let Some((node, expanded)) = pending.pop() {
            if !expanded {
                pending.push((node, true));
                for child in node.children.iter().rev() {
                    pending.push((child, false));
                }
                continue;
            }
            // Children were finished in order and sit on top of `built`.
            let split = built.len() - node.children.len();
            let children = built.split_off(split);
            built.push(Node::from_parts(node.operation.clone(), children));
        }
        // Only the root's children remain, in order.
        Node::from_parts(self.operation.clone(), built)
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut node) = stack.pop() {
            stack.append(&mut node.children);
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operation)?;
        if self.children.is_empty() {
            return Ok(());
        }
        write!(f, "(")?;
        for (i, child) in self.children.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{child}")?;
        }
        write!(f, ")")
    }
}

/// A rooted program tree.
#[derive(Debug, Clone)]
pub struct Tree {
    root: Node,
}

impl Tree {
    /// Wrap a root node.
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    /// The root node.
    pub fn root(&self) -> &Node {
        &self.root
    }

    /// Unwrap into the root node.
    pub fn into_root(self) -> Node {
        self.root
    }

    /// Return type of the whole tree.
    pub fn return_type(&self) -> &Type {
        self.root.return_type()
    }

    /// Evaluate with no bindings; inputs fall back to their declared values.
    pub fn evaluate(&self) -> Result<Value, EvalError> {
        self.root.evaluate_with(&Bindings::default())
    }

    /// Evaluate, reading inputs from `bindings`.
    pub fn evaluate_with(&self, bindings: &Bindings) -> Result<Value, EvalError> {
        self.root.evaluate_with(bindings)
    }

    /// True if `operation` occurs anywhere in the tree, the root included.
    pub fn contains(&self, operation: &Operation) -> bool {
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if &node.operation == operation {
                return true;
            }
            stack.extend(node.children.iter());
        }
        false
    }

    /// Node at `path` from the root.
    pub fn node_at(&self, path: &[usize]) -> Option<&Node> {
        self.root.node_at(path)
    }

    /// Replace the subtree at a non-empty `path`, returning the old one.
    ///
    /// Returns `None` (leaving the tree untouched) when the path does not
    /// exist, is empty, or `subtree` has a different return type.
    pub fn replace(&mut self, path: &[usize], subtree: Node) -> Option<Node> {
        if path.is_empty() {
            return None;
        }
        let slot = self.root.node_at_mut(path)?;
        if slot.return_type() != subtree.return_type() {
            return None;
        }
        Some(std::mem::replace(slot, subtree))
    }
}

impl From<Node> for Tree {
    fn from(root: Node) -> Self {
        Self::new(root)
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typing::TypeRegistry;

    fn arithmetic() -> (TypeRegistry, Operation, Operation, Operation) {
        let mut registry = TypeRegistry::new();
        let add = registry.declare_binary("add", ("Num", "Num"), "Num", |x: &i64, y: &i64| x + y);
        let one = registry.declare_constant("Num", 1i64);
        let x = registry.declare_input("x", "Num", None);
        (registry, add, one, x)
    }

    fn sample(add: &Operation, one: &Operation, x: &Operation) -> Tree {
        let inner = Node::new(
            add.clone(),
            vec![Node::leaf(one.clone()).unwrap(), Node::leaf(x.clone()).unwrap()],
        )
        .unwrap();
        Tree::new(Node::new(add.clone(), vec![inner, Node::leaf(one.clone()).unwrap()]).unwrap())
    }

    #[test]
    fn test_evaluate_with_bindings() {
        let (_, add, one, x) = arithmetic();
        let tree = sample(&add, &one, &x);
        let value = tree.evaluate_with(&Bindings::new().bind("x", 5i64)).unwrap();
        assert_eq!(value.get::<i64>().unwrap(), &7);
        assert!(matches!(tree.evaluate(), Err(EvalError::UnboundInput(_))));
    }

    #[test]
    fn test_new_rejects_mismatched_children() {
        let (mut registry, add, one, _) = arithmetic();
        let text = registry.declare_constant("Text", String::from("a"));
        assert!(Node::new(add.clone(), vec![Node::leaf(one).unwrap()]).is_err());
        let bad = Node::new(
            add,
            vec![Node::leaf(text.clone()).unwrap(), Node::leaf(text).unwrap()],
        );
        assert!(matches!(bad, Err(GpError::UnsatisfiableType(_))));
    }

    #[test]
    fn test_contains_includes_root() {
        let (mut registry, add, one, x) = arithmetic();
        let two = registry.declare_constant("Num", 2i64);
        let tree = sample(&add, &one, &x);
        assert!(tree.contains(&add));
        assert!(tree.contains(&x));
        assert!(!tree.contains(&two));
    }

    #[test]
    fn test_display() {
        let (_, add, one, x) = arithmetic();
        assert_eq!(sample(&add, &one, &x).to_string(), "add(add(1, x), 1)");
    }

    #[test]
    fn test_clone_is_independent() {
        let (_, add, one, x) = arithmetic();
        let tree = sample(&add, &one, &x);
        let mut copy = tree.clone();
        assert_eq!(copy.to_string(), tree.to_string());

        let old = copy.replace(&[0], Node::leaf(one.clone()).unwrap()).unwrap();
        assert_eq!(old.to_string(), "add(1, x)");
        assert_eq!(copy.to_string(), "add(1, 1)");
        assert_eq!(tree.to_string(), "add(add(1, x), 1)");
    }

    #[test]
    fn test_clone_deep_chain() {
        let (_, add, one, _) = arithmetic();
        let mut node = Node::leaf(one.clone()).unwrap();
        for _ in 0..2_000 {
            node = Node::new(add.clone(), vec![node, Node::leaf(one.clone()).unwrap()]).unwrap();
        }
        let copy = node.clone();
        assert_eq!(copy.node_at(&[0; 2_000]).unwrap().operation(), &one);
        assert_eq!(copy.node_at(&[0; 1_999]).unwrap().children().len(), 2);
        assert_eq!(copy.node_at(&[1]).unwrap().operation(), &one);
    }

    #[test]
    fn test_clone_preserves_child_order() {
        let (mut registry, add, one, x) = arithmetic();
        let two = registry.declare_constant("Num", 2i64);
        let leaf = |op: &Operation| Node::leaf(op.clone()).unwrap();
        let right = Node::new(add.clone(), vec![leaf(&two), leaf(&x)]).unwrap();
        let root = Node::new(add.clone(), vec![leaf(&one), right]).unwrap();
        assert_eq!(root.clone().to_string(), "add(1, add(2, x))");
        assert_eq!(leaf(&one).clone().to_string(), "1");
    }

    #[test]
    fn test_drop_deep_chain() {
        let (mut registry, _, one, _) = arithmetic();
        let neg = registry.declare_unary("neg", "Num", "Num", |x: &i64| -x);
        let mut node = Node::leaf(one).unwrap();
        for _ in 0..200_000 {
            node = Node::new(neg.clone(), vec![node]).unwrap();
        }
        drop(Tree::new(node));
    }

    #[test]
    fn test_replace_rejects_root_and_type_change() {
        let (mut registry, add, one, x) = arithmetic();
        let text = registry.declare_constant("Text", String::from("a"));
        let mut tree = sample(&add, &one, &x);
        assert!(tree.replace(&[], Node::leaf(one.clone()).unwrap()).is_none());
        assert!(tree.replace(&[1], Node::leaf(text).unwrap()).is_none());
        assert!(tree.replace(&[5], Node::leaf(one).unwrap()).is_none());
    }
}
