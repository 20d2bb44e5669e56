//! Lazy traversal over the tree's leaves and elements.
//!
//! [`Leaves`] replaces the recursive descent with an explicit work-list
//! of pending subtrees: popping a node pushes its children in reverse, so
//! leaves surface left-to-right one at a time. The traversal is finite,
//! single-pass, and not restartable without rebuilding from the root.

use crate::node::{Child, Leaf, Node};

/// Work-list iterator over every leaf under a node, left-to-right.
pub(crate) struct Leaves<'a, V> {
    stack: Vec<&'a Child<V>>,
}

impl<'a, V: Clone> Leaves<'a, V> {
    pub(crate) fn new(root: &'a Node<V>) -> Leaves<'a, V> {
        let mut stack = Vec::new();
        if root.size() > 0 {
            stack.extend(root.children.iter().rev());
        }
        Leaves { stack }
    }
}

impl<'a, V: Clone> Iterator for Leaves<'a, V> {
    type Item = &'a Leaf<V>;

    fn next(&mut self) -> Option<&'a Leaf<V>> {
        while let Some(child) = self.stack.pop() {
            match child {
                Child::Leaf(leaf) => return Some(leaf),
                Child::Node(node) => self.stack.extend(node.children.iter().rev()),
            }
        }
        None
    }
}

/// Element iterator over a sequence.
pub struct Iter<'a, V> {
    leaves: Leaves<'a, V>,
    front: &'a [V],
    remaining: u64,
}

impl<'a, V: Clone> Iter<'a, V> {
    pub(crate) fn new(root: &'a Node<V>) -> Iter<'a, V> {
        Iter {
            remaining: root.size(),
            leaves: Leaves::new(root),
            front: &[],
        }
    }
}

impl<'a, V: Clone> Iterator for Iter<'a, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<&'a V> {
        loop {
            if let Some((head, rest)) = self.front.split_first() {
                self.front = rest;
                self.remaining -= 1;
                return Some(head);
            }
            self.front = &self.leaves.next()?.elements;
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl<V: Clone> ExactSizeIterator for Iter<'_, V> {}
