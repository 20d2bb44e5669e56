//! Tree nodes for the persistent sequence.
//!
//! The tree is a 32-ary radix tree over [`Leaf`] element arrays. An
//! internal [`Node`] carries a `shift` (its height in multiples of 5 bits;
//! leaves are reached at shift = 5), a strict/relaxed flag, up to 32
//! children of uniform height, and a parallel table of cumulative offsets
//! whose last entry is the subtree size.
//!
//! In a **strict** node every child except possibly the last is completely
//! full, so an index resolves by bit arithmetic alone. A **relaxed** node
//! has irregular child sizes and resolves indices by scanning the offset
//! table; a relaxed descent drops back to the strict path as soon as it
//! lands in a provably strict subtree.
//!
//! All structural edits go through the ownership-token rule: a node is
//! mutated in place only when its stored editor equals the supplied
//! token, otherwise it is shallow-cloned (children copied by reference)
//! under the new token first. Holders of prior references therefore never
//! observe a change.

use std::sync::Arc;

use crate::token::Token;

/// Bits consumed per tree level.
pub(crate) const BITS: u32 = 5;
/// Maximum children per node and elements per leaf.
pub(crate) const BRANCH_FACTOR: usize = 32;

const MASK: u64 = (BRANCH_FACTOR as u64) - 1;

// ============================================================================
// Leaf
// ============================================================================

/// Fixed-capacity (≤32) element array with an ownership token.
#[derive(Debug, Clone)]
pub(crate) struct Leaf<V> {
    pub(crate) editor: Token,
    pub(crate) elements: Vec<V>,
}

impl<V: Clone> Leaf<V> {
    pub(crate) fn unit(editor: Token, value: V) -> Leaf<V> {
        Leaf {
            editor,
            elements: vec![value],
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.elements.len()
    }

    /// Copy of `[start, end)` bound to `editor`. Never mutates in place.
    pub(crate) fn slice(&self, editor: Token, start: usize, end: usize) -> Arc<Leaf<V>> {
        Arc::new(Leaf {
            editor,
            elements: self.elements[start..end].to_vec(),
        })
    }
}

// ============================================================================
// Child
// ============================================================================

/// A node's child: one level down, either a leaf or another node.
#[derive(Debug, Clone)]
pub(crate) enum Child<V> {
    Leaf(Arc<Leaf<V>>),
    Node(Arc<Node<V>>),
}

impl<V: Clone> Child<V> {
    pub(crate) fn size(&self) -> u64 {
        match self {
            Child::Leaf(l) => l.len() as u64,
            Child::Node(n) => n.size(),
        }
    }

    /// Height above the leaves: 0 for a leaf, `shift / 5` for a node.
    fn level(&self) -> u32 {
        match self {
            Child::Leaf(_) => 0,
            Child::Node(n) => n.shift / BITS,
        }
    }

    /// A full child cannot absorb further pushes at its edge.
    fn is_full(&self) -> bool {
        match self {
            Child::Leaf(l) => l.len() == BRANCH_FACTOR,
            Child::Node(n) => {
                n.children.len() == BRANCH_FACTOR
                    && n.children.last().is_some_and(Child::is_full)
            }
        }
    }

    fn slice(&self, editor: Token, start: u64, end: u64) -> Child<V> {
        match self {
            Child::Leaf(l) => Child::Leaf(l.slice(editor, start as usize, end as usize)),
            Child::Node(n) => Child::Node(n.slice(editor, start, end)),
        }
    }
}

// ============================================================================
// Node
// ============================================================================

/// 32-way internal node.
#[derive(Debug, Clone)]
pub(crate) struct Node<V> {
    pub(crate) editor: Token,
    pub(crate) strict: bool,
    pub(crate) shift: u32,
    /// Cumulative child sizes; strictly increasing, last entry = subtree size.
    pub(crate) offsets: Vec<u64>,
    pub(crate) children: Vec<Child<V>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Edge {
    First,
    Last,
}

impl<V: Clone> Node<V> {
    pub(crate) fn new(editor: Token, strict: bool, shift: u32) -> Node<V> {
        Node {
            editor,
            strict,
            shift,
            offsets: Vec::new(),
            children: Vec::new(),
        }
    }

    /// The canonical empty node.
    pub(crate) fn empty(editor: Token) -> Node<V> {
        Node::new(editor, true, BITS)
    }

    pub(crate) fn size(&self) -> u64 {
        self.offsets.last().copied().unwrap_or(0)
    }

    /// Base offset of the child in `slot`.
    fn offset(&self, slot: usize) -> u64 {
        if slot == 0 {
            0
        } else {
            self.offsets[slot - 1]
        }
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Resolve `idx` to its element. Callers guarantee `idx < size`.
    pub(crate) fn nth(&self, idx: u64) -> &V {
        if self.strict {
            self.strict_nth(idx)
        } else {
            self.relaxed_nth(idx)
        }
    }

    /// Direct bit-arithmetic descent; valid only under a strict root.
    fn strict_nth(&self, mut idx: u64) -> &V {
        let mut node = self;
        loop {
            let slot = ((idx >> node.shift) & MASK) as usize;
            idx &= (1u64 << node.shift) - 1;
            match &node.children[slot] {
                Child::Leaf(l) => return &l.elements[idx as usize],
                Child::Node(n) => node = n,
            }
        }
    }

    /// Offset-table descent, dropping to the strict path as soon as the
    /// remaining subtree is provably strict.
    fn relaxed_nth(&self, mut idx: u64) -> &V {
        let mut node = self;
        loop {
            if node.strict {
                return node.strict_nth(idx);
            }
            let slot = node.index_of(idx);
            idx -= node.offset(slot);
            match &node.children[slot] {
                Child::Leaf(l) => return &l.elements[idx as usize],
                Child::Node(n) => node = n,
            }
        }
    }

    /// Slot of the child whose offset range contains `idx`.
    ///
    /// The strict estimate is a lower bound even in relaxed nodes (no
    /// child can exceed its level capacity), so the scan starts there.
    fn index_of(&self, idx: u64) -> usize {
        let estimate = ((idx >> self.shift) & MASK) as usize;
        if self.strict {
            return estimate;
        }
        let mut slot = estimate;
        while self.offsets[slot] <= idx {
            slot += 1;
        }
        slot
    }

    pub(crate) fn first_leaf(&self) -> Option<&Leaf<V>> {
        match self.children.first()? {
            Child::Leaf(l) => Some(l),
            Child::Node(n) => n.first_leaf(),
        }
    }

    pub(crate) fn last_leaf(&self) -> Option<&Leaf<V>> {
        match self.children.last()? {
            Child::Leaf(l) => Some(l),
            Child::Node(n) => n.last_leaf(),
        }
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Overwrite the element at `idx`, copy-on-write along the path.
    pub(crate) fn set_in(root: &mut Arc<Node<V>>, editor: Token, idx: u64, value: V) {
        edit(root, editor).overwrite(editor, idx, value);
    }

    fn overwrite(&mut self, editor: Token, idx: u64, value: V) {
        let slot = self.index_of(idx);
        let inner = idx - self.offset(slot);
        match &mut self.children[slot] {
            Child::Leaf(leaf) => {
                edit_leaf(leaf, editor).elements[inner as usize] = value;
            }
            Child::Node(child) => {
                edit(child, editor).overwrite(editor, inner, value);
            }
        }
    }

    // ------------------------------------------------------------------
    // Push at the edges
    // ------------------------------------------------------------------

    /// Push `child` (a leaf or subtree of `size` elements) after the last
    /// element, growing a level or absorbing the receiver into a taller
    /// pushed subtree as needed.
    pub(crate) fn add_last_in(root: &mut Arc<Node<V>>, editor: Token, child: Child<V>, size: u64) {
        // a taller pushed subtree absorbs the receiver instead
        if let Child::Node(n) = &child {
            if n.shift > root.shift {
                let receiver = Child::Node(root.clone());
                let receiver_size = root.size();
                let mut taller = n.clone();
                Node::add_first_in(&mut taller, editor, receiver, receiver_size);
                *root = taller;
                return;
            }
        }
        if Node::needs_level(root, &child, Edge::Last) {
            let mut parent = Arc::new(Node::new(editor, root.strict, root.shift + BITS));
            let old = Child::Node(root.clone());
            let old_size = root.size();
            Node::add_last_in(&mut parent, editor, old, old_size);
            Node::add_last_in(&mut parent, editor, child, size);
            *root = parent;
            return;
        }
        edit(root, editor).push_last(editor, child, size);
    }

    /// Mirror of [`Node::add_last_in`] for the front edge.
    pub(crate) fn add_first_in(root: &mut Arc<Node<V>>, editor: Token, child: Child<V>, size: u64) {
        if let Child::Node(n) = &child {
            if n.shift > root.shift {
                let receiver = Child::Node(root.clone());
                let receiver_size = root.size();
                let mut taller = n.clone();
                Node::add_last_in(&mut taller, editor, receiver, receiver_size);
                *root = taller;
                return;
            }
        }
        if Node::needs_level(root, &child, Edge::First) {
            let mut parent = Arc::new(Node::new(editor, false, root.shift + BITS));
            let old = Child::Node(root.clone());
            let old_size = root.size();
            Node::add_first_in(&mut parent, editor, old, old_size);
            Node::add_first_in(&mut parent, editor, child, size);
            *root = parent;
            return;
        }
        edit(root, editor).push_first(editor, child, size);
    }

    /// A push must wrap the receiver in a one-level-taller node exactly
    /// when the receiver cannot absorb the child.
    fn needs_level(root: &Arc<Node<V>>, child: &Child<V>, edge: Edge) -> bool {
        !root.can_push(child, edge)
    }

    /// Whether a push at `edge` can be absorbed without growing a level.
    /// Mirrors the routing in [`Node::push_last`] / [`Node::push_first`].
    fn can_push(&self, child: &Child<V>, edge: Edge) -> bool {
        let has_room = self.children.len() < BRANCH_FACTOR;
        if self.shift == BITS {
            return has_room
                || match edge {
                    Edge::Last => self.can_merge_last(child),
                    Edge::First => self.can_merge_first(child),
                };
        }
        if child.level() < self.shift / BITS - 1 {
            let edge_child = match edge {
                Edge::Last => self.children.last(),
                Edge::First => self.children.first(),
            };
            if let Some(Child::Node(e)) = edge_child {
                if e.can_push(child, edge) {
                    return true;
                }
            }
            // otherwise the child is wrapped to sibling height and appended
            return has_room;
        }
        has_room
    }

    /// Whether a pushed leaf fits inside the non-full last leaf.
    fn can_merge_last(&self, child: &Child<V>) -> bool {
        match (self.children.last(), child) {
            (Some(Child::Leaf(edge)), Child::Leaf(pushed)) => {
                edge.len() < BRANCH_FACTOR && edge.len() + pushed.len() <= BRANCH_FACTOR
            }
            _ => false,
        }
    }

    fn can_merge_first(&self, child: &Child<V>) -> bool {
        match (self.children.first(), child) {
            (Some(Child::Leaf(edge)), Child::Leaf(pushed)) => {
                edge.len() < BRANCH_FACTOR && edge.len() + pushed.len() <= BRANCH_FACTOR
            }
            _ => false,
        }
    }

    fn push_last(&mut self, editor: Token, mut child: Child<V>, size: u64) {
        if self.shift == BITS {
            if self.can_merge_last(&child) {
                let Child::Leaf(pushed) = child else { unreachable!() };
                let slot = self.children.len() - 1;
                if let Child::Leaf(edge) = &mut self.children[slot] {
                    edit_leaf(edge, editor)
                        .elements
                        .extend(pushed.elements.iter().cloned());
                }
                self.offsets[slot] += size;
                // the merged-into leaf is irregular: direct indexing is off
                self.strict = false;
                return;
            }
            self.append_child(child, size);
            return;
        }

        let sibling_level = self.shift / BITS - 1;
        if child.level() < sibling_level {
            let descend = match self.children.last() {
                Some(Child::Node(edge)) => edge.can_push(&child, Edge::Last),
                _ => false,
            };
            if descend {
                let slot = self.children.len() - 1;
                if let Child::Node(edge) = &mut self.children[slot] {
                    edit(edge, editor).push_last(editor, child, size);
                    self.offsets[slot] += size;
                    self.strict = false;
                    return;
                }
            }
            child = wrap_to_level(editor, child, size, sibling_level, true);
        }
        self.append_child(child, size);
    }

    fn push_first(&mut self, editor: Token, mut child: Child<V>, size: u64) {
        // any prepend invalidates direct indexing
        self.strict = false;

        if self.shift == BITS {
            if self.can_merge_first(&child) {
                let Child::Leaf(pushed) = child else { unreachable!() };
                if let Child::Leaf(first) = &mut self.children[0] {
                    edit_leaf(first, editor)
                        .elements
                        .splice(0..0, pushed.elements.iter().cloned());
                }
                for o in &mut self.offsets {
                    *o += size;
                }
                return;
            }
            self.prepend_child(child, size);
            return;
        }

        let sibling_level = self.shift / BITS - 1;
        if child.level() < sibling_level {
            let descend = match self.children.first() {
                Some(Child::Node(first)) => first.can_push(&child, Edge::First),
                _ => false,
            };
            if descend {
                if let Child::Node(first) = &mut self.children[0] {
                    edit(first, editor).push_first(editor, child, size);
                    for o in &mut self.offsets {
                        *o += size;
                    }
                    return;
                }
            }
            child = wrap_to_level(editor, child, size, sibling_level, false);
        }
        self.prepend_child(child, size);
    }

    fn append_child(&mut self, child: Child<V>, size: u64) {
        // appending behind a non-full edge, or appending a relaxed
        // subtree, invalidates direct indexing
        if self.children.last().is_some_and(|c| !c.is_full()) {
            self.strict = false;
        }
        if let Child::Node(n) = &child {
            if !n.strict {
                self.strict = false;
            }
        }
        let base = self.size();
        self.children.push(child);
        self.offsets.push(base + size);
        debug_assert!(self.children.len() <= BRANCH_FACTOR);
    }

    fn prepend_child(&mut self, child: Child<V>, size: u64) {
        for o in &mut self.offsets {
            *o += size;
        }
        self.offsets.insert(0, size);
        self.children.insert(0, child);
        debug_assert!(self.children.len() <= BRANCH_FACTOR);
    }

    // ------------------------------------------------------------------
    // Pop at the edges
    // ------------------------------------------------------------------

    /// Remove the last element, propagating the size delta up the offset
    /// tables. Returns `None` on an empty tree.
    pub(crate) fn remove_last_in(root: &mut Arc<Node<V>>, editor: Token) -> Option<V> {
        if root.size() == 0 {
            return None;
        }
        Some(edit(root, editor).pop_last(editor))
    }

    pub(crate) fn remove_first_in(root: &mut Arc<Node<V>>, editor: Token) -> Option<V> {
        if root.size() == 0 {
            return None;
        }
        Some(edit(root, editor).pop_first(editor))
    }

    fn pop_last(&mut self, editor: Token) -> V {
        let slot = self.children.len() - 1;
        let (value, emptied) = match &mut self.children[slot] {
            Child::Leaf(leaf) => {
                let l = edit_leaf(leaf, editor);
                let v = l.elements.pop().expect("leaves are never empty");
                (v, l.elements.is_empty())
            }
            Child::Node(child) => {
                let n = edit(child, editor);
                let v = n.pop_last(editor);
                (v, n.children.is_empty())
            }
        };
        if emptied {
            self.children.pop();
            self.offsets.pop();
        } else {
            self.offsets[slot] -= 1;
        }
        value
    }

    fn pop_first(&mut self, editor: Token) -> V {
        self.strict = false;
        let (value, emptied) = match &mut self.children[0] {
            Child::Leaf(leaf) => {
                let l = edit_leaf(leaf, editor);
                let v = l.elements.remove(0);
                (v, l.elements.is_empty())
            }
            Child::Node(child) => {
                let n = edit(child, editor);
                let v = n.pop_first(editor);
                (v, n.children.is_empty())
            }
        };
        if emptied {
            self.children.remove(0);
            self.offsets.remove(0);
        }
        for o in &mut self.offsets {
            *o -= 1;
        }
        value
    }

    // ------------------------------------------------------------------
    // Concat / slice
    // ------------------------------------------------------------------

    /// Merge two trees preserving left-to-right order. The result is
    /// always relaxed.
    pub(crate) fn concat(
        editor: Token,
        left: &Arc<Node<V>>,
        right: &Arc<Node<V>>,
    ) -> Arc<Node<V>> {
        use std::cmp::Ordering;

        if left.size() == 0 {
            return right.clone();
        }
        if right.size() == 0 {
            return left.clone();
        }

        match left.shift.cmp(&right.shift) {
            // equal height: new parent one level taller with both as children
            Ordering::Equal => {
                let left_size = left.size();
                Arc::new(Node {
                    editor,
                    strict: false,
                    shift: left.shift + BITS,
                    offsets: vec![left_size, left_size + right.size()],
                    children: vec![Child::Node(left.clone()), Child::Node(right.clone())],
                })
            }
            // left is exactly one level shorter: splice it in at the front
            Ordering::Less if left.shift + BITS == right.shift => {
                let mut root = right.clone();
                Node::add_first_in(&mut root, editor, Child::Node(left.clone()), left.size());
                root
            }
            // right is exactly one level shorter: splice it in at the back
            Ordering::Greater if right.shift + BITS == left.shift => {
                let mut root = left.clone();
                Node::add_last_in(&mut root, editor, Child::Node(right.clone()), right.size());
                edit(&mut root, editor).strict = false;
                root
            }
            // heights differ by more than one: wrap the shorter side and retry
            Ordering::Less => {
                let wrapped = wrap_node_once(editor, left);
                Node::concat(editor, &wrapped, right)
            }
            Ordering::Greater => {
                let wrapped = wrap_node_once(editor, right);
                Node::concat(editor, left, &wrapped)
            }
        }
    }

    /// Subtree for `[start, end)`. Callers guarantee `start < end <= size`.
    /// The result is always relaxed.
    pub(crate) fn slice(&self, editor: Token, start: u64, end: u64) -> Arc<Node<V>> {
        let start_slot = self.index_of(start);
        let end_slot = self.index_of(end - 1);
        let mut out = Arc::new(Node::new(editor, false, self.shift));

        if start_slot == end_slot {
            // single enclosing child: slice it with translated offsets
            let base = self.offset(start_slot);
            let inner = self.children[start_slot].slice(editor, start - base, end - base);
            Node::add_last_in(&mut out, editor, inner, end - start);
        } else {
            // partial-slice the boundary children, copy references to the
            // fully enclosed middles
            let lo = self.offset(start_slot);
            let hi = self.offsets[start_slot];
            let first = self.children[start_slot].slice(editor, start - lo, hi - lo);
            Node::add_last_in(&mut out, editor, first, hi - start);

            for slot in start_slot + 1..end_slot {
                let size = self.offsets[slot] - self.offsets[slot - 1];
                Node::add_last_in(&mut out, editor, self.children[slot].clone(), size);
            }

            let lo = self.offset(end_slot);
            let last = self.children[end_slot].slice(editor, 0, end - lo);
            Node::add_last_in(&mut out, editor, last, end - lo);
        }
        out
    }
}

// ============================================================================
// Copy-on-write helpers
// ============================================================================

/// Make `node` mutable under `editor`: in place when the token matches,
/// via shallow clone (children copied by reference) otherwise.
fn edit<'a, V: Clone>(node: &'a mut Arc<Node<V>>, editor: Token) -> &'a mut Node<V> {
    if node.editor != editor {
        let mut copy = (**node).clone();
        copy.editor = editor;
        *node = Arc::new(copy);
    } else {
        // A matching token on an aliased node means a builder's token
        // escaped. `make_mut` still copies, keeping the result correct,
        // but the transient's no-copy contract is broken.
        debug_assert_eq!(
            Arc::strong_count(node),
            1,
            "ownership token presented for an aliased node"
        );
    }
    Arc::make_mut(node)
}

fn edit_leaf<'a, V: Clone>(leaf: &'a mut Arc<Leaf<V>>, editor: Token) -> &'a mut Leaf<V> {
    if leaf.editor != editor {
        let mut copy = (**leaf).clone();
        copy.editor = editor;
        *leaf = Arc::new(copy);
    } else {
        debug_assert_eq!(
            Arc::strong_count(leaf),
            1,
            "ownership token presented for an aliased leaf"
        );
    }
    Arc::make_mut(leaf)
}

/// Wrap `child` in single-child nodes until it sits at `target` level.
fn wrap_to_level<V: Clone>(
    editor: Token,
    mut child: Child<V>,
    size: u64,
    target: u32,
    strict: bool,
) -> Child<V> {
    // a strict wrapper is only valid over a strict subtree
    let strict = strict
        && match &child {
            Child::Leaf(_) => true,
            Child::Node(n) => n.strict,
        };
    while child.level() < target {
        let shift = (child.level() + 1) * BITS;
        child = Child::Node(Arc::new(Node {
            editor,
            strict,
            shift,
            offsets: vec![size],
            children: vec![child],
        }));
    }
    child
}

/// Relaxed single-child parent one level above `node`.
fn wrap_node_once<V: Clone>(editor: Token, node: &Arc<Node<V>>) -> Arc<Node<V>> {
    Arc::new(Node {
        editor,
        strict: false,
        shift: node.shift + BITS,
        offsets: vec![node.size()],
        children: vec![Child::Node(node.clone())],
    })
}

// ============================================================================
// Tests
// ============================================================================
