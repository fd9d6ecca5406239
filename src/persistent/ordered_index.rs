//! Red-Black Tree keyed by integer digest, stored in an arena.
//!
//! [`OrderedIndex`] is the slot index behind [`PersistentMap`](super::PersistentMap).
//! It is a mutable, single-owner structure: persistence comes from the fat-node
//! slots stored in it, not from the tree itself.
//!
//! # Internal Structure
//!
//! All nodes live in one `Vec`. Links are indices into it, and index `0` is a
//! black sentinel standing in for every leaf (NIL), so rotations and fix-ups are
//! plain index rewiring. Freed nodes are recycled through a free list.
//!
//! The tree maintains the following invariants:
//! 1. Every node is either red or black
//! 2. The root is black
//! 3. All leaves (NIL) are black
//! 4. Red nodes have only black children
//! 5. Every path from root to leaf has the same number of black nodes
//!
//! # Ordering
//!
//! Nodes are ordered by their `u64` digest only. In-order traversal therefore
//! yields ascending digest order, which is an implementation artifact and not a
//! meaningful order of the keys that produced the digests.

use std::cmp::Ordering;
use std::fmt;

// =============================================================================
// Color Definition
// =============================================================================

/// The color of a Red-Black Tree node.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Color {
    Red,
    Black,
}

// =============================================================================
// Node Definition
// =============================================================================

/// Index of the shared sentinel leaf.
const NIL: usize = 0;

#[derive(Clone)]
struct Node<V> {
    digest: u64,
    /// `None` for the sentinel and for recycled nodes.
    value: Option<V>,
    color: Color,
    parent: usize,
    left: usize,
    right: usize,
}

impl<V> Node<V> {
    const fn sentinel() -> Self {
        Self {
            digest: 0,
            value: None,
            color: Color::Black,
            parent: NIL,
            left: NIL,
            right: NIL,
        }
    }

    const fn new_red(digest: u64, value: V) -> Self {
        Self {
            digest,
            value: Some(value),
            color: Color::Red,
            parent: NIL,
            left: NIL,
            right: NIL,
        }
    }
}

// =============================================================================
// OrderedIndex Definition
// =============================================================================

/// An ordered associative container keyed by `u64` digest.
///
/// # Time Complexity
///
/// | Operation | Complexity |
/// |-----------|------------|
/// | `find`    | O(log N)   |
/// | `insert`  | O(log N)   |
/// | `delete`  | O(log N)   |
/// | `iter`    | O(N)       |
/// | `len`     | O(1)       |
///
/// # Examples
///
/// ```rust
/// use palimpsest::persistent::OrderedIndex;
///
/// let mut index = OrderedIndex::new();
/// index.insert(30, "thirty");
/// index.insert(10, "ten");
/// index.insert(20, "twenty");
///
/// assert_eq!(index.find(20), Some(&"twenty"));
///
/// let digests: Vec<u64> = index.iter().map(|(digest, _)| digest).collect();
/// assert_eq!(digests, vec![10, 20, 30]);
///
/// assert_eq!(index.delete(10), Some("ten"));
/// assert_eq!(index.len(), 2);
/// ```
#[derive(Clone)]
pub struct OrderedIndex<V> {
    nodes: Vec<Node<V>>,
    root: usize,
    free: Vec<usize>,
    length: usize,
}

impl<V> OrderedIndex<V> {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::sentinel()],
            root: NIL,
            free: Vec::new(),
            length: 0,
        }
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the index holds no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the payload stored under `digest`.
    #[must_use]
    pub fn find(&self, digest: u64) -> Option<&V> {
        let node = self.locate(digest);
        self.nodes[node].value.as_ref()
    }

    /// Returns a mutable reference to the payload stored under `digest`.
    pub fn find_mut(&mut self, digest: u64) -> Option<&mut V> {
        let node = self.locate(digest);
        self.nodes[node].value.as_mut()
    }

    /// Stores `value` under `digest`, returning the payload it replaced.
    ///
    /// An existing node with the same digest keeps its position and color and
    /// only has its payload overwritten.
    pub fn insert(&mut self, digest: u64, value: V) -> Option<V> {
        let existing = self.locate(digest);
        if existing != NIL {
            return self.nodes[existing].value.replace(value);
        }

        let mut parent = NIL;
        let mut cursor = self.root;
        while cursor != NIL {
            parent = cursor;
            cursor = if digest < self.nodes[cursor].digest {
                self.nodes[cursor].left
            } else {
                self.nodes[cursor].right
            };
        }

        let node = self.allocate(digest, value);
        self.nodes[node].parent = parent;
        if parent == NIL {
            self.root = node;
        } else if digest < self.nodes[parent].digest {
            self.nodes[parent].left = node;
        } else {
            self.nodes[parent].right = node;
        }

        self.length += 1;
        self.insert_fixup(node);
        None
    }

    /// Removes the entry stored under `digest` and returns its payload.
    pub fn delete(&mut self, digest: u64) -> Option<V> {
        let target = self.locate(digest);
        if target == NIL {
            return None;
        }

        let mut removed_color = self.nodes[target].color;
        let replacement;

        if self.nodes[target].left == NIL {
            replacement = self.nodes[target].right;
            self.transplant(target, replacement);
        } else if self.nodes[target].right == NIL {
            replacement = self.nodes[target].left;
            self.transplant(target, replacement);
        } else {
            let successor = self.minimum(self.nodes[target].right);
            removed_color = self.nodes[successor].color;
            replacement = self.nodes[successor].right;

            if self.nodes[successor].parent == target {
                self.nodes[replacement].parent = successor;
            } else {
                self.transplant(successor, replacement);
                let right = self.nodes[target].right;
                self.nodes[successor].right = right;
                self.nodes[right].parent = successor;
            }

            self.transplant(target, successor);
            let left = self.nodes[target].left;
            self.nodes[successor].left = left;
            self.nodes[left].parent = successor;
            self.nodes[successor].color = self.nodes[target].color;
        }

        if removed_color == Color::Black {
            self.delete_fixup(replacement);
        }
        self.nodes[NIL].parent = NIL;

        self.length -= 1;
        self.release(target)
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Returns an iterator over `(digest, payload)` pairs in ascending digest order.
    #[must_use]
    pub fn iter(&self) -> OrderedIndexIterator<'_, V> {
        let mut iterator = OrderedIndexIterator {
            index: self,
            stack: Vec::new(),
            remaining: self.length,
        };
        iterator.push_left_spine(self.root);
        iterator
    }

    /// Returns mutable references to every payload, in no particular order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.nodes
            .iter_mut()
            .skip(1)
            .filter_map(|node| node.value.as_mut())
    }

    /// Checks every Red-Black invariant plus ordering and parent links.
    ///
    /// Returns the black height of the tree (sentinel leaves excluded), or a
    /// description of the first violation found.
    ///
    /// # Errors
    ///
    /// Returns `Err` if any structural invariant does not hold.
    pub fn validate(&self) -> Result<usize, String> {
        if self.nodes[NIL].color != Color::Black {
            return Err("sentinel is not black".to_string());
        }
        if self.nodes[self.root].color != Color::Black {
            return Err("root is not black".to_string());
        }
        if self.root != NIL && self.nodes[self.root].parent != NIL {
            return Err("root has a parent".to_string());
        }

        let mut visited = 0;
        let height = self.validate_subtree(self.root, None, None, &mut visited)?;
        if visited != self.length {
            return Err(format!(
                "reachable node count {visited} differs from length {}",
                self.length
            ));
        }
        Ok(height)
    }

    fn validate_subtree(
        &self,
        node: usize,
        lower: Option<u64>,
        upper: Option<u64>,
        visited: &mut usize,
    ) -> Result<usize, String> {
        if node == NIL {
            return Ok(0);
        }
        *visited += 1;

        let current = &self.nodes[node];
        if current.value.is_none() {
            return Err(format!("node {node} is reachable but empty"));
        }
        if lower.is_some_and(|bound| current.digest <= bound)
            || upper.is_some_and(|bound| current.digest >= bound)
        {
            return Err(format!("digest {} breaks ordering", current.digest));
        }
        for child in [current.left, current.right] {
            if child == NIL {
                continue;
            }
            if self.nodes[child].parent != node {
                return Err(format!("node {child} has a stale parent link"));
            }
            if current.color == Color::Red && self.nodes[child].color == Color::Red {
                return Err(format!("red node {} has a red child", current.digest));
            }
        }

        let left_height =
            self.validate_subtree(current.left, lower, Some(current.digest), visited)?;
        let right_height =
            self.validate_subtree(current.right, Some(current.digest), upper, visited)?;
        if left_height != right_height {
            return Err(format!(
                "black height mismatch under {}: {left_height} vs {right_height}",
                current.digest
            ));
        }

        Ok(left_height + usize::from(current.color == Color::Black))
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn locate(&self, digest: u64) -> usize {
        let mut cursor = self.root;
        while cursor != NIL {
            let node = &self.nodes[cursor];
            cursor = match digest.cmp(&node.digest) {
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
                Ordering::Equal => return cursor,
            };
        }
        NIL
    }

    fn allocate(&mut self, digest: u64, value: V) -> usize {
        let node = Node::new_red(digest, value);
        if let Some(index) = self.free.pop() {
            self.nodes[index] = node;
            index
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn release(&mut self, index: usize) -> Option<V> {
        let value = self.nodes[index].value.take();
        self.nodes[index].parent = NIL;
        self.nodes[index].left = NIL;
        self.nodes[index].right = NIL;
        self.free.push(index);
        value
    }

    fn minimum(&self, mut node: usize) -> usize {
        while self.nodes[node].left != NIL {
            node = self.nodes[node].left;
        }
        node
    }

    fn is_red(&self, node: usize) -> bool {
        self.nodes[node].color == Color::Red
    }

    /// Replaces the subtree rooted at `target` with the one rooted at `source`.
    fn transplant(&mut self, target: usize, source: usize) {
        let parent = self.nodes[target].parent;
        if parent == NIL {
            self.root = source;
        } else if target == self.nodes[parent].left {
            self.nodes[parent].left = source;
        } else {
            self.nodes[parent].right = source;
        }
        self.nodes[source].parent = parent;
    }

    fn rotate_left(&mut self, node: usize) {
        let pivot = self.nodes[node].right;
        debug_assert_ne!(pivot, NIL, "rotate_left without a right child");

        let inner = self.nodes[pivot].left;
        self.nodes[node].right = inner;
        if inner != NIL {
            self.nodes[inner].parent = node;
        }

        self.replace_child(node, pivot);
        self.nodes[pivot].left = node;
        self.nodes[node].parent = pivot;
    }

    fn rotate_right(&mut self, node: usize) {
        let pivot = self.nodes[node].left;
        debug_assert_ne!(pivot, NIL, "rotate_right without a left child");

        let inner = self.nodes[pivot].right;
        self.nodes[node].left = inner;
        if inner != NIL {
            self.nodes[inner].parent = node;
        }

        self.replace_child(node, pivot);
        self.nodes[pivot].right = node;
        self.nodes[node].parent = pivot;
    }

    /// Links `pivot` into the position `node` holds under its parent.
    fn replace_child(&mut self, node: usize, pivot: usize) {
        let parent = self.nodes[node].parent;
        self.nodes[pivot].parent = parent;
        if parent == NIL {
            self.root = pivot;
        } else if node == self.nodes[parent].left {
            self.nodes[parent].left = pivot;
        } else {
            self.nodes[parent].right = pivot;
        }
    }

    fn insert_fixup(&mut self, mut node: usize) {
        while self.is_red(self.nodes[node].parent) {
            let parent = self.nodes[node].parent;
            let grandparent = self.nodes[parent].parent;
            debug_assert_ne!(grandparent, NIL, "red parent cannot be the root");

            if parent == self.nodes[grandparent].left {
                let uncle = self.nodes[grandparent].right;
                if self.is_red(uncle) {
                    self.nodes[parent].color = Color::Black;
                    self.nodes[uncle].color = Color::Black;
                    self.nodes[grandparent].color = Color::Red;
                    node = grandparent;
                } else {
                    if node == self.nodes[parent].right {
                        node = parent;
                        self.rotate_left(node);
                    }
                    let parent = self.nodes[node].parent;
                    let grandparent = self.nodes[parent].parent;
                    self.nodes[parent].color = Color::Black;
                    self.nodes[grandparent].color = Color::Red;
                    self.rotate_right(grandparent);
                }
            } else {
                let uncle = self.nodes[grandparent].left;
                if self.is_red(uncle) {
                    self.nodes[parent].color = Color::Black;
                    self.nodes[uncle].color = Color::Black;
                    self.nodes[grandparent].color = Color::Red;
                    node = grandparent;
                } else {
                    if node == self.nodes[parent].left {
                        node = parent;
                        self.rotate_right(node);
                    }
                    let parent = self.nodes[node].parent;
                    let grandparent = self.nodes[parent].parent;
                    self.nodes[parent].color = Color::Black;
                    self.nodes[grandparent].color = Color::Red;
                    self.rotate_left(grandparent);
                }
            }
        }

        let root = self.root;
        self.nodes[root].color = Color::Black;
    }

    fn delete_fixup(&mut self, mut node: usize) {
        while node != self.root && !self.is_red(node) {
            let parent = self.nodes[node].parent;

            if node == self.nodes[parent].left {
                let mut sibling = self.nodes[parent].right;
                debug_assert_ne!(sibling, NIL, "doubly black node without a sibling");

                if self.is_red(sibling) {
                    self.nodes[sibling].color = Color::Black;
                    self.nodes[parent].color = Color::Red;
                    self.rotate_left(parent);
                    sibling = self.nodes[parent].right;
                }

                let near = self.nodes[sibling].left;
                let far = self.nodes[sibling].right;
                if !self.is_red(near) && !self.is_red(far) {
                    self.nodes[sibling].color = Color::Red;
                    node = parent;
                } else {
                    if !self.is_red(far) {
                        self.nodes[near].color = Color::Black;
                        self.nodes[sibling].color = Color::Red;
                        self.rotate_right(sibling);
                        sibling = self.nodes[parent].right;
                    }
                    self.nodes[sibling].color = self.nodes[parent].color;
                    self.nodes[parent].color = Color::Black;
                    let far = self.nodes[sibling].right;
                    self.nodes[far].color = Color::Black;
                    self.rotate_left(parent);
                    node = self.root;
                }
            } else {
                let mut sibling = self.nodes[parent].left;
                debug_assert_ne!(sibling, NIL, "doubly black node without a sibling");

                if self.is_red(sibling) {
                    self.nodes[sibling].color = Color::Black;
                    self.nodes[parent].color = Color::Red;
                    self.rotate_right(parent);
                    sibling = self.nodes[parent].left;
                }

                let near = self.nodes[sibling].right;
                let far = self.nodes[sibling].left;
                if !self.is_red(near) && !self.is_red(far) {
                    self.nodes[sibling].color = Color::Red;
                    node = parent;
                } else {
                    if !self.is_red(far) {
                        self.nodes[near].color = Color::Black;
                        self.nodes[sibling].color = Color::Red;
                        self.rotate_left(sibling);
                        sibling = self.nodes[parent].left;
                    }
                    self.nodes[sibling].color = self.nodes[parent].color;
                    self.nodes[parent].color = Color::Black;
                    let far = self.nodes[sibling].left;
                    self.nodes[far].color = Color::Black;
                    self.rotate_right(parent);
                    node = self.root;
                }
            }
        }

        self.nodes[node].color = Color::Black;
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// In-order iterator over an [`OrderedIndex`].
pub struct OrderedIndexIterator<'a, V> {
    index: &'a OrderedIndex<V>,
    stack: Vec<usize>,
    remaining: usize,
}

impl<V> OrderedIndexIterator<'_, V> {
    fn push_left_spine(&mut self, mut node: usize) {
        while node != NIL {
            self.stack.push(node);
            node = self.index.nodes[node].left;
        }
    }
}

impl<'a, V> Iterator for OrderedIndexIterator<'a, V> {
    type Item = (u64, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        let index = self.index;
        let nodes = &index.nodes;
        self.push_left_spine(nodes[node].right);
        self.remaining -= 1;
        nodes[node]
            .value
            .as_ref()
            .map(|value| (nodes[node].digest, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<V> ExactSizeIterator for OrderedIndexIterator<'_, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<V> Default for OrderedIndex<V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, V> IntoIterator for &'a OrderedIndex<V> {
    type Item = (u64, &'a V);
    type IntoIter = OrderedIndexIterator<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<V: fmt::Debug> fmt::Debug for OrderedIndex<V> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
