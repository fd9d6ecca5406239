//! Versioned array with undo/redo over a shared fat-node lineage.
//!
//! This module provides [`PersistentArray`], an immutable indexed sequence whose
//! every edit produces a new view at the next step of its lineage.
//!
//! # Overview
//!
//! Each index is a [`VersionedSlot`] holding that position's full history. A
//! view is just `(lineage handle, count, step, start step)`, so producing a new
//! version only appends to the touched slots:
//!
//! - O(1) `get` (plus a binary search over the slot's history)
//! - O(1) `add` and `replace` while the view is the lineage's latest
//! - O(N) `insert`, `remove` and `clear`
//! - O(N) `undo` / `redo` (the count is recomputed by scanning)
//! - O(H) for the first mutation after the lineage diverged, where H is the
//!   history recorded up to the view's step
//!
//! # Internal Structure
//!
//! The elements visible at any step occupy the physical slot prefix
//! `[0, count)`. Slots past the count are tombstoned or not yet written at that
//! step, and are reused by later `add`/`insert` calls.
//!
//! # Examples
//!
//! ```rust
//! use palimpsest::persistent::{History, PersistentArray};
//!
//! let first = PersistentArray::new().add(10);
//! let second = first.add(20);
//!
//! assert_eq!(first.to_vec(), vec![10]);
//! assert_eq!(second.to_vec(), vec![10, 20]);
//! assert_eq!(second.undo(), first);
//! ```

use std::fmt;
use std::iter::FromIterator;

use super::content::{Lineage, Reassemble};
use super::error::VersionError;
use super::history::History;
use super::slot::{Step, VersionedSlot};

type Slots<T> = Vec<VersionedSlot<T>>;

impl<T: Clone> Reassemble for Slots<T> {
    fn reassemble(&self, step: Step) -> Self {
        // Slots are only ever pushed at the end, so the ones with history at
        // `step` form a prefix.
        self.iter().map_while(|slot| slot.truncated(step)).collect()
    }

    fn slot_count(&self) -> usize {
        self.len()
    }
}

/// Writes `value` into slot `index`, pushing a new slot when `index` is the
/// physical end.
fn write_slot<T>(slots: &mut Slots<T>, index: usize, step: Step, value: Option<T>) {
    if let Some(slot) = slots.get_mut(index) {
        slot.record(step, value);
    } else {
        debug_assert_eq!(index, slots.len(), "array slots must stay contiguous");
        slots.push(VersionedSlot::new(step, value));
    }
}

// =============================================================================
// PersistentArray Definition
// =============================================================================

/// An immutable, version-aware array.
///
/// Views share storage with every other view of their lineage until one of
/// them mutates from a step that is no longer the latest; that view then
/// reassembles a private copy holding only the history up to its own step.
///
/// # Time Complexity
///
/// | Operation  | Complexity          |
/// |------------|---------------------|
/// | `new`      | O(1)                |
/// | `get`      | O(log H)            |
/// | `add`      | O(1)*               |
/// | `replace`  | O(log H)*           |
/// | `insert`   | O(N)*               |
/// | `remove`   | O(N)*               |
/// | `clear`    | O(N)*               |
/// | `undo`     | O(N)                |
/// | `redo`     | O(N)                |
/// | `len`      | O(1)                |
///
/// \* plus a one-time O(total history) reassembly when called on a view whose
/// lineage has moved past it.
///
/// # Examples
///
/// ```rust
/// use palimpsest::persistent::PersistentArray;
///
/// let array = PersistentArray::new().add("a").add("c");
/// let array = array.insert(1, "b").unwrap();
///
/// assert_eq!(array.to_vec(), vec!["a", "b", "c"]);
/// assert_eq!(array.get(1), Ok("b"));
/// ```
pub struct PersistentArray<T> {
    lineage: Lineage<Slots<T>>,
    length: usize,
    step: Step,
    start_step: Step,
}

impl<T> Clone for PersistentArray<T> {
    fn clone(&self) -> Self {
        Self {
            lineage: self.lineage.clone(),
            length: self.length,
            step: self.step,
            start_step: self.start_step,
        }
    }
}

impl<T> PersistentArray<T> {
    /// Creates a new empty array at step 0 of a fresh lineage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lineage: Lineage::new(Vec::new(), 0),
            length: 0,
            step: 0,
            start_step: 0,
        }
    }

    /// Starts a lineage at `step` whose only history is `values` recorded at
    /// that step, so the new view cannot be undone.
    pub(crate) fn snapshot_at(values: Vec<T>, step: Step) -> Self {
        let length = values.len();
        let slots = values
            .into_iter()
            .map(|value| VersionedSlot::new(step, Some(value)))
            .collect();
        Self {
            lineage: Lineage::new(slots, step),
            length,
            step,
            start_step: step,
        }
    }

    /// Returns the number of elements visible at this view's step.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if no elements are visible at this view's step.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the step this view reads at.
    #[inline]
    #[must_use]
    pub const fn step(&self) -> Step {
        self.step
    }

    /// Returns the earliest step this view can undo to.
    #[inline]
    #[must_use]
    pub const fn lineage_start_step(&self) -> Step {
        self.start_step
    }

    /// Returns the latest step committed anywhere in this view's lineage.
    #[must_use]
    pub fn max_step(&self) -> Step {
        self.lineage.max_step()
    }

    /// Returns `true` if both views read from the same backing content.
    ///
    /// ```rust
    /// use palimpsest::persistent::{History, PersistentArray};
    ///
    /// let base = PersistentArray::new().add(1).add(2);
    /// let extended = base.add(3);
    /// assert!(extended.shares_lineage_with(&base));
    ///
    /// let branched = base.undo().add(9);
    /// assert!(!branched.shares_lineage_with(&base));
    /// ```
    #[must_use]
    pub fn shares_lineage_with(&self, other: &Self) -> bool {
        self.lineage.ptr_eq(&other.lineage)
    }

    fn count_visible_at(&self, step: Step) -> usize {
        self.lineage
            .read(|slots| slots.iter().filter(|slot| slot.is_visible_at(step)).count())
    }

    fn moved_to(&self, step: Step) -> Self {
        tracing::trace!(from = self.step, to = step, "moving array view");
        Self {
            lineage: self.lineage.clone(),
            length: self.count_visible_at(step),
            step,
            start_step: self.start_step,
        }
    }

    const fn check_index(&self, index: usize, bound: usize) -> Result<(), VersionError> {
        if index < bound {
            Ok(())
        } else {
            Err(VersionError::IndexOutOfRange {
                index,
                count: self.length,
            })
        }
    }
}

impl<T: Clone> PersistentArray<T> {
    /// Commits `update` at `self.step + 1` and returns the resulting view.
    fn committed(&self, length: usize, update: impl FnOnce(&mut Slots<T>, Step)) -> Self {
        Self {
            lineage: self.lineage.commit(self.step, update),
            length,
            step: self.step + 1,
            start_step: self.start_step,
        }
    }

    /// Returns the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::IndexOutOfRange`] if `index >= len()`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use palimpsest::persistent::{PersistentArray, VersionError};
    ///
    /// let array = PersistentArray::new().add('x');
    /// assert_eq!(array.get(0), Ok('x'));
    /// assert_eq!(array.get(1), Err(VersionError::IndexOutOfRange { index: 1, count: 1 }));
    /// ```
    pub fn get(&self, index: usize) -> Result<T, VersionError> {
        self.check_index(index, self.length)?;
        self.lineage
            .read(|slots| slots[index].value_at(self.step).cloned())
            .ok_or(VersionError::IndexOutOfRange {
                index,
                count: self.length,
            })
    }

    /// Returns the first element, if any.
    #[must_use]
    pub fn first(&self) -> Option<T> {
        self.get(0).ok()
    }

    /// Returns the last element, if any.
    #[must_use]
    pub fn last(&self) -> Option<T> {
        self.length
            .checked_sub(1)
            .and_then(|index| self.get(index).ok())
    }

    /// Returns a new view with `value` appended.
    #[must_use]
    pub fn add(&self, value: T) -> Self {
        let index = self.length;
        self.committed(self.length + 1, |slots, step| {
            write_slot(slots, index, step, Some(value));
        })
    }

    /// Returns a new view with `value` inserted at `index`, shifting later
    /// elements one position to the right.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::IndexOutOfRange`] if `index > len()`.
    pub fn insert(&self, index: usize, value: T) -> Result<Self, VersionError> {
        self.check_index(index, self.length + 1)?;
        if index == self.length {
            return Ok(self.add(value));
        }

        let own_step = self.step;
        let length = self.length;
        Ok(self.committed(length + 1, |slots, step| {
            for position in index + 1..=length {
                let shifted = slots[position - 1].value_at(own_step).cloned();
                write_slot(slots, position, step, shifted);
            }
            slots[index].record(step, Some(value));
        }))
    }

    /// Returns a new view with the element at `index` replaced by `value`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::IndexOutOfRange`] if `index >= len()`.
    pub fn replace(&self, index: usize, value: T) -> Result<Self, VersionError> {
        self.check_index(index, self.length)?;
        Ok(self.committed(self.length, |slots, step| {
            slots[index].record(step, Some(value));
        }))
    }

    /// Returns a new view without the element at `index`, shifting later
    /// elements one position to the left.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::IndexOutOfRange`] if `index >= len()`.
    pub fn remove(&self, index: usize) -> Result<Self, VersionError> {
        self.check_index(index, self.length)?;

        let own_step = self.step;
        let last = self.length - 1;
        Ok(self.committed(last, |slots, step| {
            for position in index..last {
                let shifted = slots[position + 1].value_at(own_step).cloned();
                slots[position].record(step, shifted);
            }
            slots[last].record(step, None);
        }))
    }

    /// Returns a new, empty view one step later.
    #[must_use]
    pub fn clear(&self) -> Self {
        self.committed(0, |slots, step| {
            for slot in slots.iter_mut() {
                slot.record(step, None);
            }
        })
    }

    /// Returns `true` if `value` is visible at this view's step.
    #[must_use]
    pub fn contains(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.lineage.read(|slots| {
            slots[..self.length]
                .iter()
                .any(|slot| slot.value_at(self.step) == Some(value))
        })
    }

    /// Returns the visible elements as a `Vec`.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.lineage.read(|slots| {
            slots[..self.length]
                .iter()
                .filter_map(|slot| slot.value_at(self.step).cloned())
                .collect()
        })
    }

    /// Returns an iterator over the visible elements.
    ///
    /// The elements are copied out of the shared content when the iterator is
    /// created, so later mutations through other views cannot affect it.
    #[must_use]
    pub fn iter(&self) -> PersistentArrayIterator<T> {
        PersistentArrayIterator {
            inner: self.to_vec().into_iter(),
        }
    }
}

impl<T> History for PersistentArray<T> {
    fn undo(&self) -> Self {
        if self.can_undo() {
            self.moved_to(self.step - 1)
        } else {
            self.clone()
        }
    }

    fn redo(&self) -> Self {
        if self.can_redo() {
            self.moved_to(self.step + 1)
        } else {
            self.clone()
        }
    }

    fn can_undo(&self) -> bool {
        self.step > self.start_step
    }

    fn can_redo(&self) -> bool {
        self.step < self.lineage.max_step()
    }
}

// =============================================================================
// Iterator Implementation
// =============================================================================

/// An owning iterator over a [`PersistentArray`] snapshot.
pub struct PersistentArrayIterator<T> {
    inner: std::vec::IntoIter<T>,
}

impl<T> Iterator for PersistentArrayIterator<T> {
    type Item = T;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> DoubleEndedIterator for PersistentArrayIterator<T> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<T> ExactSizeIterator for PersistentArrayIterator<T> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<T> Default for PersistentArray<T> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> FromIterator<T> for PersistentArray<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |array, value| array.add(value))
    }
}

impl<T: Clone> IntoIterator for &PersistentArray<T> {
    type Item = T;
    type IntoIter = PersistentArrayIterator<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: Clone + PartialEq> PartialEq for PersistentArray<T> {
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length && self.to_vec() == other.to_vec()
    }
}

impl<T: Clone + Eq> Eq for PersistentArray<T> {}

impl<T: Clone + fmt::Debug> fmt::Debug for PersistentArray<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_list().entries(self.iter()).finish()
    }
}

impl<T: Clone + fmt::Display> fmt::Display for PersistentArray<T> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "[")?;
        let mut first = true;
        for element in self {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{element}")?;
        }
        write!(formatter, "]")
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<T> serde::Serialize for PersistentArray<T>
where
    T: serde::Serialize + Clone,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut sequence = serializer.serialize_seq(Some(self.len()))?;
        for element in self {
            sequence.serialize_element(&element)?;
        }
        sequence.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentArrayVisitor<T> {
    marker: std::marker::PhantomData<T>,
}

#[cfg(feature = "serde")]
impl<'de, T> serde::de::Visitor<'de> for PersistentArrayVisitor<T>
where
    T: serde::Deserialize<'de> + Clone,
{
    type Value = PersistentArray<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a sequence")
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let mut array = PersistentArray::new();
        while let Some(element) = access.next_element()? {
            array = array.add(element);
        }
        Ok(array)
    }
}

#[cfg(feature = "serde")]
impl<'de, T> serde::Deserialize<'de> for PersistentArray<T>
where
    T: serde::Deserialize<'de> + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(PersistentArrayVisitor {
            marker: std::marker::PhantomData,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================


// =============================================================================
// Send + Sync Tests (arc feature only)
// =============================================================================
