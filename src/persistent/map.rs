//! Versioned key/value map with undo/redo over a shared fat-node lineage.
//!
//! This module provides [`PersistentMap`], an immutable map whose every edit
//! produces a new view at the next step of its lineage.
//!
//! # Overview
//!
//! Each key owns a [`VersionedSlot`] with its full value history. The slots are
//! indexed by an [`OrderedIndex`] keyed by the key's digest (see
//! [`digest_of`]). Keys whose digests collide share one tree node and are told
//! apart by `Eq` inside a small bucket, so a collision never merges two keys.
//!
//! Iteration follows ascending digest order. That order comes from the index
//! layout and carries no meaning for the keys themselves.
//!
//! # Examples
//!
//! ```rust
//! use palimpsest::persistent::PersistentMap;
//!
//! let first = PersistentMap::new().add("x", 1).unwrap();
//! let second = first.replace(&"x", 2).unwrap();
//!
//! assert_eq!(first.get(&"x"), Some(1));
//! assert_eq!(second.get(&"x"), Some(2));
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::iter::FromIterator;

use smallvec::{SmallVec, smallvec};

use super::array::PersistentArray;
use super::content::{Lineage, Reassemble};
use super::digest::digest_of;
use super::error::VersionError;
use super::history::History;
use super::ordered_index::OrderedIndex;
use super::slot::{Step, VersionedSlot};

/// Keys sharing one digest, in insertion order.
type Bucket<K, V> = SmallVec<[(K, VersionedSlot<V>); 1]>;

type KeyIndex<K, V> = OrderedIndex<Bucket<K, V>>;

impl<K: Clone, V: Clone> Reassemble for KeyIndex<K, V> {
    fn reassemble(&self, step: Step) -> Self {
        let mut index = OrderedIndex::new();
        for (digest, bucket) in self {
            let kept: Bucket<K, V> = bucket
                .iter()
                .filter_map(|(key, slot)| slot.truncated(step).map(|slot| (key.clone(), slot)))
                .collect();
            if !kept.is_empty() {
                index.insert(digest, kept);
            }
        }
        index
    }

    fn slot_count(&self) -> usize {
        self.iter().map(|(_, bucket)| bucket.len()).sum()
    }
}

fn slot_of<'a, K, V, Q>(index: &'a KeyIndex<K, V>, key: &Q) -> Option<&'a VersionedSlot<V>>
where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
{
    index
        .find(digest_of(key))?
        .iter()
        .find(|(candidate, _)| candidate.borrow() == key)
        .map(|(_, slot)| slot)
}

fn slot_of_mut<'a, K, V, Q>(
    index: &'a mut KeyIndex<K, V>,
    key: &Q,
) -> Option<&'a mut VersionedSlot<V>>
where
    K: Borrow<Q>,
    Q: Hash + Eq + ?Sized,
{
    index
        .find_mut(digest_of(key))?
        .iter_mut()
        .find(|(candidate, _)| candidate.borrow() == key)
        .map(|(_, slot)| slot)
}

/// Records `value` for `key`, creating its slot (and bucket) on first write.
fn record<K: Hash + Eq, V>(index: &mut KeyIndex<K, V>, key: K, step: Step, value: Option<V>) {
    let digest = digest_of(&key);
    if let Some(bucket) = index.find_mut(digest) {
        match bucket.iter_mut().find(|(candidate, _)| *candidate == key) {
            Some((_, slot)) => slot.record(step, value),
            None => bucket.push((key, VersionedSlot::new(step, value))),
        }
    } else {
        index.insert(digest, smallvec![(key, VersionedSlot::new(step, value))]);
    }
}

// =============================================================================
// PersistentMap Definition
// =============================================================================

/// An immutable, version-aware key/value map.
///
/// Keys must implement `Hash + Eq + Clone`; values must implement `Clone`
/// because reads copy them out of the shared content.
///
/// # Time Complexity
///
/// | Operation      | Complexity   |
/// |----------------|--------------|
/// | `new`          | O(1)         |
/// | `get`          | O(log N)     |
/// | `contains_key` | O(log N)     |
/// | `add`          | O(log N)*    |
/// | `replace`      | O(log N)*    |
/// | `remove`       | O(log N)*    |
/// | `clear`        | O(N)*        |
/// | `undo`/`redo`  | O(N)         |
/// | `len`          | O(1)         |
///
/// \* plus a one-time O(total history) reassembly when called on a view whose
/// lineage has moved past it.
///
/// # Examples
///
/// ```rust
/// use palimpsest::persistent::{History, PersistentMap, VersionError};
///
/// let map = PersistentMap::new().add("a".to_string(), 1).unwrap();
/// assert_eq!(map.add("a".to_string(), 2).unwrap_err(), VersionError::KeyAlreadyExists);
///
/// let removed = map.remove("a");
/// assert!(!removed.contains_key("a"));
/// assert_eq!(removed.undo().get("a"), Some(1));
/// ```
pub struct PersistentMap<K, V> {
    lineage: Lineage<KeyIndex<K, V>>,
    length: usize,
    step: Step,
    start_step: Step,
}

impl<K, V> Clone for PersistentMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            lineage: self.lineage.clone(),
            length: self.length,
            step: self.step,
            start_step: self.start_step,
        }
    }
}

impl<K, V> PersistentMap<K, V> {
    /// Creates a new empty map at step 0 of a fresh lineage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lineage: Lineage::new(OrderedIndex::new(), 0),
            length: 0,
            step: 0,
            start_step: 0,
        }
    }

    /// Returns the number of keys visible at this view's step.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if no keys are visible at this view's step.
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
    #[must_use]
    pub fn shares_lineage_with(&self, other: &Self) -> bool {
        self.lineage.ptr_eq(&other.lineage)
    }

    fn count_visible_at(&self, step: Step) -> usize {
        self.lineage.read(|index| {
            index
                .iter()
                .flat_map(|(_, bucket)| bucket.iter())
                .filter(|(_, slot)| slot.is_visible_at(step))
                .count()
        })
    }

    fn moved_to(&self, step: Step) -> Self {
        tracing::trace!(from = self.step, to = step, "moving map view");
        Self {
            lineage: self.lineage.clone(),
            length: self.count_visible_at(step),
            step,
            start_step: self.start_step,
        }
    }
}

impl<K, V> PersistentMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Commits `update` at `self.step + 1` and returns the resulting view.
    fn committed(&self, length: usize, update: impl FnOnce(&mut KeyIndex<K, V>, Step)) -> Self {
        Self {
            lineage: self.lineage.commit(self.step, update),
            length,
            step: self.step + 1,
            start_step: self.start_step,
        }
    }

    /// Returns the value visible for `key` at this view's step.
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lineage.read(|index| {
            slot_of(index, key)
                .and_then(|slot| slot.value_at(self.step))
                .cloned()
        })
    }

    /// Returns `true` if `key` has a visible value at this view's step.
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lineage.read(|index| {
            slot_of(index, key).is_some_and(|slot| slot.is_visible_at(self.step))
        })
    }

    /// Returns a new view with `key` bound to `value`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::KeyAlreadyExists`] if `key` is already visible.
    pub fn add(&self, key: K, value: V) -> Result<Self, VersionError> {
        if self.contains_key(&key) {
            return Err(VersionError::KeyAlreadyExists);
        }
        Ok(self.committed(self.length + 1, |index, step| {
            record(index, key, step, Some(value));
        }))
    }

    /// Returns a new view without `key`, or an unchanged copy of the receiver
    /// if `key` is not visible.
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if !self.contains_key(key) {
            return self.clone();
        }
        self.committed(self.length - 1, |index, step| {
            if let Some(slot) = slot_of_mut(index, key) {
                slot.record(step, None);
            }
        })
    }

    /// Returns a new view with the value of `key` replaced by `value`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::KeyNotFound`] if `key` is not visible.
    pub fn replace<Q>(&self, key: &Q, value: V) -> Result<Self, VersionError>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        if !self.contains_key(key) {
            return Err(VersionError::KeyNotFound);
        }
        Ok(self.committed(self.length, |index, step| {
            if let Some(slot) = slot_of_mut(index, key) {
                slot.record(step, Some(value));
            }
        }))
    }

    /// Returns a new, empty view one step later.
    #[must_use]
    pub fn clear(&self) -> Self {
        self.committed(0, |index, step| {
            for bucket in index.values_mut() {
                for (_, slot) in bucket.iter_mut() {
                    slot.record(step, None);
                }
            }
        })
    }

    /// Returns the visible entries in digest order.
    ///
    /// The entries are copied out of the shared content when the iterator is
    /// created.
    #[must_use]
    pub fn iter(&self) -> PersistentMapIterator<K, V> {
        let entries: Vec<(K, V)> = self.lineage.read(|index| {
            index
                .iter()
                .flat_map(|(_, bucket)| bucket.iter())
                .filter_map(|(key, slot)| {
                    slot.value_at(self.step)
                        .map(|value| (key.clone(), value.clone()))
                })
                .collect()
        });
        PersistentMapIterator {
            inner: entries.into_iter(),
        }
    }

    /// Returns the visible keys in digest order.
    pub fn keys(&self) -> impl Iterator<Item = K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns the visible values in digest order.
    pub fn values(&self) -> impl Iterator<Item = V> {
        self.iter().map(|(_, value)| value)
    }

    /// Returns the visible values, in digest order, as a new array.
    ///
    /// The array starts its own lineage at this map's step, so it cannot be
    /// undone past the state it was created with.
    ///
    /// ```rust
    /// use palimpsest::persistent::{History, PersistentMap};
    ///
    /// let map = PersistentMap::new().add(1, "one").unwrap();
    /// let array = map.to_persistent_array();
    ///
    /// assert_eq!(array.to_vec(), vec!["one"]);
    /// assert_eq!(array.step(), map.step());
    /// assert!(!array.can_undo());
    /// ```
    #[must_use]
    pub fn to_persistent_array(&self) -> PersistentArray<V> {
        PersistentArray::snapshot_at(self.values().collect(), self.step)
    }

    /// Binds `key` to `value`, adding it if absent and replacing it otherwise.
    fn upsert(&self, key: K, value: V) -> Self {
        if self.contains_key(&key) {
            self.committed(self.length, |index, step| {
                record(index, key, step, Some(value));
            })
        } else {
            self.committed(self.length + 1, |index, step| {
                record(index, key, step, Some(value));
            })
        }
    }
}

impl<K, V> History for PersistentMap<K, V> {
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

/// An owning iterator over a [`PersistentMap`] snapshot.
pub struct PersistentMapIterator<K, V> {
    inner: std::vec::IntoIter<(K, V)>,
}

impl<K, V> Iterator for PersistentMapIterator<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for PersistentMapIterator<K, V> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V> Default for PersistentMap<K, V> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq + Clone, V: Clone> FromIterator<(K, V)> for PersistentMap<K, V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Self::new(), |map, (key, value)| map.upsert(key, value))
    }
}

impl<K: Hash + Eq + Clone, V: Clone> IntoIterator for &PersistentMap<K, V> {
    type Item = (K, V);
    type IntoIter = PersistentMapIterator<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K: Hash + Eq + Clone, V: Clone + PartialEq> PartialEq for PersistentMap<K, V> {
    fn eq(&self, other: &Self) -> bool {
        if self.length != other.length {
            return false;
        }

        self.iter()
            .all(|(key, value)| other.get(&key).is_some_and(|other_value| other_value == value))
    }
}

impl<K: Hash + Eq + Clone, V: Clone + Eq> Eq for PersistentMap<K, V> {}

impl<K, V> fmt::Debug for PersistentMap<K, V>
where
    K: Hash + Eq + Clone + fmt::Debug,
    V: Clone + fmt::Debug,
{
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V> fmt::Display for PersistentMap<K, V>
where
    K: Hash + Eq + Clone + fmt::Display,
    V: Clone + fmt::Display,
{
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        let mut first = true;
        for (key, value) in self {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{key}: {value}")?;
        }
        write!(formatter, "}}")
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K, V> serde::Serialize for PersistentMap<K, V>
where
    K: serde::Serialize + Hash + Eq + Clone,
    V: serde::Serialize + Clone,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self {
            map.serialize_entry(&key, &value)?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
struct PersistentMapVisitor<K, V> {
    key_marker: std::marker::PhantomData<K>,
    value_marker: std::marker::PhantomData<V>,
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::de::Visitor<'de> for PersistentMapVisitor<K, V>
where
    K: serde::Deserialize<'de> + Hash + Eq + Clone,
    V: serde::Deserialize<'de> + Clone,
{
    type Value = PersistentMap<K, V>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let mut map = PersistentMap::new();
        while let Some((key, value)) = access.next_entry()? {
            map = map.upsert(key, value);
        }
        Ok(map)
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V> serde::Deserialize<'de> for PersistentMap<K, V>
where
    K: serde::Deserialize<'de> + Hash + Eq + Clone,
    V: serde::Deserialize<'de> + Clone,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(PersistentMapVisitor {
            key_marker: std::marker::PhantomData,
            value_marker: std::marker::PhantomData,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================


// =============================================================================
// Send + Sync Tests (arc feature only)
// =============================================================================

#[cfg(all(test, feature = "arc"))]
mod send_sync_tests {
    use super::*;
    use rstest::rstest;

    fn is_send_sync<T: Send + Sync>() {}

    #[rstest]
    fn test_map_is_send_sync() {
        is_send_sync::<PersistentMap<i32, String>>();
        is_send_sync::<PersistentMap<String, i32>>();
    }
}
