//! Path accessors for collections nested inside collections.
//!
//! [`get_in`] and [`set_in`] walk a path of keys through a recursive value
//! type. Each step is a single-key delegation through the [`Keyed`]
//! capability, and [`Nested`] says whether a value is itself a collection to
//! keep walking into.
//!
//! # Examples
//!
//! ```rust
//! use palimpsest::persistent::{get_in, set_in, Nested, PersistentArray};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! enum Cell {
//!     Number(i32),
//!     Row(PersistentArray<Cell>),
//! }
//!
//! impl Nested for Cell {
//!     type Collection = PersistentArray<Cell>;
//!
//!     fn as_collection(&self) -> Option<&Self::Collection> {
//!         match self {
//!             Self::Row(row) => Some(row),
//!             Self::Number(_) => None,
//!         }
//!     }
//!
//!     fn from_collection(collection: Self::Collection) -> Self {
//!         Self::Row(collection)
//!     }
//! }
//!
//! let inner = PersistentArray::new().add(Cell::Number(42));
//! let outer = PersistentArray::new().add(Cell::Row(inner));
//!
//! assert_eq!(get_in(&outer, &[0, 0]), Ok(Some(Cell::Number(42))));
//!
//! let updated = set_in(&outer, &[0, 0], Cell::Number(21)).unwrap();
//! assert_eq!(get_in(&updated, &[0, 0]), Ok(Some(Cell::Number(21))));
//! assert_eq!(get_in(&outer, &[0, 0]), Ok(Some(Cell::Number(42))));
//! ```

use std::hash::Hash;

use super::array::PersistentArray;
use super::error::VersionError;
use super::map::PersistentMap;

/// Single-key read and write on a versioned collection.
pub trait Keyed: Sized {
    /// The key addressing one element.
    type Key;
    /// The element type.
    type Value;

    /// Returns the value stored under `key`, if visible.
    ///
    /// # Errors
    ///
    /// Returns whatever error the collection raises for an invalid key.
    fn lookup(&self, key: &Self::Key) -> Result<Option<Self::Value>, VersionError>;

    /// Returns a new view with the value under `key` replaced.
    ///
    /// # Errors
    ///
    /// Returns whatever error the collection raises when `key` is not present.
    fn assign(&self, key: &Self::Key, value: Self::Value) -> Result<Self, VersionError>;
}

/// A value type that may itself hold a [`Keyed`] collection of its own type.
pub trait Nested: Sized {
    /// The collection variant this value can wrap.
    type Collection: Keyed<Value = Self>;

    /// Returns the wrapped collection, or `None` for a terminal value.
    fn as_collection(&self) -> Option<&Self::Collection>;

    /// Wraps `collection` as a value.
    fn from_collection(collection: Self::Collection) -> Self;
}

impl<T: Clone> Keyed for PersistentArray<T> {
    type Key = usize;
    type Value = T;

    fn lookup(&self, key: &usize) -> Result<Option<T>, VersionError> {
        self.get(*key).map(Some)
    }

    fn assign(&self, key: &usize, value: T) -> Result<Self, VersionError> {
        self.replace(*key, value)
    }
}

impl<K, V> Keyed for PersistentMap<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    type Key = K;
    type Value = V;

    fn lookup(&self, key: &K) -> Result<Option<V>, VersionError> {
        Ok(self.get(key))
    }

    fn assign(&self, key: &K, value: V) -> Result<Self, VersionError> {
        self.replace(key, value)
    }
}

/// Reads the value at the end of `path`.
///
/// Returns `Ok(None)` when the last segment is absent.
///
/// # Errors
///
/// - [`VersionError::EmptyPath`] if `path` is empty.
/// - [`VersionError::PathDepth`] if a non-terminal segment is absent or not a collection.
/// - Any error raised by an individual lookup, such as an out-of-range index.
pub fn get_in<C, V>(root: &C, path: &[C::Key]) -> Result<Option<V>, VersionError>
where
    C: Keyed<Value = V>,
    V: Nested<Collection = C>,
{
    if path.is_empty() {
        return Err(VersionError::EmptyPath);
    }
    read_path(root, path, 0, path.len())
}

fn read_path<C, V>(
    collection: &C,
    path: &[C::Key],
    depth: usize,
    path_length: usize,
) -> Result<Option<V>, VersionError>
where
    C: Keyed<Value = V>,
    V: Nested<Collection = C>,
{
    let Some((segment, rest)) = path.split_first() else {
        return Err(VersionError::EmptyPath);
    };
    if rest.is_empty() {
        return collection.lookup(segment);
    }

    let child = collection.lookup(segment)?;
    let inner = descend(child.as_ref(), depth + 1, path_length)?;
    read_path(inner, rest, depth + 1, path_length)
}

/// Returns a new root with the value at the end of `path` replaced by `value`.
///
/// Every collection along the path is rebuilt with a single assignment, so
/// each level advances its own lineage by one step.
///
/// # Errors
///
/// Same as [`get_in`], plus whatever the final assignment raises (for example
/// [`VersionError::KeyNotFound`] on a map).
pub fn set_in<C, V>(root: &C, path: &[C::Key], value: V) -> Result<C, VersionError>
where
    C: Keyed<Value = V>,
    V: Nested<Collection = C>,
{
    if path.is_empty() {
        return Err(VersionError::EmptyPath);
    }
    write_path(root, path, value, 0, path.len())
}

fn write_path<C, V>(
    collection: &C,
    path: &[C::Key],
    value: V,
    depth: usize,
    path_length: usize,
) -> Result<C, VersionError>
where
    C: Keyed<Value = V>,
    V: Nested<Collection = C>,
{
    let Some((segment, rest)) = path.split_first() else {
        return Err(VersionError::EmptyPath);
    };
    if rest.is_empty() {
        return collection.assign(segment, value);
    }

    let child = collection.lookup(segment)?;
    let inner = descend(child.as_ref(), depth + 1, path_length)?;
    let updated = write_path(inner, rest, value, depth + 1, path_length)?;
    collection.assign(segment, V::from_collection(updated))
}

fn descend<V: Nested>(
    child: Option<&V>,
    depth: usize,
    path_length: usize,
) -> Result<&V::Collection, VersionError> {
    child
        .and_then(Nested::as_collection)
        .ok_or(VersionError::PathDepth { depth, path_length })
}
