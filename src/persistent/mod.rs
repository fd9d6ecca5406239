//! Version-aware (fat-node) persistent collections.
//!
//! This module provides immutable collections whose views share one backing
//! store per lineage and support undo/redo along it:
//!
//! - [`PersistentArray`]: indexed sequence
//! - [`PersistentMap`]: key/value map indexed by key digest
//!
//! # Lineages and Steps
//!
//! Every edit returns a new view at the next step of its lineage. Views at
//! older steps keep reading exactly the state they were created with, because
//! each slot stores its full value history ([`VersionedSlot`]).
//!
//! While a view is the most advanced one of its lineage, edits append to the
//! shared storage in place. Editing from an older view (for example after
//! [`History::undo`]) forks: the view reassembles a private copy holding only
//! the history up to its own step, and the two lineages never share storage
//! again.
//!
//! # Examples
//!
//! ## `PersistentArray`
//!
//! ```rust
//! use palimpsest::persistent::{History, PersistentArray};
//!
//! let empty = PersistentArray::new();
//! let a = empty.add(10);
//! let b = a.add(20);
//!
//! assert_eq!(a.get(0), Ok(10));
//! assert_eq!(b.len(), 2);
//! assert_eq!(empty.undo(), empty);
//! assert_eq!(b.undo(), a);
//!
//! // Branching from an older view leaves the newer one untouched
//! let branch = a.add(99);
//! assert_eq!(branch.to_vec(), vec![10, 99]);
//! assert_eq!(b.to_vec(), vec![10, 20]);
//! ```
//!
//! ## `PersistentMap`
//!
//! ```rust
//! use palimpsest::persistent::PersistentMap;
//!
//! let m1 = PersistentMap::new().add("x", 1).unwrap();
//! let m2 = m1.replace("x", 2).unwrap();
//!
//! assert_eq!(m1.get("x"), Some(1));
//! assert_eq!(m2.get("x"), Some(2));
//! ```
//!
//! # Concurrency
//!
//! Each lineage's storage sits behind a `parking_lot::RwLock`. Reads share the
//! lock; an edit holds the write lock while deciding between in-place mutation
//! and forking, so two views at the same step cannot both append to the shared
//! storage. With the `arc` feature, views are `Send + Sync` for `Send + Sync`
//! element types.

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod array;
mod content;
mod digest;
mod error;
mod history;
mod map;
mod nested;
mod ordered_index;
mod slot;

pub use array::PersistentArray;
pub use array::PersistentArrayIterator;
pub use content::ModificationCount;
pub use content::VersionedContent;
pub use digest::digest_of;
pub use error::VersionError;
pub use history::History;
pub use map::PersistentMap;
pub use map::PersistentMapIterator;
pub use nested::Keyed;
pub use nested::Nested;
pub use nested::get_in;
pub use nested::set_in;
pub use ordered_index::OrderedIndex;
pub use ordered_index::OrderedIndexIterator;
pub use slot::Step;
pub use slot::VersionedSlot;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod reference_counter_tests {
    use super::ReferenceCounter;
    use rstest::rstest;

    #[rstest]
    fn test_reference_counter_strong_count() {
        let reference_counter: ReferenceCounter<i32> = ReferenceCounter::new(42);
        assert_eq!(ReferenceCounter::strong_count(&reference_counter), 1);
        let reference_counter_clone = reference_counter.clone();
        assert_eq!(ReferenceCounter::strong_count(&reference_counter), 2);
        drop(reference_counter_clone);
        assert_eq!(ReferenceCounter::strong_count(&reference_counter), 1);
    }
}
