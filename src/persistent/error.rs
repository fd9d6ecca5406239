//! Error types for versioned collections.
//!
//! Every fallible operation on [`PersistentArray`](super::PersistentArray),
//! [`PersistentMap`](super::PersistentMap) and the nested-path helpers reports
//! failures through [`VersionError`]. A failed call never touches the receiver
//! or any other view of the same lineage.

use thiserror::Error;

/// Represents errors raised by versioned collection operations.
///
/// # Examples
///
/// ```rust
/// use palimpsest::persistent::{PersistentArray, VersionError};
///
/// let array: PersistentArray<i32> = PersistentArray::new();
/// assert_eq!(
///     array.get(0),
///     Err(VersionError::IndexOutOfRange { index: 0, count: 0 })
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// An array index fell outside the valid range for the operation.
    #[error("index {index} out of range for count {count}")]
    IndexOutOfRange {
        /// The rejected index.
        index: usize,
        /// The number of visible elements at the view's step.
        count: usize,
    },

    /// `add` was called with a key that is already visible.
    #[error("key is already present at this step")]
    KeyAlreadyExists,

    /// `replace` (or a nested assignment) targeted a key that is not visible.
    #[error("key is not present at this step")]
    KeyNotFound,

    /// A non-terminal path segment resolved to something other than a collection.
    #[error("path segment {depth} of {path_length} does not resolve to a collection")]
    PathDepth {
        /// Number of segments consumed before the failure.
        depth: usize,
        /// Total number of segments in the path.
        path_length: usize,
    },

    /// A nested accessor was given no segments at all.
    #[error("nested path must contain at least one segment")]
    EmptyPath,
}
