//! # palimpsest
//!
//! Immutable, version-aware collections with undo/redo along a timeline of
//! edits, sharing storage between versions through fat-node persistence.
//!
//! ## Overview
//!
//! - **`PersistentArray`**: an indexed sequence
//! - **`PersistentMap`**: a key/value map indexed by key digest
//! - **`History`**: undo/redo shared by both collections
//! - **`get_in` / `set_in`**: path accessors for nested collections
//!
//! Every edit returns a new view one step further along its lineage. Old views
//! keep reading their own step. Editing from an older view forks a private copy
//! instead of disturbing newer views.
//!
//! ## Feature Flags
//!
//! - `arc`: use `Arc` instead of `Rc` so views can cross threads
//! - `serde`: `Serialize`/`Deserialize` for both collections
//! - `fxhash`: digest map keys with `rustc-hash`'s `FxHasher`
//! - `ahash`: digest map keys with `ahash`'s `AHasher`
//!
//! ## Example
//!
//! ```rust
//! use palimpsest::prelude::*;
//!
//! let draft = PersistentMap::new().add("title", "Draft").unwrap();
//! let published = draft.replace("title", "Final").unwrap();
//!
//! assert_eq!(published.undo().get("title"), Some("Draft"));
//! assert_eq!(published.get("title"), Some("Final"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// # Usage
///
/// ```rust
/// use palimpsest::prelude::*;
/// ```
pub mod prelude {
    pub use crate::persistent::*;
}

pub mod persistent;
