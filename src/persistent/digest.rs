//! Key digests used to position map keys inside the ordered index.
//!
//! The hasher is chosen at compile time:
//!
//! - `fxhash` feature: `rustc_hash::FxHasher`
//! - `ahash` feature (without `fxhash`): `ahash::AHasher` with its fixed default keys
//! - otherwise: `std::collections::hash_map::DefaultHasher`
//!
//! All three are deterministic within a process, which is all the index needs:
//! a key must land on the same digest every time it is looked up.

use std::hash::{Hash, Hasher};

#[cfg(feature = "fxhash")]
type DigestHasher = rustc_hash::FxHasher;

#[cfg(all(feature = "ahash", not(feature = "fxhash")))]
type DigestHasher = ahash::AHasher;

#[cfg(not(any(feature = "fxhash", feature = "ahash")))]
type DigestHasher = std::collections::hash_map::DefaultHasher;

/// Computes the digest of `key`.
///
/// # Examples
///
/// ```rust
/// use palimpsest::persistent::digest_of;
///
/// assert_eq!(digest_of("key"), digest_of(&"key".to_string()));
/// ```
#[inline]
pub fn digest_of<K: Hash + ?Sized>(key: &K) -> u64 {
    let mut hasher = DigestHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}
