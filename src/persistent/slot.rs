//! Fat-node value history for a single array index or map key.
//!
//! A [`VersionedSlot`] keeps every value ever written to one position together
//! with the step at which it was written. Reading at step `s` yields the newest
//! entry whose step is `<= s`; a recorded tombstone (`None`) hides the slot from
//! that step until a later entry overwrites it.
//!
//! Entries are kept sorted by step, so lookups are a binary search instead of a
//! scan over the whole history.

use smallvec::SmallVec;

/// A modification step number within one lineage.
pub type Step = u64;

/// Inline capacity of a slot's history before it spills to the heap.
///
/// Most slots are written once or twice, so two entries cover the common case.
const INLINE_HISTORY: usize = 2;

/// The complete value history of one slot.
///
/// # Examples
///
/// ```rust
/// use palimpsest::persistent::VersionedSlot;
///
/// let mut slot = VersionedSlot::new(1, Some("a"));
/// slot.record(3, Some("b"));
/// slot.record(5, None);
///
/// assert_eq!(slot.value_at(0), None);
/// assert_eq!(slot.value_at(2), Some(&"a"));
/// assert_eq!(slot.value_at(4), Some(&"b"));
/// assert_eq!(slot.value_at(5), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionedSlot<T> {
    entries: SmallVec<[(Step, Option<T>); INLINE_HISTORY]>,
}

impl<T> VersionedSlot<T> {
    /// Creates a slot whose history starts with `value` at `step`.
    #[must_use]
    pub fn new(step: Step, value: Option<T>) -> Self {
        let mut entries = SmallVec::new();
        entries.push((step, value));
        Self { entries }
    }

    /// Records `value` at `step`.
    ///
    /// Recording twice at the same step keeps only the last value. Within one
    /// lineage callers always pass the next step, so this is an append.
    pub fn record(&mut self, step: Step, value: Option<T>) {
        let position = self.entries.partition_point(|(entry_step, _)| *entry_step < step);
        match self.entries.get_mut(position) {
            Some(entry) if entry.0 == step => entry.1 = value,
            _ => self.entries.insert(position, (step, value)),
        }
    }

    /// Returns the value visible at `step`, or `None` if the slot is empty or
    /// tombstoned there.
    #[must_use]
    pub fn value_at(&self, step: Step) -> Option<&T> {
        let position = self.entries.partition_point(|(entry_step, _)| *entry_step <= step);
        position
            .checked_sub(1)
            .and_then(|index| self.entries[index].1.as_ref())
    }

    /// Returns `true` if a non-tombstone value is visible at `step`.
    #[inline]
    #[must_use]
    pub fn is_visible_at(&self, step: Step) -> bool {
        self.value_at(step).is_some()
    }

    /// Returns `true` if anything, tombstones included, was recorded at or
    /// before `step`.
    #[inline]
    #[must_use]
    pub fn has_history_at(&self, step: Step) -> bool {
        self.entries
            .first()
            .is_some_and(|(entry_step, _)| *entry_step <= step)
    }

    /// Iterates the entries recorded at or before `step`, oldest first.
    pub fn history_until(&self, step: Step) -> impl Iterator<Item = (Step, Option<&T>)> {
        self.entries
            .iter()
            .take_while(move |(entry_step, _)| *entry_step <= step)
            .map(|(entry_step, value)| (*entry_step, value.as_ref()))
    }

    /// Number of recorded entries, tombstones included.
    #[inline]
    #[must_use]
    pub fn history_len(&self) -> usize {
        self.entries.len()
    }
}

impl<T: Clone> VersionedSlot<T> {
    /// Builds a new slot holding only the history recorded at or before `step`.
    ///
    /// Returns `None` when nothing had been recorded by then.
    #[must_use]
    pub fn truncated(&self, step: Step) -> Option<Self> {
        let mut history = self.history_until(step);
        let (first_step, first_value) = history.next()?;
        let mut slot = Self::new(first_step, first_value.cloned());
        for (entry_step, value) in history {
            slot.record(entry_step, value.cloned());
        }
        Some(slot)
    }
}
