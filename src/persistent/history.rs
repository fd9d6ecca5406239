//! Undo/redo over a lineage's timeline.

/// Moving a view backwards and forwards along its lineage.
///
/// Neither operation touches the shared content; both return a view over the
/// same lineage at a neighbouring step. Undo stops at the lineage's start step
/// and redo stops at the lineage's latest committed step, returning an
/// unchanged copy of the receiver in either case.
///
/// A later mutation through an undone view forks the lineage instead of
/// overwriting the steps it skipped.
///
/// # Examples
///
/// ```rust
/// use palimpsest::persistent::{History, PersistentArray};
///
/// let empty: PersistentArray<i32> = PersistentArray::new();
/// let one = empty.add(1);
/// let two = one.add(2);
///
/// let undone = two.undo();
/// assert_eq!(undone.to_vec(), vec![1]);
/// assert_eq!(undone.redo().to_vec(), vec![1, 2]);
/// assert!(!empty.can_undo());
/// ```
pub trait History: Sized {
    /// Returns the view one step earlier, or the receiver at the lineage start.
    #[must_use]
    fn undo(&self) -> Self;

    /// Returns the view one step later, or the receiver at the lineage's latest step.
    #[must_use]
    fn redo(&self) -> Self;

    /// Returns `true` if [`undo`](Self::undo) would move the view.
    fn can_undo(&self) -> bool;

    /// Returns `true` if [`redo`](Self::redo) would move the view.
    fn can_redo(&self) -> bool;
}
