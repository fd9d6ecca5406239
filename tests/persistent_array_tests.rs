//! Unit tests for PersistentArray.
//!
//! Covers the edit operations, their error cases, undo/redo, and the
//! isolation between views that share or fork a lineage.

use palimpsest::persistent::{History, PersistentArray, VersionError};
use rstest::rstest;

fn array_of(values: &[i32]) -> PersistentArray<i32> {
    values.iter().copied().collect()
}

// =============================================================================
// Basic Construction Tests
// =============================================================================

#[rstest]
fn test_new_creates_empty_array() {
    let array: PersistentArray<i32> = PersistentArray::new();
    assert!(array.is_empty());
    assert_eq!(array.len(), 0);
    assert_eq!(array.step(), 0);
    assert_eq!(array.max_step(), 0);
    assert_eq!(array.lineage_start_step(), 0);
}

#[rstest]
fn test_default_creates_empty_array() {
    let array: PersistentArray<String> = PersistentArray::default();
    assert!(array.is_empty());
}

// =============================================================================
// Add and Get Tests
// =============================================================================

#[rstest]
fn test_add_appends_and_advances_step() {
    let empty = PersistentArray::new();
    let a = empty.add(10);
    let b = a.add(20);

    assert_eq!(a.len(), 1);
    assert_eq!(a.get(0), Ok(10));
    assert_eq!(a.step(), 1);

    assert_eq!(b.len(), 2);
    assert_eq!(b.get(1), Ok(20));
    assert_eq!(b.step(), 2);
}

#[rstest]
fn test_add_shares_lineage_while_latest() {
    let a = PersistentArray::new().add(1);
    let b = a.add(2);
    let c = b.add(3);

    assert!(b.shares_lineage_with(&a));
    assert!(c.shares_lineage_with(&a));
    assert_eq!(a.max_step(), 3);
}

#[rstest]
#[case(0)]
#[case(3)]
#[case(100)]
fn test_get_out_of_range_fails(#[case] index: usize) {
    let array = array_of(&[1, 2, 3]);
    let result = array.get(index);
    if index < 3 {
        assert_eq!(result, Ok(1));
    } else {
        assert_eq!(result, Err(VersionError::IndexOutOfRange { index, count: 3 }));
    }
}

// =============================================================================
// Insert Tests
// =============================================================================

#[rstest]
#[case::front(0, vec![9, 1, 2, 3])]
#[case::middle(1, vec![1, 9, 2, 3])]
#[case::before_last(2, vec![1, 2, 9, 3])]
#[case::end(3, vec![1, 2, 3, 9])]
fn test_insert_shifts_later_elements(#[case] index: usize, #[case] expected: Vec<i32>) {
    let array = array_of(&[1, 2, 3]);
    let inserted = array.insert(index, 9).unwrap();

    assert_eq!(inserted.get(index), Ok(9));
    assert_eq!(inserted.len(), 4);
    assert_eq!(inserted.to_vec(), expected);
    assert_eq!(inserted.step(), array.step() + 1);
    assert_eq!(array.to_vec(), vec![1, 2, 3]);
}

#[rstest]
fn test_insert_past_end_fails() {
    let array = array_of(&[1, 2]);
    assert_eq!(
        array.insert(3, 0).unwrap_err(),
        VersionError::IndexOutOfRange { index: 3, count: 2 }
    );
    assert_eq!(array.max_step(), 2);
}

#[rstest]
fn test_insert_into_empty_array() {
    let array = PersistentArray::new().insert(0, "only").unwrap();
    assert_eq!(array.to_vec(), vec!["only"]);
}

// =============================================================================
// Replace Tests
// =============================================================================

#[rstest]
fn test_replace_changes_single_element() {
    let array = array_of(&[1, 2, 3]);
    let replaced = array.replace(1, 20).unwrap();

    assert_eq!(replaced.to_vec(), vec![1, 20, 3]);
    assert_eq!(replaced.len(), 3);
    assert_eq!(array.get(1), Ok(2));
}

#[rstest]
fn test_replace_at_count_fails() {
    let array = array_of(&[1, 2, 3]);
    assert_eq!(
        array.replace(3, 0).unwrap_err(),
        VersionError::IndexOutOfRange { index: 3, count: 3 }
    );
}

// =============================================================================
// Remove Tests
// =============================================================================

#[rstest]
#[case::front(0, vec![2, 3, 4])]
#[case::middle(2, vec![1, 2, 4])]
#[case::back(3, vec![1, 2, 3])]
fn test_remove_shifts_later_elements(#[case] index: usize, #[case] expected: Vec<i32>) {
    let array = array_of(&[1, 2, 3, 4]);
    let removed = array.remove(index).unwrap();

    assert_eq!(removed.to_vec(), expected);
    assert_eq!(removed.len(), 3);
    assert_eq!(removed.get(3), Err(VersionError::IndexOutOfRange { index: 3, count: 3 }));
    assert_eq!(array.to_vec(), vec![1, 2, 3, 4]);
}

#[rstest]
fn test_remove_on_empty_fails() {
    let array: PersistentArray<i32> = PersistentArray::new();
    assert_eq!(
        array.remove(0).unwrap_err(),
        VersionError::IndexOutOfRange { index: 0, count: 0 }
    );
}

#[rstest]
fn test_remove_until_empty_then_refill() {
    let array = array_of(&[1, 2, 3]);
    let emptied = array.remove(0).unwrap().remove(0).unwrap().remove(0).unwrap();
    assert!(emptied.is_empty());

    let refilled = emptied.add(7).add(8);
    assert_eq!(refilled.to_vec(), vec![7, 8]);
    assert_eq!(emptied.undo().to_vec(), vec![3]);
}

// =============================================================================
// Clear Tests
// =============================================================================

#[rstest]
fn test_clear_empties_view_but_not_history() {
    let array = array_of(&[1, 2, 3]);
    let cleared = array.clear();

    assert!(cleared.is_empty());
    assert_eq!(cleared.to_vec(), Vec::<i32>::new());
    assert_eq!(cleared.undo().to_vec(), vec![1, 2, 3]);
    assert_eq!(cleared.add(5).to_vec(), vec![5]);
}

// =============================================================================
// Undo / Redo Tests
// =============================================================================

#[rstest]
fn test_undo_at_lineage_start_is_noop() {
    let empty: PersistentArray<i32> = PersistentArray::new();
    let undone = empty.undo();
    assert_eq!(undone.step(), 0);
    assert!(!empty.can_undo());
}

#[rstest]
fn test_redo_at_latest_step_is_noop() {
    let array = array_of(&[1, 2]);
    assert!(!array.can_redo());
    assert_eq!(array.redo().step(), array.step());
}

#[rstest]
fn test_undo_returns_previous_state() {
    let a = PersistentArray::new().add(10);
    let b = a.add(20);
    let undone = b.undo();

    assert_eq!(undone, a);
    assert_eq!(undone.step(), a.step());
    assert_eq!(undone.len(), 1);
}

#[rstest]
fn test_undo_redo_round_trip() {
    let array = array_of(&[1, 2, 3]).remove(1).unwrap().insert(0, 0).unwrap();
    let round_trip = array.undo().redo();

    assert_eq!(round_trip, array);
    assert_eq!(round_trip.step(), array.step());
    assert_eq!(round_trip.len(), array.len());
}

#[rstest]
fn test_undo_walks_back_to_empty() {
    let array = array_of(&[1, 2, 3]);
    let mut view = array.clone();
    let mut seen = Vec::new();
    while view.can_undo() {
        view = view.undo();
        seen.push(view.to_vec());
    }
    assert_eq!(seen, vec![vec![1, 2], vec![1], vec![]]);
}

#[rstest]
fn test_redo_follows_the_lineage_forward() {
    let array = array_of(&[1, 2, 3]);
    let start = array.undo().undo().undo();
    assert_eq!(start.redo().redo().to_vec(), vec![1, 2]);
    assert!(start.redo().redo().redo().can_undo());
}

// =============================================================================
// Fork Tests
// =============================================================================

#[rstest]
fn test_mutating_older_view_forks() {
    let v1 = array_of(&[1]);
    let v2 = v1.add(2);
    let v1_branch = v1.add(3);

    assert_eq!(v2.to_vec(), vec![1, 2]);
    assert_eq!(v1_branch.to_vec(), vec![1, 3]);
    assert!(!v1_branch.shares_lineage_with(&v2));
    assert!(v2.shares_lineage_with(&v1));
}

#[rstest]
fn test_forked_lineage_keeps_history() {
    let base = array_of(&[1, 2, 3]);
    let newer = base.add(4);
    let branch = base.replace(0, 100).unwrap();

    assert_eq!(branch.step(), 4);
    assert_eq!(branch.max_step(), 4);
    assert_eq!(branch.undo().to_vec(), vec![1, 2, 3]);
    assert_eq!(branch.undo().undo().to_vec(), vec![1, 2]);
    assert_eq!(newer.to_vec(), vec![1, 2, 3, 4]);
    assert_eq!(newer.max_step(), 4);
}

#[rstest]
fn test_undo_then_edit_forks_instead_of_overwriting() {
    let three = array_of(&[1, 2, 3]);
    let two = three.undo();
    let edited = two.add(9);

    assert_eq!(edited.to_vec(), vec![1, 2, 9]);
    assert_eq!(three.to_vec(), vec![1, 2, 3]);
    assert_eq!(two.redo().to_vec(), vec![1, 2, 3]);
    assert!(!edited.shares_lineage_with(&three));
}

#[rstest]
fn test_fork_after_remove_preserves_tombstones() {
    let base = array_of(&[1, 2, 3]);
    let removed = base.remove(0).unwrap();
    let _newer = removed.add(4);
    let branch = removed.insert(1, 7).unwrap();

    assert_eq!(branch.to_vec(), vec![2, 7, 3]);
    assert_eq!(branch.undo().to_vec(), vec![2, 3]);
    assert_eq!(branch.undo().undo().to_vec(), vec![1, 2, 3]);
}

#[rstest]
fn test_sibling_views_at_same_step_do_not_collide() {
    let base = array_of(&[1]);
    let left = base.add(2);
    let right = base.add(3);

    assert_eq!(left.to_vec(), vec![1, 2]);
    assert_eq!(right.to_vec(), vec![1, 3]);
    assert!(left.shares_lineage_with(&base));
    assert!(!right.shares_lineage_with(&base));
}

// =============================================================================
// Iteration Tests
// =============================================================================

#[rstest]
fn test_iter_yields_visible_values_in_order() {
    let array = array_of(&[3, 1, 2]).remove(0).unwrap();
    let collected: Vec<i32> = array.iter().collect();
    assert_eq!(collected, vec![1, 2]);
    assert_eq!(array.iter().len(), 2);
    assert_eq!(array.iter().rev().collect::<Vec<_>>(), vec![2, 1]);
}

#[rstest]
fn test_iter_snapshot_ignores_later_edits() {
    let array = array_of(&[1, 2]);
    let iterator = array.iter();
    let _extended = array.add(3);
    assert_eq!(iterator.collect::<Vec<_>>(), vec![1, 2]);
}

#[rstest]
fn test_equality_ignores_step() {
    let direct = array_of(&[1, 2]);
    let roundabout = array_of(&[1, 2, 3]).remove(2).unwrap();
    assert_eq!(direct, roundabout);
    assert_ne!(direct.step(), roundabout.step());
}
