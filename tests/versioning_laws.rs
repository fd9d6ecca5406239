//! Property-based tests for the versioning laws of PersistentArray and
//! PersistentMap.
//!
//! Each property drives a random sequence of edits, each applied to a randomly
//! chosen earlier view, so both the in-place and the forking paths are hit.
//! Every view produced along the way is checked against a plain model at the
//! end.

use std::collections::HashMap;

use palimpsest::persistent::{History, PersistentArray, PersistentMap};
use proptest::prelude::*;

// =============================================================================
// Strategies for Generating Test Data
// =============================================================================

#[derive(Clone, Debug)]
enum ArrayOperation {
    Add(i32),
    Insert(usize, i32),
    Replace(usize, i32),
    Remove(usize),
    Clear,
    Undo,
    Redo,
}

fn array_operation() -> impl Strategy<Value = ArrayOperation> {
    prop_oneof![
        4 => any::<i32>().prop_map(ArrayOperation::Add),
        2 => (any::<usize>(), any::<i32>()).prop_map(|(index, value)| ArrayOperation::Insert(index, value)),
        2 => (any::<usize>(), any::<i32>()).prop_map(|(index, value)| ArrayOperation::Replace(index, value)),
        2 => any::<usize>().prop_map(ArrayOperation::Remove),
        1 => Just(ArrayOperation::Clear),
        1 => Just(ArrayOperation::Undo),
        1 => Just(ArrayOperation::Redo),
    ]
}

#[derive(Clone, Debug)]
enum MapOperation {
    Add(u8, i32),
    Replace(u8, i32),
    Remove(u8),
    Clear,
    Undo,
    Redo,
}

fn map_operation() -> impl Strategy<Value = MapOperation> {
    prop_oneof![
        4 => (0..16_u8, any::<i32>()).prop_map(|(key, value)| MapOperation::Add(key, value)),
        2 => (0..16_u8, any::<i32>()).prop_map(|(key, value)| MapOperation::Replace(key, value)),
        2 => (0..16_u8).prop_map(MapOperation::Remove),
        1 => Just(MapOperation::Clear),
        1 => Just(MapOperation::Undo),
        1 => Just(MapOperation::Redo),
    ]
}

/// Applies `operation` to `view`, returning the new view and its expected contents.
///
/// Undo/redo have no model of their own: their expectation is read back from
/// the view itself and checked for stability later.
fn apply_array(
    view: &PersistentArray<i32>,
    model: &[i32],
    operation: &ArrayOperation,
) -> (PersistentArray<i32>, Vec<i32>) {
    let length = model.len();
    let mut expected = model.to_vec();
    let next = match *operation {
        ArrayOperation::Add(value) => {
            expected.push(value);
            view.add(value)
        }
        ArrayOperation::Insert(index, value) => {
            let index = index % (length + 1);
            expected.insert(index, value);
            view.insert(index, value).unwrap()
        }
        ArrayOperation::Replace(index, value) if length > 0 => {
            let index = index % length;
            expected[index] = value;
            view.replace(index, value).unwrap()
        }
        ArrayOperation::Remove(index) if length > 0 => {
            let index = index % length;
            expected.remove(index);
            view.remove(index).unwrap()
        }
        ArrayOperation::Replace(..) | ArrayOperation::Remove(_) => {
            assert!(view.remove(0).is_err());
            view.clone()
        }
        ArrayOperation::Clear => {
            expected.clear();
            view.clear()
        }
        ArrayOperation::Undo => {
            let undone = view.undo();
            expected = undone.to_vec();
            undone
        }
        ArrayOperation::Redo => {
            let redone = view.redo();
            expected = redone.to_vec();
            redone
        }
    };
    (next, expected)
}

fn apply_map(
    view: &PersistentMap<u8, i32>,
    model: &HashMap<u8, i32>,
    operation: &MapOperation,
) -> (PersistentMap<u8, i32>, HashMap<u8, i32>) {
    let mut expected = model.clone();
    let next = match *operation {
        MapOperation::Add(key, value) => {
            if expected.contains_key(&key) {
                assert!(view.add(key, value).is_err());
                view.clone()
            } else {
                expected.insert(key, value);
                view.add(key, value).unwrap()
            }
        }
        MapOperation::Replace(key, value) => {
            if let Some(slot) = expected.get_mut(&key) {
                *slot = value;
                view.replace(&key, value).unwrap()
            } else {
                assert!(view.replace(&key, value).is_err());
                view.clone()
            }
        }
        MapOperation::Remove(key) => {
            expected.remove(&key);
            view.remove(&key)
        }
        MapOperation::Clear => {
            expected.clear();
            view.clear()
        }
        MapOperation::Undo => {
            let undone = view.undo();
            expected = undone.iter().collect();
            undone
        }
        MapOperation::Redo => {
            let redone = view.redo();
            expected = redone.iter().collect();
            redone
        }
    };
    (next, expected)
}

// =============================================================================
// Isolation Laws
// =============================================================================

proptest! {
    /// Law: every view keeps reading the state it was created with, whatever
    /// happens to other views of the same or forked lineages afterwards.
    #[test]
    fn prop_array_views_are_isolated(
        script in prop::collection::vec((any::<prop::sample::Index>(), array_operation()), 1..60)
    ) {
        let mut views = vec![(PersistentArray::new(), Vec::new())];
        for (base, operation) in &script {
            let (view, model) = &views[base.index(views.len())];
            let produced = apply_array(view, model, operation);
            prop_assert_eq!(produced.0.to_vec(), produced.1.clone());
            prop_assert_eq!(produced.0.len(), produced.1.len());
            views.push(produced);
        }

        for (view, model) in &views {
            prop_assert_eq!(&view.to_vec(), model);
            prop_assert_eq!(view.len(), model.len());
            prop_assert!(view.step() <= view.max_step());
        }
    }

    /// Law: the map counterpart of `prop_array_views_are_isolated`.
    #[test]
    fn prop_map_views_are_isolated(
        script in prop::collection::vec((any::<prop::sample::Index>(), map_operation()), 1..60)
    ) {
        let mut views = vec![(PersistentMap::new(), HashMap::new())];
        for (base, operation) in &script {
            let (view, model) = &views[base.index(views.len())];
            let produced = apply_map(view, model, operation);
            prop_assert_eq!(produced.0.iter().collect::<HashMap<_, _>>(), produced.1.clone());
            views.push(produced);
        }

        for (view, model) in &views {
            prop_assert_eq!(&view.iter().collect::<HashMap<_, _>>(), model);
            prop_assert_eq!(view.len(), model.len());
            for (key, value) in model {
                prop_assert_eq!(view.get(key), Some(*value));
            }
            prop_assert!(view.step() <= view.max_step());
        }
    }
}

// =============================================================================
// Undo / Redo Laws
// =============================================================================

proptest! {
    /// Law: undo followed by redo is observably the identity.
    #[test]
    fn prop_array_undo_redo_round_trip(
        values in prop::collection::vec(any::<i32>(), 1..30),
        removals in prop::collection::vec(any::<usize>(), 0..10)
    ) {
        let mut array: PersistentArray<i32> = values.into_iter().collect();
        for index in removals {
            if array.is_empty() {
                break;
            }
            array = array.remove(index % array.len()).unwrap();
        }

        let round_trip = array.undo().redo();
        prop_assert_eq!(round_trip.step(), array.step());
        prop_assert_eq!(round_trip.len(), array.len());
        prop_assert_eq!(round_trip.to_vec(), array.to_vec());
    }

    /// Law: undoing every step of a lineage replays each intermediate state.
    #[test]
    fn prop_undo_visits_every_prefix(values in prop::collection::vec(any::<i32>(), 0..30)) {
        let array: PersistentArray<i32> = values.iter().copied().collect();
        let mut view = array;
        for length in (0..values.len()).rev() {
            view = view.undo();
            prop_assert_eq!(view.to_vec(), values[..length].to_vec());
        }
        prop_assert!(!view.can_undo());
        prop_assert_eq!(view.undo().step(), 0);
    }

    /// Law: undo then redo on a map restores the same entries and count.
    #[test]
    fn prop_map_undo_redo_round_trip(
        entries in prop::collection::vec((any::<u8>(), any::<i32>()), 1..30),
        removed in any::<u8>()
    ) {
        let map: PersistentMap<u8, i32> = entries.into_iter().collect();
        let map = map.remove(&removed);

        let round_trip = map.undo().redo();
        prop_assert_eq!(round_trip.len(), map.len());
        prop_assert_eq!(round_trip, map);
    }
}

// =============================================================================
// Fork Laws
// =============================================================================

proptest! {
    /// Law: given v2 derived from v1, a later edit of v1 never shows through v2.
    #[test]
    fn prop_fork_does_not_affect_newer_view(
        values in prop::collection::vec(any::<i32>(), 0..20),
        first in any::<i32>(),
        second in any::<i32>()
    ) {
        let v1: PersistentArray<i32> = values.iter().copied().collect();
        let v2 = v1.add(first);
        let branch = v1.insert(0, second).unwrap();

        let mut expected_v2 = values.clone();
        expected_v2.push(first);
        let mut expected_branch = values;
        expected_branch.insert(0, second);

        prop_assert_eq!(v2.to_vec(), expected_v2);
        prop_assert_eq!(branch.to_vec(), expected_branch);
        prop_assert!(!branch.shares_lineage_with(&v2));
        prop_assert_eq!(branch.undo(), v1);
    }
}
