//! Observable-collection diff and patch.
//!
//! `diff` turns two snapshots of a sequence into an ordered list of
//! [`CollectionAction`]s; `apply` replays such a list onto a live collection.
//! The two are inverse: `apply(diff(a, b))` on `a` yields `b`.
//!
//! Indices in an action list are always relative to the collection state left
//! by the preceding actions, so actions must be applied strictly in order.

use std::convert::Infallible;
use std::fmt::Display;

use serde_json::Value;

use crate::{CollectionAction, CollectionActionKind};

/// Errors raised while applying collection actions
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatchError {
    #[error("{action} action is missing '{field}'")]
    MissingField {
        action: CollectionActionKind,
        field: &'static str,
    },

    #[error("{action} action index {index} is out of range (length {len})")]
    IndexOutOfRange {
        action: CollectionActionKind,
        index: usize,
        len: usize,
    },

    #[error("Collection item could not be decoded: {0}")]
    Decode(String),

    #[error("Collection owner is not a {0}")]
    WrongInstance(String),
}

// ─────────────────────────────────────────────────────────────────────────────
// Diff
// ─────────────────────────────────────────────────────────────────────────────

/// Compute the actions that turn `old` into `new`.
///
/// Elements shared at the start and at the end are skipped. Over the
/// remaining window positions are compared one by one: a position present in
/// both emits `Replace` when the values differ, a position only in `new`
/// emits `Add`, a position only in `old` emits `Remove`. Removes come last and
/// highest index first. `Move` is never produced.
pub fn diff(old: &[Value], new: &[Value]) -> Vec<CollectionAction> {
    let prefix = old
        .iter()
        .zip(new)
        .take_while(|(a, b)| a == b)
        .count();

    let max_suffix = old.len().min(new.len()) - prefix;
    let suffix = old
        .iter()
        .rev()
        .zip(new.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let old_window = &old[prefix..old.len() - suffix];
    let new_window = &new[prefix..new.len() - suffix];

    let mut actions = Vec::new();
    let mut removes = Vec::new();

    for offset in 0..old_window.len().max(new_window.len()) {
        let index = prefix + offset;
        match (old_window.get(offset), new_window.get(offset)) {
            (Some(old_value), Some(new_value)) => {
                if old_value != new_value {
                    actions.push(CollectionAction::replace(vec![new_value.clone()], index));
                }
            }
            (Some(_), None) => removes.push(CollectionAction::remove(index)),
            (None, Some(new_value)) => {
                actions.push(CollectionAction::add(vec![new_value.clone()], index));
            }
            (None, None) => {}
        }
    }

    actions.extend(removes.into_iter().rev());
    actions
}

// ─────────────────────────────────────────────────────────────────────────────
// Apply
// ─────────────────────────────────────────────────────────────────────────────

/// Apply actions to a JSON collection.
pub fn apply_values(items: &mut Vec<Value>, actions: &[CollectionAction]) -> Result<(), PatchError> {
    apply(items, actions, |value| Ok::<_, Infallible>(value.clone()))
}

/// Apply actions to a typed collection, decoding new items with `decode`.
///
/// Stops at the first failing action; actions before it stay applied. A
/// failing action itself leaves the collection untouched.
///
/// `Move` requires both indices to address an existing element. A target
/// one past the end is out of range rather than an append; use `Remove`
/// followed by `Add` to move an item to the end.
pub fn apply<T, F, E>(
    items: &mut Vec<T>,
    actions: &[CollectionAction],
    mut decode: F,
) -> Result<(), PatchError>
where
    F: FnMut(&Value) -> Result<T, E>,
    E: Display,
{
    for action in actions {
        apply_one(items, action, &mut decode)?;
    }
    Ok(())
}

fn apply_one<T, F, E>(
    items: &mut Vec<T>,
    action: &CollectionAction,
    decode: &mut F,
) -> Result<(), PatchError>
where
    F: FnMut(&Value) -> Result<T, E>,
    E: Display,
{
    let kind = action.action;
    match kind {
        CollectionActionKind::Add => {
            let mut index = require(kind, "newStartingIndex", action.new_starting_index)?;
            let new_items = decode_items(kind, action, decode)?;
            if index > items.len() {
                return Err(out_of_range(kind, index, items.len()));
            }
            for item in new_items {
                items.insert(index, item);
                index += 1;
            }
        }
        CollectionActionKind::Remove => {
            let index = require(kind, "oldStartingIndex", action.old_starting_index)?;
            if index >= items.len() {
                return Err(out_of_range(kind, index, items.len()));
            }
            items.remove(index);
        }
        CollectionActionKind::Replace => {
            let start = require(kind, "newStartingIndex", action.new_starting_index)?;
            let new_items = decode_items(kind, action, decode)?;
            // Writing one past the end appends, anything further is a gap
            if start > items.len() {
                return Err(out_of_range(kind, start, items.len()));
            }
            for (offset, item) in new_items.into_iter().enumerate() {
                let index = start + offset;
                if index < items.len() {
                    items[index] = item;
                } else {
                    items.push(item);
                }
            }
        }
        CollectionActionKind::Move => {
            let from = require(kind, "oldStartingIndex", action.old_starting_index)?;
            let to = require(kind, "newStartingIndex", action.new_starting_index)?;
            if from == to {
                return Ok(());
            }
            if from >= items.len() {
                return Err(out_of_range(kind, from, items.len()));
            }
            if to >= items.len() {
                return Err(out_of_range(kind, to, items.len()));
            }
            let item = items.remove(from);
            items.insert(to, item);
        }
    }
    Ok(())
}

fn require(
    action: CollectionActionKind,
    field: &'static str,
    value: Option<usize>,
) -> Result<usize, PatchError> {
    value.ok_or(PatchError::MissingField { action, field })
}

fn decode_items<T, F, E>(
    kind: CollectionActionKind,
    action: &CollectionAction,
    decode: &mut F,
) -> Result<Vec<T>, PatchError>
where
    F: FnMut(&Value) -> Result<T, E>,
    E: Display,
{
    let raw = action.new_items.as_ref().ok_or(PatchError::MissingField {
        action: kind,
        field: "newItems",
    })?;
    raw.iter()
        .map(|value| decode(value).map_err(|e| PatchError::Decode(e.to_string())))
        .collect()
}

fn out_of_range(action: CollectionActionKind, index: usize, len: usize) -> PatchError {
    PatchError::IndexOutOfRange { action, index, len }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn values(items: &[Value]) -> Vec<Value> {
        items.to_vec()
    }

    #[test]
    fn test_diff_insertion_yields_single_add() {
        let old = values(&[json!("a"), json!("b"), json!("c"), json!("d")]);
        let new = values(&[json!("a"), json!("b"), json!("X"), json!("c"), json!("d")]);

        let actions = diff(&old, &new);
        assert_eq!(actions, vec![CollectionAction::add(vec![json!("X")], 2)]);

        let mut patched = old.clone();
        apply_values(&mut patched, &actions).unwrap();
        assert_eq!(patched, new);
    }

    #[test]
    fn test_diff_positional_replace_add_remove() {
        let old = values(&[json!(1), json!(2), json!(3)]);

        let replaced = values(&[json!(1), json!(5), json!(3)]);
        assert_eq!(
            diff(&old, &replaced),
            vec![CollectionAction::replace(vec![json!(5)], 1)]
        );

        let grown = values(&[json!(9), json!(2), json!(3), json!(4)]);
        assert_eq!(
            diff(&old, &grown),
            vec![
                CollectionAction::replace(vec![json!(9)], 0),
                CollectionAction::add(vec![json!(4)], 3),
            ]
        );

        let shrunk = values(&[json!(1)]);
        assert_eq!(
            diff(&old, &shrunk),
            vec![CollectionAction::remove(2), CollectionAction::remove(1)]
        );
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let items = values(&[json!(1), json!({"a": 1})]);
        assert!(diff(&items, &items).is_empty());
        assert!(diff(&[], &[]).is_empty());
    }

    #[test]
    fn test_diff_never_emits_move() {
        let old = values(&[json!(1), json!(2), json!(3)]);
        let new = values(&[json!(2), json!(3), json!(1)]);
        let actions = diff(&old, &new);
        assert!(actions.iter().all(|a| a.action != CollectionActionKind::Move));

        let mut patched = old.clone();
        apply_values(&mut patched, &actions).unwrap();
        assert_eq!(patched, new);
    }

    #[test]
    fn test_apply_move() {
        let mut items = values(&[json!(1), json!(2), json!(3)]);
        apply_values(&mut items, &[CollectionAction::moved(0, 2)]).unwrap();
        assert_eq!(items, values(&[json!(2), json!(3), json!(1)]));

        apply_values(&mut items, &[CollectionAction::moved(1, 1)]).unwrap();
        assert_eq!(items, values(&[json!(2), json!(3), json!(1)]));
    }

    #[test]
    fn test_apply_add_multiple_items_advances_index() {
        let mut items = values(&[json!("a"), json!("d")]);
        apply_values(
            &mut items,
            &[CollectionAction::add(vec![json!("b"), json!("c")], 1)],
        )
        .unwrap();
        assert_eq!(items, values(&[json!("a"), json!("b"), json!("c"), json!("d")]));
    }

    #[test]
    fn test_apply_replace_and_remove() {
        let mut items = values(&[json!(1), json!(2), json!(3)]);
        apply_values(
            &mut items,
            &[
                CollectionAction::replace(vec![json!(20), json!(30)], 1),
                CollectionAction::remove(0),
            ],
        )
        .unwrap();
        assert_eq!(items, values(&[json!(20), json!(30)]));
    }

    #[test]
    fn test_move_target_must_exist() {
        let mut items = values(&[json!("a"), json!("b"), json!("c")]);

        apply_values(&mut items, &[CollectionAction::moved(0, 2)]).unwrap();
        assert_eq!(items, values(&[json!("b"), json!("c"), json!("a")]));

        let err = apply_values(&mut items, &[CollectionAction::moved(0, 3)]).unwrap_err();
        assert_eq!(
            err,
            PatchError::IndexOutOfRange {
                action: CollectionActionKind::Move,
                index: 3,
                len: 3
            }
        );
        assert_eq!(items, values(&[json!("b"), json!("c"), json!("a")]));
    }

    #[test]
    fn test_apply_errors() {
        let mut items = values(&[json!(1)]);

        let err = apply_values(&mut items, &[CollectionAction::remove(3)]).unwrap_err();
        assert_eq!(
            err,
            PatchError::IndexOutOfRange {
                action: CollectionActionKind::Remove,
                index: 3,
                len: 1
            }
        );

        let missing = CollectionAction {
            action: CollectionActionKind::Add,
            new_items: None,
            new_starting_index: Some(0),
            old_starting_index: None,
        };
        assert!(matches!(
            apply_values(&mut items, &[missing]),
            Err(PatchError::MissingField { field: "newItems", .. })
        ));

        // Earlier actions stay applied when a later one fails
        let result = apply_values(
            &mut items,
            &[CollectionAction::add(vec![json!(2)], 1), CollectionAction::moved(0, 9)],
        );
        assert!(result.is_err());
        assert_eq!(items, values(&[json!(1), json!(2)]));
    }

    #[test]
    fn test_apply_typed_collection() {
        let mut items: Vec<i32> = vec![1, 2];
        apply(
            &mut items,
            &[CollectionAction::add(vec![json!(3)], 2)],
            |v| serde_json::from_value::<i32>(v.clone()),
        )
        .unwrap();
        assert_eq!(items, vec![1, 2, 3]);

        let err = apply(
            &mut items,
            &[CollectionAction::add(vec![json!("nope")], 0)],
            |v| serde_json::from_value::<i32>(v.clone()),
        )
        .unwrap_err();
        assert!(matches!(err, PatchError::Decode(_)));
        assert_eq!(items, vec![1, 2, 3]);
    }

    proptest! {
        #[test]
        fn prop_apply_of_diff_reproduces_target(
            old in prop::collection::vec(0u8..6, 0..12),
            new in prop::collection::vec(0u8..6, 0..12),
        ) {
            let old: Vec<Value> = old.into_iter().map(Value::from).collect();
            let new: Vec<Value> = new.into_iter().map(Value::from).collect();

            let mut patched = old.clone();
            apply_values(&mut patched, &diff(&old, &new)).unwrap();
            prop_assert_eq!(patched, new);
        }
    }
}
