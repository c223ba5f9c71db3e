//! # List Ordering
//!
//! Pure sort-position arithmetic for per-status lists.
//!
//! ## The Gap-Free Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  For every status, sort positions are exactly 0, 1, ..., n-1           │
//! │                                                                         │
//! │  reorder(watching, from: 0, to: 2)                                     │
//! │                                                                         │
//! │    before:  [A, B, C, D]   positions [0, 1, 2, 3]                      │
//! │    remove A:   [B, C, D]                                               │
//! │    insert at 2: [B, C, A, D]                                           │
//! │    renumber:    positions [0, 1, 2, 3]                                 │
//! │                                                                         │
//! │  move A (watching → completed)                                         │
//! │                                                                         │
//! │    watching  [X, A, Y] → [X, Y]     positions [0, 1]                   │
//! │    completed [P, Q]    → [P, Q, A]  positions [0, 1, 2]                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every function here takes a list already in position order and returns
//! the new order. Renumbering is always by index, so ties cannot occur.

use crate::error::{CoreError, CoreResult};
use crate::types::EntryStatus;

/// Position assigned to an entry appended to a list of `len` entries.
#[inline]
pub fn append_position(len: usize) -> u32 {
    len as u32
}

/// Moves the item at `from` to `to`, returning the new order.
///
/// Both indices must be within `[0, items.len())`.
pub fn reorder<T: Clone>(
    items: &[T],
    status: EntryStatus,
    from: usize,
    to: usize,
) -> CoreResult<Vec<T>> {
    let len = items.len();
    for index in [from, to] {
        if index >= len {
            return Err(CoreError::InvalidIndex { status, index, len });
        }
    }

    let mut ordered = items.to_vec();
    let moved = ordered.remove(from);
    ordered.insert(to, moved);
    Ok(ordered)
}

/// Pairs each item with its index as the new sort position.
pub fn renumber<T>(items: impl IntoIterator<Item = T>) -> Vec<(T, u32)> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| (item, index as u32))
        .collect()
}

/// Returns only the items whose position changes after renumbering.
///
/// `items` are `(id, current_position)` pairs in the desired order.
pub fn changed_positions<T: Clone>(items: &[(T, u32)]) -> Vec<(T, u32)> {
    items
        .iter()
        .enumerate()
        .filter(|(index, (_, current))| *current != *index as u32)
        .map(|(index, (id, _))| (id.clone(), index as u32))
        .collect()
}

/// Checks the gap-free invariant for a list of positions in any order.
pub fn is_contiguous(positions: &[u32]) -> bool {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted
        .iter()
        .enumerate()
        .all(|(index, position)| *position == index as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reorder_forward() {
        let list = ["A", "B", "C", "D"];
        let result = reorder(&list, EntryStatus::Watching, 0, 2).unwrap();
        assert_eq!(result, vec!["B", "C", "A", "D"]);
    }

    #[test]
    fn test_reorder_backward_and_same_index() {
        let list = ["A", "B", "C", "D"];
        assert_eq!(
            reorder(&list, EntryStatus::Watching, 3, 0).unwrap(),
            vec!["D", "A", "B", "C"]
        );
        assert_eq!(
            reorder(&list, EntryStatus::Watching, 1, 1).unwrap(),
            vec!["A", "B", "C", "D"]
        );
    }

    #[test]
    fn test_reorder_rejects_out_of_range() {
        let list = ["A", "B"];
        let err = reorder(&list, EntryStatus::Dropped, 0, 2).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidIndex { index: 2, len: 2, .. }
        ));

        let empty: [&str; 0] = [];
        assert!(reorder(&empty, EntryStatus::Dropped, 0, 0).is_err());
    }

    #[test]
    fn test_changed_positions_after_removal() {
        // [X, A, Y] with A removed leaves Y at position 2
        let remaining = [("X", 0), ("Y", 2)];
        assert_eq!(changed_positions(&remaining), vec![("Y", 1)]);
    }

    #[test]
    fn test_is_contiguous() {
        assert!(is_contiguous(&[]));
        assert!(is_contiguous(&[2, 0, 1]));
        assert!(!is_contiguous(&[0, 2]));
        assert!(!is_contiguous(&[0, 1, 1]));
    }

    #[test]
    fn test_renumber() {
        let numbered = renumber(["B", "C", "A"]);
        assert_eq!(numbered, vec![("B", 0), ("C", 1), ("A", 2)]);
    }
}
