//! Dropping no-op entries from an update's change list.

use chronicle_contracts::details::Change;

/// Whether `change` records an actual difference.
///
/// A `Set` counts when `from` and `to` are not deep-equal. An `Items` change
/// counts when it adds or removes anything.
pub fn is_effective(change: &Change) -> bool {
    match change {
        Change::Set { from, to, .. } => from != to,
        Change::Items { added, removed, .. } => !added.is_empty() || !removed.is_empty(),
    }
}

/// `changes` with every no-op removed, order preserved.
pub fn effective_changes(changes: Vec<Change>) -> Vec<Change> {
    changes.into_iter().filter(is_effective).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_equal_scalars_are_dropped() {
        let kept = effective_changes(vec![
            Change::set("name", "Alice", "Alice"),
            Change::set("email", "a@x.io", "alice@x.io"),
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].field(), "email");
    }

    #[test]
    fn test_nested_values_compare_deeply() {
        let same = Change::set(
            "prefs",
            json!({ "theme": "dark", "tags": [1, 2] }),
            json!({ "tags": [1, 2], "theme": "dark" }),
        );
        let differs = Change::set("prefs", json!({ "tags": [1, 2] }), json!({ "tags": [2, 1] }));
        assert!(!is_effective(&same));
        assert!(is_effective(&differs));
    }

    #[test]
    fn test_null_to_value_is_a_change() {
        assert!(is_effective(&Change::set("phone", json!(null), "555-0100")));
    }

    #[test]
    fn test_items_kept_only_when_nonempty() {
        assert!(!is_effective(&Change::items("roles", vec![], vec![])));
        assert!(is_effective(&Change::items("roles", vec![json!("admin")], vec![])));
        assert!(is_effective(&Change::items("roles", vec![], vec![json!("viewer")])));
    }
}
