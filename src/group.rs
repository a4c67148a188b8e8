//! Status groups derived from the item store.
//!
//! Groups are recomputed from scratch on every change; a single user's board
//! is small enough that no incremental bookkeeping is kept.

use std::cmp::Ordering;

use serde::Serialize;

use crate::item::{Item, StatusSet};

/// One board column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Group {
    pub status: String,
    pub items: Vec<Item>,
}

/// All columns of a board, in configured status order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupView {
    pub groups: Vec<Group>,
}

impl GroupView {
    pub fn get(&self, status: &str) -> Option<&Group> {
        self.groups.iter().find(|group| group.status == status)
    }

    /// Ids of one column, top to bottom.
    pub fn ids(&self, status: &str) -> Vec<&str> {
        self.get(status)
            .map(|group| group.items.iter().map(|item| item.id.as_str()).collect())
            .unwrap_or_default()
    }

    /// Position of `id` inside its column.
    pub fn position_of(&self, id: &str) -> Option<(&str, usize)> {
        self.groups.iter().find_map(|group| {
            group
                .items
                .iter()
                .position(|item| item.id == id)
                .map(|index| (group.status.as_str(), index))
        })
    }
}

/// Deterministic intra-group ordering: `group_order`, then `created_at`, then id.
pub fn compare_in_group(a: &Item, b: &Item) -> Ordering {
    a.group_order
        .cmp(&b.group_order)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Items of one status, sorted for display.
pub fn ordered_group<'a>(items: &'a [Item], status: &str) -> Vec<&'a Item> {
    let mut group: Vec<&Item> = items.iter().filter(|item| item.status == status).collect();
    group.sort_by(|a, b| compare_in_group(a, b));
    group
}

/// Derive every column, including empty ones.
pub fn groups(items: &[Item], statuses: &StatusSet) -> GroupView {
    GroupView {
        groups: statuses
            .statuses()
            .iter()
            .map(|status| Group {
                status: status.clone(),
                items: ordered_group(items, status).into_iter().cloned().collect(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::ItemDraft;
    use chrono::{TimeZone, Utc};

    fn item(id: &str, status: &str, order: u32, created: i64) -> Item {
        let created_at = Utc.timestamp_opt(created, 0).single().expect("timestamp");
        Item::from_draft(id, ItemDraft::new(id), "owner", status, order, created_at)
    }

    #[test]
    fn groups_sorted_with_tie_breaks() {
        let items = vec![
            item("c", "todo", 1, 5),
            item("b", "todo", 1, 5),
            item("a", "todo", 1, 9),
            item("z", "todo", 0, 100),
            item("d", "done", 4, 0),
        ];
        let view = groups(&items, &StatusSet::default());
        assert_eq!(view.ids("todo"), vec!["z", "b", "c", "a"]);
        assert_eq!(view.ids("done"), vec!["d"]);
    }

    #[test]
    fn every_status_gets_a_column_in_order() {
        let view = groups(&[], &StatusSet::default());
        let statuses: Vec<&str> = view.groups.iter().map(|g| g.status.as_str()).collect();
        assert_eq!(statuses, vec!["todo", "in-progress", "done"]);
        assert!(view.groups.iter().all(|g| g.items.is_empty()));
    }

    #[test]
    fn unknown_statuses_are_not_rendered() {
        let items = vec![item("x", "archived", 0, 0)];
        let view = groups(&items, &StatusSet::default());
        assert!(view.position_of("x").is_none());
    }

    #[test]
    fn position_lookup() {
        let items = vec![item("a", "done", 3, 0), item("b", "done", 9, 0)];
        let view = groups(&items, &StatusSet::default());
        assert_eq!(view.position_of("b"), Some(("done", 1)));
    }
}
