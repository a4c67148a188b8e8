use std::collections::BTreeMap;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use planboard::group;
use planboard::item::{Item, ItemDraft, StatusSet};
use planboard::reorder::compute_move;
use planboard::store::ItemStore;

const STATUSES: [&str; 3] = ["todo", "in-progress", "done"];

/// Build a dense board from a status index per item.
fn dense_board(columns: &[usize]) -> ItemStore {
    let created = Utc.timestamp_opt(0, 0).single().unwrap();
    let mut next: BTreeMap<usize, u32> = BTreeMap::new();
    let items = columns
        .iter()
        .enumerate()
        .map(|(n, column)| {
            let order = next.entry(*column).or_insert(0);
            let id = format!("i{n}");
            let item = Item::from_draft(id.clone(), ItemDraft::new(id), "u", STATUSES[*column], *order, created);
            *order += 1;
            item
        })
        .collect();
    let mut store = ItemStore::new();
    store.load(items, "u");
    store
}

fn group_orders(store: &ItemStore) -> BTreeMap<String, Vec<u32>> {
    let mut orders: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    for item in store.items() {
        orders.entry(item.status.clone()).or_default().push(item.group_order);
    }
    for values in orders.values_mut() {
        values.sort_unstable();
    }
    orders
}

fn sorted_ids(store: &ItemStore) -> Vec<String> {
    let mut ids: Vec<String> = store.items().iter().map(|item| item.id.clone()).collect();
    ids.sort();
    ids
}

fn moves() -> impl Strategy<Value = Vec<(usize, usize, usize)>> {
    prop::collection::vec((0usize..64, 0usize..3, 0usize..16), 1..12)
}

proptest! {
    #[test]
    fn prop_groups_stay_dense_and_ids_are_conserved(
        columns in prop::collection::vec(0usize..3, 1..16),
        moves in moves(),
    ) {
        let statuses = StatusSet::default();
        let mut store = dense_board(&columns);
        let ids_before = sorted_ids(&store);
        let now = Utc.timestamp_opt(1, 0).single().unwrap();

        for (pick, column, index) in moves {
            let id = store.items()[pick % store.len()].id.clone();
            let patches = compute_move(store.items(), &id, STATUSES[column], index, &statuses).unwrap();
            store.apply_all(&patches, now).unwrap();

            for (status, orders) in group_orders(&store) {
                let expected: Vec<u32> = (0..orders.len() as u32).collect();
                prop_assert_eq!(orders, expected, "column {} is not dense", status);
            }
            prop_assert_eq!(store.get(&id).unwrap().status.as_str(), STATUSES[column]);
        }
        prop_assert_eq!(sorted_ids(&store), ids_before);
    }

    #[test]
    fn prop_repeating_a_move_is_a_noop(
        columns in prop::collection::vec(0usize..3, 1..16),
        pick in 0usize..64,
        column in 0usize..3,
        index in 0usize..20,
    ) {
        let statuses = StatusSet::default();
        let mut store = dense_board(&columns);
        let id = store.items()[pick % store.len()].id.clone();
        let now = Utc.timestamp_opt(1, 0).single().unwrap();

        let patches = compute_move(store.items(), &id, STATUSES[column], index, &statuses).unwrap();
        store.apply_all(&patches, now).unwrap();

        let view = group::groups(store.items(), &statuses);
        let (status, position) = view.position_of(&id).unwrap();
        prop_assert_eq!(status, STATUSES[column]);
        prop_assert!(position <= index);

        let again = compute_move(store.items(), &id, status, position, &statuses).unwrap();
        prop_assert!(again.is_empty());
        let clamped = compute_move(store.items(), &id, STATUSES[column], index, &statuses).unwrap();
        prop_assert!(clamped.is_empty());
    }

    #[test]
    fn prop_restore_undoes_any_move(
        columns in prop::collection::vec(0usize..3, 1..16),
        pick in 0usize..64,
        column in 0usize..3,
        index in 0usize..20,
    ) {
        let statuses = StatusSet::default();
        let mut store = dense_board(&columns);
        let snapshot = store.snapshot();
        let id = store.items()[pick % store.len()].id.clone();
        let now = Utc.timestamp_opt(1, 0).single().unwrap();

        let patches = compute_move(store.items(), &id, STATUSES[column], index, &statuses).unwrap();
        store.apply_all(&patches, now).unwrap();
        store.restore(snapshot.clone());
        prop_assert_eq!(store.snapshot(), snapshot);
    }
}
