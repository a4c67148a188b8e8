//! In-memory item store.
//!
//! The store is the only shared mutable state of a board session. It is
//! mutated by reorder output and by load/confirm/rollback, never by the
//! presentation layer directly, and it never touches the network.
//!
//! Every local mutation of an item bumps that item's revision. Pending remote
//! operations remember the revision they produced, so a confirmation or a
//! rollback arriving after a newer local change can be recognised as stale.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{Error, Result};
use crate::item::{Item, ItemId, Patch};

/// Local revision counter of a single item.
pub type Revision = u64;

/// Deep copy of the store contents, used to capture rollback state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    items: Vec<Item>,
}

impl Snapshot {
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }
}

#[derive(Debug, Default)]
pub struct ItemStore {
    items: Vec<Item>,
    revisions: HashMap<ItemId, Revision>,
    clock: Revision,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole collection, e.g. after a fetch.
    ///
    /// Rows owned by anyone other than `owner_id` are dropped.
    pub fn load(&mut self, items: Vec<Item>, owner_id: &str) {
        let total = items.len();
        self.items = items
            .into_iter()
            .filter(|item| item.owner_id == owner_id)
            .collect();
        if self.items.len() != total {
            debug!(
                dropped = total - self.items.len(),
                "ignored rows owned by another principal"
            );
        }
        self.revisions.clear();
        for item in &self.items {
            self.clock += 1;
            self.revisions.insert(item.id.clone(), self.clock);
        }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.items.iter().find(|item| item.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Current revision of `id`, if the item is present.
    pub fn revision(&self, id: &str) -> Option<Revision> {
        self.revisions.get(id).copied()
    }

    /// Apply one patch in place and return the item as it was before.
    pub fn apply(&mut self, patch: &Patch, now: DateTime<Utc>) -> Result<Item> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == patch.id)
            .ok_or_else(|| Error::NotFound(patch.id.clone()))?;
        let previous = item.clone();
        patch.apply_to(item, now);
        self.clock += 1;
        self.revisions.insert(patch.id.clone(), self.clock);
        Ok(previous)
    }

    /// Apply a batch of patches; fails without mutating if any id is unknown.
    pub fn apply_all(&mut self, patches: &[Patch], now: DateTime<Utc>) -> Result<Vec<Item>> {
        if let Some(missing) = patches.iter().find(|patch| !self.contains(&patch.id)) {
            return Err(Error::NotFound(missing.id.clone()));
        }
        patches.iter().map(|patch| self.apply(patch, now)).collect()
    }

    /// Overwrite an item with a known value (rollback or authoritative row).
    pub fn replace(&mut self, item: Item) -> Result<Revision> {
        let slot = self
            .items
            .iter_mut()
            .find(|existing| existing.id == item.id)
            .ok_or_else(|| Error::NotFound(item.id.clone()))?;
        let id = item.id.clone();
        *slot = item;
        self.clock += 1;
        self.revisions.insert(id, self.clock);
        Ok(self.clock)
    }

    pub fn insert(&mut self, item: Item) -> Result<Revision> {
        if self.contains(&item.id) {
            return Err(Error::Validation(format!("item {} already exists", item.id)));
        }
        self.clock += 1;
        self.revisions.insert(item.id.clone(), self.clock);
        self.items.push(item);
        Ok(self.clock)
    }

    pub fn remove(&mut self, id: &str) -> Result<Item> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        self.revisions.remove(id);
        Ok(self.items.remove(index))
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            items: self.items.clone(),
        }
    }

    /// Reinstate a snapshot wholesale.
    pub fn restore(&mut self, snapshot: Snapshot) {
        let owner = snapshot.items.first().map(|item| item.owner_id.clone());
        match owner {
            Some(owner) => self.load(snapshot.items, &owner),
            None => {
                self.items.clear();
                self.revisions.clear();
            }
        }
    }

    /// Order index that appends to the end of `status`, tolerating gaps.
    pub fn next_group_order(&self, status: &str) -> u32 {
        self.items
            .iter()
            .filter(|item| item.status == status)
            .map(|item| item.group_order.saturating_add(1))
            .max()
            .unwrap_or(0)
    }
}
