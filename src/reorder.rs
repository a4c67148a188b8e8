//! Reorder engine.
//!
//! Computes the status/order assignment produced by moving one item and emits
//! patches only for items whose position actually changed. Affected groups
//! are renumbered densely from 0, which also heals gaps left by deletions.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::group::ordered_group;
use crate::item::{Item, ItemId, Patch, PatchSet, StatusSet};

/// A request to relocate one item, independent of any input technology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveIntent {
    pub item_id: ItemId,
    /// Status the presentation layer believed the item had, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_status: Option<String>,
    pub to_status: String,
    pub to_index: usize,
}

impl MoveIntent {
    pub fn new(item_id: impl Into<ItemId>, to_status: impl Into<String>, to_index: usize) -> Self {
        Self {
            item_id: item_id.into(),
            from_status: None,
            to_status: to_status.into(),
            to_index,
        }
    }

    pub fn from_status(mut self, status: impl Into<String>) -> Self {
        self.from_status = Some(status.into());
        self
    }
}

/// Validate an intent against the current items and compute its patches.
pub fn plan_move(items: &[Item], intent: &MoveIntent, statuses: &StatusSet) -> Result<PatchSet> {
    if let Some(from) = &intent.from_status {
        let current = items
            .iter()
            .find(|item| item.id == intent.item_id)
            .ok_or_else(|| Error::NotFound(intent.item_id.clone()))?;
        if &current.status != from {
            return Err(Error::Validation(format!(
                "item {} is in '{}', not '{from}'",
                intent.item_id, current.status
            )));
        }
    }
    compute_move(
        items,
        &intent.item_id,
        &intent.to_status,
        intent.to_index,
        statuses,
    )
}

/// Move `item_id` to `target_status` at `target_index`.
///
/// The index is clamped to the end of the target group. Returns an empty set
/// when the item already sits at the computed position.
pub fn compute_move(
    items: &[Item],
    item_id: &str,
    target_status: &str,
    target_index: usize,
    statuses: &StatusSet,
) -> Result<PatchSet> {
    statuses.validate(target_status)?;
    let moving = items
        .iter()
        .find(|item| item.id == item_id)
        .ok_or_else(|| Error::NotFound(item_id.to_string()))?;
    let source_status = moving.status.as_str();

    let mut target: Vec<&Item> = ordered_group(items, target_status)
        .into_iter()
        .filter(|item| item.id != item_id)
        .collect();
    let index = target_index.min(target.len());
    if index != target_index {
        debug!(item_id, target_index, clamped = index, "clamped move index");
    }
    target.insert(index, moving);

    let mut patches = renumber(&target, target_status);
    if source_status != target_status {
        let source: Vec<&Item> = ordered_group(items, source_status)
            .into_iter()
            .filter(|item| item.id != item_id)
            .collect();
        patches.extend(renumber(&source, source_status));
    }

    debug!(
        item_id,
        from = source_status,
        to = target_status,
        index,
        patches = patches.len(),
        "computed move"
    );
    Ok(patches)
}

/// Renumber one group densely in its current order.
///
/// Ties on `group_order` keep the group's usual tiebreak, so a column with
/// duplicate orders is made dense without reshuffling anything else.
pub fn compact_group(items: &[Item], status: &str) -> PatchSet {
    renumber(&ordered_group(items, status), status)
}

fn renumber(group: &[&Item], status: &str) -> PatchSet {
    group
        .iter()
        .enumerate()
        .filter_map(|(position, item)| {
            let order = u32::try_from(position).unwrap_or(u32::MAX);
            if item.status == status && item.group_order == order {
                None
            } else {
                Some(Patch::position(item.id.clone(), status, order))
            }
        })
        .collect()
}
