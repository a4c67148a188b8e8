//! Board controller.
//!
//! Owns the item store for one session and runs every user intent through
//! the optimistic-update cycle:
//!
//! ```text
//! Idle -> OptimisticallyApplied -> Confirmed
//!                               \-> RolledBack
//! ```
//!
//! Moves can overlap. [`Board::begin_move`] applies a move locally and hands
//! back a [`PendingMove`]; [`Board::finish_move`] settles it once the remote
//! result is known. Settlement compares item revisions, so a late result for
//! an item that has since been changed again locally is discarded.
//!
//! A rollback that skips such items can leave a column with duplicate orders.
//! The touched columns are compacted locally right away and queued; once no
//! move is in flight [`Board::flush_repairs`] writes their full positions.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::calendar::{self, WeekAgenda};
use crate::error::{Error, Result};
use crate::group::{self, GroupView};
use crate::item::{FieldEdit, Item, ItemDraft, ItemId, Patch, PatchSet, StatusSet};
use crate::reorder::{compact_group, plan_move, MoveIntent};
use crate::session::SessionContext;
use crate::stats::{self, BoardStats};
use crate::store::{ItemStore, Revision};
use crate::sync::SyncAdapter;

/// Lifecycle of a single move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveState {
    Idle,
    OptimisticallyApplied,
    Confirmed,
    RolledBack,
}

/// A move applied locally and awaiting its remote result.
#[derive(Debug)]
#[must_use = "a pending move must be settled with Board::finish_move"]
pub struct PendingMove {
    intent: MoveIntent,
    patches: PatchSet,
    previous: Vec<(Item, Revision)>,
    state: MoveState,
    applied_at: DateTime<Utc>,
}

impl PendingMove {
    pub fn intent(&self) -> &MoveIntent {
        &self.intent
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn state(&self) -> MoveState {
        self.state
    }

    /// Whether the move changed nothing and needs no remote round-trip.
    pub fn is_noop(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn applied_at(&self) -> DateTime<Utc> {
        self.applied_at
    }
}

/// What a settled move did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveReport {
    pub item_id: ItemId,
    pub state: MoveState,
    pub updates: usize,
    /// Items whose local state was changed again before this move settled.
    pub superseded: Vec<ItemId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    MoveRolledBack,
    CreateFailed,
    EditFailed,
    DeleteFailed,
    RepairFailed,
}

/// User-visible, non-blocking notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub item_ids: Vec<ItemId>,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct BoardOptions {
    /// Limit the board to one project.
    pub project: Option<String>,
    /// Re-fetch after every confirmed move once nothing else is in flight.
    pub refetch_after_move: bool,
}

#[derive(Debug)]
pub struct Board {
    store: ItemStore,
    sync: SyncAdapter,
    options: BoardOptions,
    notices: Vec<Notice>,
    in_flight: usize,
    needs_refresh: bool,
    repair_groups: BTreeSet<String>,
}

impl Board {
    pub fn new(sync: SyncAdapter, options: BoardOptions) -> Self {
        Self {
            store: ItemStore::new(),
            sync,
            options,
            notices: Vec::new(),
            in_flight: 0,
            needs_refresh: false,
            repair_groups: BTreeSet::new(),
        }
    }

    pub fn statuses(&self) -> &StatusSet {
        self.sync.statuses()
    }

    pub fn store(&self) -> &ItemStore {
        &self.store
    }

    pub fn items(&self) -> &[Item] {
        self.store.items()
    }

    pub fn view(&self) -> GroupView {
        group::groups(self.store.items(), self.statuses())
    }

    pub fn stats(&self, now: DateTime<Utc>) -> BoardStats {
        stats::compute(self.store.items(), self.statuses(), now)
    }

    pub fn agenda(&self, week_start: chrono::NaiveDate) -> WeekAgenda {
        calendar::week_agenda(self.store.items(), week_start)
    }

    /// Moves applied locally and not yet settled.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh
    }

    /// Columns compacted locally whose positions are not yet written back.
    pub fn pending_repairs(&self) -> Vec<String> {
        self.repair_groups.iter().cloned().collect()
    }

    /// Take all pending notifications.
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Replace local state with the store's authoritative rows.
    pub async fn refresh(&mut self, ctx: &SessionContext) -> Result<()> {
        let items = self
            .sync
            .fetch(ctx, self.options.project.as_deref())
            .await?;
        self.store.load(items, ctx.user_id());
        self.needs_refresh = false;
        debug!(items = self.store.len(), "board refreshed");
        Ok(())
    }

    /// Compute a move and apply it optimistically.
    ///
    /// Validation and lookup errors surface here, before any local mutation.
    pub fn begin_move(
        &mut self,
        ctx: &SessionContext,
        intent: MoveIntent,
        now: DateTime<Utc>,
    ) -> Result<PendingMove> {
        let patches = plan_move(self.store.items(), &intent, self.statuses())?;
        if patches.is_empty() {
            debug!(item_id = %intent.item_id, "move is a no-op");
            return Ok(PendingMove {
                intent,
                patches,
                previous: Vec::new(),
                state: MoveState::Confirmed,
                applied_at: now,
            });
        }

        let before = self.store.apply_all(&patches, now)?;
        let patches = self.stamp(patches);
        let previous = before
            .into_iter()
            .map(|item| {
                let revision = self.store.revision(&item.id).unwrap_or_default();
                (item, revision)
            })
            .collect();
        self.in_flight += 1;
        debug!(
            user = ctx.user_id(),
            item_id = %intent.item_id,
            updates = patches.len(),
            "move applied optimistically"
        );
        Ok(PendingMove {
            intent,
            patches,
            previous,
            state: MoveState::OptimisticallyApplied,
            applied_at: now,
        })
    }

    /// Settle a pending move with the outcome of its remote persist.
    ///
    /// On failure every item of the move that has not been changed since is
    /// reverted, a notice is recorded and the remote error is returned.
    pub fn finish_move(
        &mut self,
        mut pending: PendingMove,
        outcome: Result<()>,
    ) -> Result<MoveReport> {
        if pending.state != MoveState::OptimisticallyApplied {
            return Ok(self.report(&pending, Vec::new()));
        }
        self.in_flight = self.in_flight.saturating_sub(1);

        match outcome {
            Ok(()) => {
                pending.state = MoveState::Confirmed;
                let superseded = self.superseded(&pending);
                if !superseded.is_empty() {
                    debug!(?superseded, "confirmation arrived after newer local changes");
                }
                Ok(self.report(&pending, superseded))
            }
            Err(err) => {
                pending.state = MoveState::RolledBack;
                let superseded = self.superseded(&pending);
                let touched = touched_groups(&pending);
                for (item, revision) in std::mem::take(&mut pending.previous) {
                    if self.store.revision(&item.id) == Some(revision) {
                        self.store.replace(item)?;
                    }
                }
                if !superseded.is_empty() {
                    warn!(
                        ?superseded,
                        "rollback skipped items changed by a later move"
                    );
                    for status in &touched {
                        let patches = compact_group(self.store.items(), status);
                        self.store.apply_all(&patches, pending.applied_at)?;
                    }
                    self.repair_groups.extend(touched);
                    self.needs_refresh = true;
                }
                warn!(item_id = %pending.intent.item_id, error = %err, "move rolled back");
                self.notices.push(Notice {
                    kind: NoticeKind::MoveRolledBack,
                    item_ids: failed_ids(&err, &pending.intent.item_id),
                    message: format!("Failed to move task: {err}"),
                });
                Err(err)
            }
        }
    }

    /// Run a whole move: optimistic apply, persist, settle.
    pub async fn move_item(
        &mut self,
        ctx: &SessionContext,
        intent: MoveIntent,
        now: DateTime<Utc>,
    ) -> Result<MoveReport> {
        let pending = self.begin_move(ctx, intent, now)?;
        if pending.is_noop() {
            return self.finish_move(pending, Ok(()));
        }

        let outcome = self.sync.persist(ctx, pending.patches(), now).await;
        let settled = self.finish_move(pending, outcome);
        if self.in_flight == 0
            && self.flush_repairs(ctx, now).await.is_ok()
            && (self.needs_refresh || (settled.is_ok() && self.options.refetch_after_move))
        {
            if let Err(err) = self.refresh(ctx).await {
                warn!(error = %err, "refresh after move failed");
                self.needs_refresh = true;
            }
        }
        settled
    }

    /// Write back the full positions of every column compacted by a rollback.
    ///
    /// Does nothing while moves are still in flight. On failure the columns
    /// stay queued and a notice is recorded.
    pub async fn flush_repairs(&mut self, ctx: &SessionContext, now: DateTime<Utc>) -> Result<()> {
        if self.in_flight > 0 || self.repair_groups.is_empty() {
            return Ok(());
        }

        let groups = std::mem::take(&mut self.repair_groups);
        let mut patches = PatchSet::new();
        for status in &groups {
            let compacted = compact_group(self.store.items(), status);
            self.store.apply_all(&compacted, now)?;
            patches.extend(
                group::ordered_group(self.store.items(), status)
                    .into_iter()
                    .map(|item| {
                        Patch::position(item.id.clone(), status.clone(), item.group_order)
                            .stamped(item.updated_at)
                    }),
            );
        }

        match self.sync.persist(ctx, &patches, now).await {
            Ok(()) => {
                info!(groups = ?groups, updates = patches.len(), "repaired column orders");
                Ok(())
            }
            Err(err) => {
                warn!(groups = ?groups, error = %err, "column repair failed");
                let item_ids = match &err {
                    Error::RemoteFailure { failed, .. } if !failed.is_empty() => failed.clone(),
                    _ => patches.iter().map(|patch| patch.id.clone()).collect(),
                };
                self.notices.push(Notice {
                    kind: NoticeKind::RepairFailed,
                    item_ids,
                    message: format!("Failed to save task order: {err}"),
                });
                self.repair_groups.extend(groups);
                Err(err)
            }
        }
    }

    /// Create an item at the end of the default group.
    pub async fn create_item(
        &mut self,
        ctx: &SessionContext,
        mut draft: ItemDraft,
        now: DateTime<Utc>,
    ) -> Result<Item> {
        draft.validate()?;
        if draft.project_id.is_none() {
            draft.project_id = self.options.project.clone();
        }
        let status = self.statuses().default_status().to_string();
        let order = self.store.next_group_order(&status);
        let item = Item::from_draft(
            Uuid::new_v4().to_string(),
            draft,
            ctx.user_id(),
            status,
            order,
            now,
        );
        let revision = self.store.insert(item.clone())?;

        match self.sync.insert(ctx, &item).await {
            Ok(stored) => {
                if self.store.revision(&stored.id) == Some(revision) {
                    self.store.replace(stored.clone())?;
                }
                info!(id = %stored.id, "task created");
                Ok(stored)
            }
            Err(err) => {
                if self.store.revision(&item.id) == Some(revision) {
                    self.store.remove(&item.id)?;
                }
                self.notices.push(Notice {
                    kind: NoticeKind::CreateFailed,
                    item_ids: vec![item.id.clone()],
                    message: format!("Failed to create task: {err}"),
                });
                Err(err)
            }
        }
    }

    /// Edit fields of one item; status and order only change through moves.
    pub async fn edit_item(
        &mut self,
        ctx: &SessionContext,
        id: &str,
        edit: FieldEdit,
        now: DateTime<Utc>,
    ) -> Result<Item> {
        edit.validate()?;
        if edit.is_empty() {
            return self
                .store
                .get(id)
                .cloned()
                .ok_or_else(|| Error::NotFound(id.to_string()));
        }

        let patch = Patch::edit(id, edit);
        let previous = self.store.apply(&patch, now)?;
        let revision = self.store.revision(id).unwrap_or_default();
        let stamp = self.store.get(id).map_or(now, |item| item.updated_at);

        match self.sync.update_fields(ctx, id, &patch.fields, stamp).await {
            Ok(()) => self
                .store
                .get(id)
                .cloned()
                .ok_or_else(|| Error::NotFound(id.to_string())),
            Err(err) => {
                if self.store.revision(id) == Some(revision) {
                    self.store.replace(previous)?;
                }
                self.notices.push(Notice {
                    kind: NoticeKind::EditFailed,
                    item_ids: vec![id.to_string()],
                    message: format!("Failed to update task: {err}"),
                });
                Err(err)
            }
        }
    }

    /// Delete one item. Remaining orders keep their gap.
    pub async fn delete_item(&mut self, ctx: &SessionContext, id: &str) -> Result<Item> {
        let removed = self.store.remove(id)?;
        match self.sync.delete(ctx, id).await {
            Ok(()) => {
                info!(id, "task deleted");
                Ok(removed)
            }
            Err(err) => {
                if !self.store.contains(id) {
                    self.store.insert(removed)?;
                }
                self.notices.push(Notice {
                    kind: NoticeKind::DeleteFailed,
                    item_ids: vec![id.to_string()],
                    message: format!("Failed to delete task: {err}"),
                });
                Err(err)
            }
        }
    }

    /// Stamp each patch with the `updated_at` the store recorded for its item.
    fn stamp(&self, patches: PatchSet) -> PatchSet {
        patches
            .into_iter()
            .map(|patch| match self.store.get(&patch.id) {
                Some(item) => patch.stamped(item.updated_at),
                None => patch,
            })
            .collect()
    }

    fn superseded(&self, pending: &PendingMove) -> Vec<ItemId> {
        pending
            .previous
            .iter()
            .filter(|(item, revision)| self.store.revision(&item.id) != Some(*revision))
            .map(|(item, _)| item.id.clone())
            .collect()
    }

    fn report(&self, pending: &PendingMove, superseded: Vec<ItemId>) -> MoveReport {
        MoveReport {
            item_id: pending.intent.item_id.clone(),
            state: pending.state,
            updates: pending.patches.len(),
            superseded,
        }
    }
}

/// Columns a move wrote to or took items from.
fn touched_groups(pending: &PendingMove) -> BTreeSet<String> {
    pending
        .patches
        .iter()
        .filter_map(|patch| patch.status.clone())
        .chain(pending.previous.iter().map(|(item, _)| item.status.clone()))
        .collect()
}

fn failed_ids(err: &Error, fallback: &str) -> Vec<ItemId> {
    match err {
        Error::RemoteFailure { failed, .. } if !failed.is_empty() => failed.clone(),
        _ => vec![fallback.to_string()],
    }
}
