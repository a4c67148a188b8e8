//! Remote sync adapter.
//!
//! Translates patches into remote updates and remote rows into validated
//! items. A `persist` call is one logical operation: its updates are issued
//! together and any failures come back as a single aggregated
//! [`Error::RemoteFailure`] naming every id that failed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::item::{FieldEdit, Item, Patch, StatusSet, TASKS_COLLECTION};
use crate::remote::{Filter, Order, RemoteError, RemoteStore};
use crate::session::SessionContext;

#[derive(Clone)]
pub struct SyncAdapter {
    remote: Arc<dyn RemoteStore>,
    statuses: StatusSet,
}

impl std::fmt::Debug for SyncAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncAdapter")
            .field("statuses", &self.statuses)
            .finish_non_exhaustive()
    }
}

impl SyncAdapter {
    pub fn new(remote: Arc<dyn RemoteStore>, statuses: StatusSet) -> Self {
        Self { remote, statuses }
    }

    pub fn statuses(&self) -> &StatusSet {
        &self.statuses
    }

    /// Persist a patch set; an empty set succeeds without touching the store.
    pub async fn persist(
        &self,
        ctx: &SessionContext,
        patches: &[Patch],
        now: DateTime<Utc>,
    ) -> Result<()> {
        if patches.is_empty() {
            return Ok(());
        }

        debug!(user = ctx.user_id(), updates = patches.len(), "persisting patch set");
        let updates = patches.iter().map(|patch| async move {
            let outcome = self
                .remote
                .update(TASKS_COLLECTION, &patch.id, patch.to_row(now))
                .await;
            (patch.id.as_str(), outcome)
        });

        let mut failed = Vec::new();
        let mut messages = Vec::new();
        for (id, outcome) in join_all(updates).await {
            if let Err(err) = outcome {
                warn!(id, error = %err, "remote update failed");
                failed.push(id.to_string());
                messages.push(err.to_string());
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            messages.dedup();
            Err(Error::RemoteFailure {
                failed,
                message: messages.join("; "),
            })
        }
    }

    /// Persist a field edit of one item, sending `updated_at` as given.
    pub async fn update_fields(
        &self,
        ctx: &SessionContext,
        id: &str,
        fields: &FieldEdit,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        fields.validate()?;
        let patch = Patch::edit(id, fields.clone()).stamped(updated_at);
        self.persist(ctx, &[patch], updated_at).await
    }

    /// Fetch the session user's tasks, optionally limited to one project.
    pub async fn fetch(&self, ctx: &SessionContext, project: Option<&str>) -> Result<Vec<Item>> {
        let mut filter = Filter::new().column_eq("user_id", ctx.user_id());
        if let Some(project) = project {
            filter = filter.column_eq("project_id", project);
        }
        let rows = self
            .remote
            .query(TASKS_COLLECTION, &filter, Some(&Order::asc("order_index")))
            .await
            .map_err(|err| remote_failure(Vec::new(), err))?;

        debug!(user = ctx.user_id(), rows = rows.len(), "fetched tasks");
        rows.into_iter()
            .map(|row| Item::from_row(row, &self.statuses))
            .collect()
    }

    /// Insert a new item and return the authoritative copy.
    pub async fn insert(&self, ctx: &SessionContext, item: &Item) -> Result<Item> {
        if item.owner_id != ctx.user_id() {
            return Err(Error::Validation(format!(
                "item {} is not owned by the session user",
                item.id
            )));
        }
        let stored = self
            .remote
            .insert(TASKS_COLLECTION, item.to_row()?)
            .await
            .map_err(|err| remote_failure(vec![item.id.clone()], err))?;
        Item::from_row(stored, &self.statuses)
    }

    pub async fn delete(&self, ctx: &SessionContext, id: &str) -> Result<()> {
        debug!(user = ctx.user_id(), id, "deleting task");
        self.remote
            .delete(TASKS_COLLECTION, id)
            .await
            .map_err(|err| remote_failure(vec![id.to_string()], err))
    }
}

fn remote_failure(failed: Vec<String>, err: RemoteError) -> Error {
    Error::RemoteFailure {
        failed,
        message: err.to_string(),
    }
}
