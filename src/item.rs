//! Task items and the patches that mutate them.
//!
//! Items travel over the wire as rows of the `tasks` collection using the
//! column names of the hosted table (`order_index`, `user_id`, ...). Every
//! row coming back from a remote store goes through [`Item::from_row`], which
//! rejects malformed data before it can reach the reorder engine.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::BoardConfig;
use crate::error::{Error, Result};

/// Name of the remote collection holding task rows.
pub const TASKS_COLLECTION: &str = "tasks";

/// Opaque item identifier.
pub type ItemId = String;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    /// Sort rank, most urgent first.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            other => Err(Error::Validation(format!(
                "unknown priority '{other}' (expected low|medium|high)"
            ))),
        }
    }
}

/// The closed set of statuses a board accepts, in column order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSet {
    statuses: Vec<String>,
    default_status: String,
    done: Vec<String>,
}

impl StatusSet {
    pub fn new(
        statuses: Vec<String>,
        default_status: impl Into<String>,
        done: Vec<String>,
    ) -> Result<Self> {
        let set = Self {
            statuses,
            default_status: default_status.into(),
            done,
        };
        if set.statuses.is_empty() {
            return Err(Error::InvalidConfig("status set cannot be empty".to_string()));
        }
        if !set.contains(&set.default_status) {
            return Err(Error::InvalidConfig(format!(
                "default status '{}' not in status set",
                set.default_status
            )));
        }
        if let Some(missing) = set.done.iter().find(|status| !set.contains(status)) {
            return Err(Error::InvalidConfig(format!(
                "done status '{missing}' not in status set"
            )));
        }
        Ok(set)
    }

    pub fn from_config(config: &BoardConfig) -> Result<Self> {
        Self::new(
            config.statuses.clone(),
            config.default_status.clone(),
            config.done_statuses.clone(),
        )
    }

    pub fn contains(&self, status: &str) -> bool {
        self.statuses.iter().any(|entry| entry == status)
    }

    /// Reject statuses outside the set.
    pub fn validate(&self, status: &str) -> Result<()> {
        if self.contains(status) {
            Ok(())
        } else {
            Err(Error::Validation(format!(
                "unknown status '{status}' (expected one of: {})",
                self.statuses.join(", ")
            )))
        }
    }

    pub fn statuses(&self) -> &[String] {
        &self.statuses
    }

    pub fn default_status(&self) -> &str {
        &self.default_status
    }

    pub fn is_done(&self, status: &str) -> bool {
        self.done.iter().any(|entry| entry == status)
    }
}

impl Default for StatusSet {
    fn default() -> Self {
        Self {
            statuses: vec!["todo".to_string(), "in-progress".to_string(), "done".to_string()],
            default_status: "todo".to_string(),
            done: vec!["done".to_string()],
        }
    }
}

/// A task on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub title: String,
    pub description: String,
    pub status: String,
    #[serde(rename = "order_index")]
    pub group_order: u32,
    #[serde(rename = "user_id")]
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lenient shape used to decode remote rows before validation.
#[derive(Debug, Deserialize)]
struct ItemRow {
    id: Option<String>,
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    status: Option<String>,
    order_index: Option<i64>,
    user_id: Option<String>,
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    labels: Option<Vec<String>>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl Item {
    /// Build a fresh item from a draft.
    pub fn from_draft(
        id: impl Into<ItemId>,
        draft: ItemDraft,
        owner_id: impl Into<String>,
        status: impl Into<String>,
        group_order: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: draft.title,
            description: draft.description,
            status: status.into(),
            group_order,
            owner_id: owner_id.into(),
            project_id: draft.project_id,
            due_date: draft.due_date,
            priority: draft.priority,
            labels: draft.labels,
            created_at: now,
            updated_at: now,
        }
    }

    /// Decode and validate a remote row.
    pub fn from_row(row: Value, statuses: &StatusSet) -> Result<Self> {
        let raw: ItemRow = serde_json::from_value(row)
            .map_err(|err| Error::Validation(format!("malformed task row: {err}")))?;

        let id = required(raw.id, "id")?;
        if id.trim().is_empty() {
            return Err(Error::Validation("task row has an empty id".to_string()));
        }
        let status = required(raw.status, "status")?;
        statuses
            .validate(&status)
            .map_err(|err| Error::Validation(format!("task {id}: {err}")))?;
        let order = required(raw.order_index, "order_index")?;
        let group_order = u32::try_from(order).map_err(|_| {
            Error::Validation(format!("task {id}: order_index {order} is out of range"))
        })?;
        let created_at = required(raw.created_at, "created_at")?;
        let updated_at = required(raw.updated_at, "updated_at")?;
        if updated_at < created_at {
            return Err(Error::Validation(format!(
                "task {id}: updated_at precedes created_at"
            )));
        }
        let priority = match raw.priority {
            Some(value) => value.parse()?,
            None => Priority::default(),
        };

        Ok(Self {
            title: required(raw.title, "title")?,
            description: raw.description.unwrap_or_default(),
            status,
            group_order,
            owner_id: required(raw.user_id, "user_id")?,
            project_id: raw.project_id,
            due_date: raw.due_date,
            priority,
            labels: raw.labels.unwrap_or_default().into_iter().collect(),
            created_at,
            updated_at,
            id,
        })
    }

    /// Encode as a full row for insertion.
    pub fn to_row(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Refresh `updated_at`, never letting it fall behind `created_at`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now.max(self.created_at);
    }
}

fn required<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| Error::Validation(format!("task row is missing '{field}'")))
}

/// User-supplied fields for a new item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemDraft {
    pub title: String,
    pub description: String,
    pub project_id: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub labels: BTreeSet<String>,
}

impl ItemDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_title(&self.title)
    }
}

fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        Err(Error::Validation("title cannot be empty".to_string()))
    } else {
        Ok(())
    }
}

/// Field edits that bypass the reorder engine.
///
/// `None` leaves a field untouched; the nested options on `due_date` and
/// `project_id` distinguish "clear" from "keep".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldEdit {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub priority: Option<Priority>,
    pub labels: Option<BTreeSet<String>>,
    pub project_id: Option<Option<String>>,
}

impl FieldEdit {
    pub fn is_empty(&self) -> bool {
        self == &FieldEdit::default()
    }

    pub fn validate(&self) -> Result<()> {
        match &self.title {
            Some(title) => validate_title(title),
            None => Ok(()),
        }
    }

    fn apply_to(&self, item: &mut Item) {
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(description) = &self.description {
            item.description = description.clone();
        }
        if let Some(due_date) = self.due_date {
            item.due_date = due_date;
        }
        if let Some(priority) = self.priority {
            item.priority = priority;
        }
        if let Some(labels) = &self.labels {
            item.labels = labels.clone();
        }
        if let Some(project_id) = &self.project_id {
            item.project_id = project_id.clone();
        }
    }

    fn write_row(&self, row: &mut Map<String, Value>) {
        if let Some(title) = &self.title {
            row.insert("title".to_string(), Value::from(title.as_str()));
        }
        if let Some(description) = &self.description {
            row.insert("description".to_string(), Value::from(description.as_str()));
        }
        if let Some(due_date) = self.due_date {
            let value = due_date.map_or(Value::Null, |due| Value::from(due.to_rfc3339()));
            row.insert("due_date".to_string(), value);
        }
        if let Some(priority) = self.priority {
            row.insert("priority".to_string(), Value::from(priority.as_str()));
        }
        if let Some(labels) = &self.labels {
            row.insert(
                "labels".to_string(),
                Value::Array(labels.iter().map(|label| Value::from(label.as_str())).collect()),
            );
        }
        if let Some(project_id) = &self.project_id {
            let value = project_id
                .as_deref()
                .map_or(Value::Null, Value::from);
            row.insert("project_id".to_string(), value);
        }
    }
}

/// A minimal change to one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub id: ItemId,
    pub status: Option<String>,
    pub group_order: Option<u32>,
    pub fields: FieldEdit,
    /// Timestamp the change was applied with locally, if known.
    pub updated_at: Option<DateTime<Utc>>,
}

/// A logical batch of patches (one move, or one edit).
pub type PatchSet = Vec<Patch>;

impl Patch {
    /// Relocate an item to `status` at `group_order`.
    pub fn position(id: impl Into<ItemId>, status: impl Into<String>, group_order: u32) -> Self {
        Self {
            id: id.into(),
            status: Some(status.into()),
            group_order: Some(group_order),
            fields: FieldEdit::default(),
            updated_at: None,
        }
    }

    pub fn edit(id: impl Into<ItemId>, fields: FieldEdit) -> Self {
        Self {
            id: id.into(),
            status: None,
            group_order: None,
            fields,
            updated_at: None,
        }
    }

    /// Send `at` as the row's `updated_at` instead of the persist time.
    pub fn stamped(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    /// Mutate `item` in place. Callers validate beforehand.
    pub fn apply_to(&self, item: &mut Item, now: DateTime<Utc>) {
        if let Some(status) = &self.status {
            item.status = status.clone();
        }
        if let Some(order) = self.group_order {
            item.group_order = order;
        }
        self.fields.apply_to(item);
        item.touch(now);
    }

    /// The changed columns, as sent to `RemoteStore::update`.
    ///
    /// A stamped patch keeps its own `updated_at`; `updated_at` is the
    /// fallback for unstamped ones.
    pub fn to_row(&self, updated_at: DateTime<Utc>) -> Value {
        let mut row = Map::new();
        if let Some(status) = &self.status {
            row.insert("status".to_string(), Value::from(status.as_str()));
        }
        if let Some(order) = self.group_order {
            row.insert("order_index".to_string(), Value::from(order));
        }
        self.fields.write_row(&mut row);
        let updated_at = self.updated_at.unwrap_or(updated_at);
        row.insert("updated_at".to_string(), Value::from(updated_at.to_rfc3339()));
        Value::Object(row)
    }
}
