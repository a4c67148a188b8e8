//! Remote data store interface.
//!
//! The board talks to its backing store through [`RemoteStore`], a narrow
//! row-oriented surface (insert/update/query/delete on named collections).
//! Row-level scoping by owner is the store's concern; the core only filters
//! what it asks for.
//!
//! [`MemoryStore`] is an in-process implementation with failure injection.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Errors reported by a remote store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("row {id} not found in {collection}")]
    NotFound { collection: String, id: String },

    #[error("write rejected: {0}")]
    Rejected(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Local storage problems surface to callers as an unavailable store.
impl From<crate::error::Error> for RemoteError {
    fn from(err: crate::error::Error) -> Self {
        RemoteError::Unavailable(err.to_string())
    }
}

/// Equality filter over row columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    equals: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column_eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.push((column.into(), value.into()));
        self
    }

    pub fn matches(&self, row: &Value) -> bool {
        self.equals
            .iter()
            .all(|(column, expected)| row.get(column).unwrap_or(&Value::Null) == expected)
    }
}

/// Sort order for a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Insert a row and return the stored (authoritative) row.
    async fn insert(&self, collection: &str, row: Value) -> RemoteResult<Value>;

    /// Merge `fields` into the row with `id`.
    async fn update(&self, collection: &str, id: &str, fields: Value) -> RemoteResult<()>;

    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> RemoteResult<Vec<Value>>;

    async fn delete(&self, collection: &str, id: &str) -> RemoteResult<()>;
}

/// Give a row an id when the caller did not.
pub(crate) fn ensure_row_id(row: &mut Value) -> RemoteResult<String> {
    let object = row
        .as_object_mut()
        .ok_or_else(|| RemoteError::Rejected("row must be an object".to_string()))?;
    match object.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => {
            let id = Uuid::new_v4().to_string();
            object.insert("id".to_string(), Value::from(id.clone()));
            Ok(id)
        }
    }
}

pub(crate) fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

/// Merge an object of changed columns into a row.
pub(crate) fn merge_fields(row: &mut Value, fields: Value) -> RemoteResult<()> {
    let Value::Object(fields) = fields else {
        return Err(RemoteError::Rejected("update fields must be an object".to_string()));
    };
    let target: &mut Map<String, Value> = row
        .as_object_mut()
        .ok_or_else(|| RemoteError::Rejected("stored row is not an object".to_string()))?;
    for (column, value) in fields {
        if column == "id" {
            continue;
        }
        target.insert(column, value);
    }
    Ok(())
}

/// Select, then sort, rows the way a query would.
pub(crate) fn select_rows(rows: &[Value], filter: &Filter, order: Option<&Order>) -> Vec<Value> {
    let mut selected: Vec<Value> = rows.iter().filter(|row| filter.matches(row)).cloned().collect();
    if let Some(order) = order {
        selected.sort_by(|a, b| {
            let ordering = compare_values(a.get(&order.column), b.get(&order.column));
            if order.ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
    }
    selected
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(a)), Some(Value::Number(b))) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(a)), Some(Value::String(b))) => a.cmp(b),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Greater,
        (_, None | Some(Value::Null)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<String, Vec<Value>>,
    failing_ids: HashSet<String>,
    offline: bool,
    writes: usize,
}

/// In-process remote store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed a collection directly, bypassing write accounting.
    pub fn seed(&self, collection: &str, rows: Vec<Value>) {
        self.state()
            .collections
            .entry(collection.to_string())
            .or_default()
            .extend(rows);
    }

    /// Make every write touching `id` fail until cleared.
    pub fn fail_writes_for(&self, id: impl Into<String>) {
        self.state().failing_ids.insert(id.into());
    }

    /// Make every call fail until cleared.
    pub fn set_offline(&self, offline: bool) {
        self.state().offline = offline;
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.failing_ids.clear();
        state.offline = false;
    }

    /// Number of write calls accepted or rejected so far.
    pub fn write_count(&self) -> usize {
        self.state().writes
    }

    pub fn rows(&self, collection: &str) -> Vec<Value> {
        self.state()
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn row(&self, collection: &str, id: &str) -> Option<Value> {
        self.rows(collection)
            .into_iter()
            .find(|row| row_id(row) == Some(id))
    }

    fn check_write(state: &mut MemoryState, id: &str) -> RemoteResult<()> {
        state.writes += 1;
        if state.offline {
            return Err(RemoteError::Unavailable("store is offline".to_string()));
        }
        if state.failing_ids.contains(id) {
            return Err(RemoteError::Rejected(format!("write to {id} refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn insert(&self, collection: &str, mut row: Value) -> RemoteResult<Value> {
        let id = ensure_row_id(&mut row)?;
        let mut state = self.state();
        Self::check_write(&mut state, &id)?;
        let rows = state.collections.entry(collection.to_string()).or_default();
        if rows.iter().any(|existing| row_id(existing) == Some(id.as_str())) {
            return Err(RemoteError::Rejected(format!("duplicate id {id}")));
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, collection: &str, id: &str, fields: Value) -> RemoteResult<()> {
        let mut state = self.state();
        Self::check_write(&mut state, id)?;
        let row = state
            .collections
            .get_mut(collection)
            .and_then(|rows| rows.iter_mut().find(|row| row_id(row) == Some(id)))
            .ok_or_else(|| RemoteError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        merge_fields(row, fields)
    }

    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> RemoteResult<Vec<Value>> {
        let state = self.state();
        if state.offline {
            return Err(RemoteError::Unavailable("store is offline".to_string()));
        }
        let rows = state
            .collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(select_rows(rows, filter, order))
    }

    async fn delete(&self, collection: &str, id: &str) -> RemoteResult<()> {
        let mut state = self.state();
        Self::check_write(&mut state, id)?;
        let rows = state
            .collections
            .get_mut(collection)
            .ok_or_else(|| RemoteError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        let before = rows.len();
        rows.retain(|row| row_id(row) != Some(id));
        if rows.len() == before {
            return Err(RemoteError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn insert_assigns_id_and_query_filters_and_orders() {
        let store = MemoryStore::new();
        let row = store
            .insert("tasks", json!({"user_id": "u", "order_index": 2}))
            .await
            .expect("insert");
        assert!(row_id(&row).is_some());
        store
            .insert("tasks", json!({"id": "b", "user_id": "u", "order_index": 1}))
            .await
            .expect("insert");
        store
            .insert("tasks", json!({"id": "c", "user_id": "other", "order_index": 0}))
            .await
            .expect("insert");

        let rows = store
            .query("tasks", &Filter::new().column_eq("user_id", "u"), Some(&Order::asc("order_index")))
            .await
            .expect("query");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], json!("b"));
    }

    #[tokio::test]
    async fn update_merges_fields_and_keeps_id() {
        let store = MemoryStore::new();
        store.seed("tasks", vec![json!({"id": "a", "status": "todo"})]);
        store
            .update("tasks", "a", json!({"status": "done", "id": "zzz"}))
            .await
            .expect("update");
        let row = store.row("tasks", "a").expect("row");
        assert_eq!(row["status"], json!("done"));
        assert_eq!(store.write_count(), 1);
    }

    #[tokio::test]
    async fn injected_failures() {
        let store = MemoryStore::new();
        store.seed("tasks", vec![json!({"id": "a"}), json!({"id": "b"})]);
        store.fail_writes_for("a");
        assert!(matches!(
            store.update("tasks", "a", json!({})).await,
            Err(RemoteError::Rejected(_))
        ));
        assert!(store.update("tasks", "b", json!({})).await.is_ok());

        store.set_offline(true);
        assert!(matches!(
            store.query("tasks", &Filter::new(), None).await,
            Err(RemoteError::Unavailable(_))
        ));
        store.clear_failures();
        assert!(store.delete("tasks", "a").await.is_ok());
        assert!(matches!(
            store.delete("tasks", "a").await,
            Err(RemoteError::NotFound { .. })
        ));
    }
}
