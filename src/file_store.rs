//! JSON-file remote store.
//!
//! Each collection is one JSON array under `<data dir>/collections/`. Every
//! write is a locked read-modify-write with an atomic replace, so several
//! shell processes can share one data directory. File IO runs on tokio's
//! blocking pool.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::remote::{
    ensure_row_id, merge_fields, row_id, select_rows, Filter, Order, RemoteError, RemoteResult,
    RemoteStore,
};
use crate::storage::Storage;

#[derive(Debug, Clone)]
pub struct FileStore {
    storage: Storage,
    lock_timeout_ms: u64,
}

impl FileStore {
    pub fn new(storage: Storage, lock_timeout_ms: u64) -> Self {
        Self {
            storage,
            lock_timeout_ms,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    async fn mutate<R, F>(&self, collection: &str, f: F) -> RemoteResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut Vec<Value>) -> RemoteResult<R> + Send + 'static,
    {
        let storage = self.storage.clone();
        let path = storage.collection_file(collection)?;
        let timeout = self.lock_timeout_ms;
        tokio::task::spawn_blocking(move || storage.update_json(&path, timeout, f))
            .await
            .map_err(|err| RemoteError::Unavailable(format!("file store task failed: {err}")))?
    }

    async fn read(&self, collection: &str) -> RemoteResult<Vec<Value>> {
        let storage = self.storage.clone();
        let path = storage.collection_file(collection)?;
        let timeout = self.lock_timeout_ms;
        let rows: Vec<Value> = tokio::task::spawn_blocking(move || storage.read_json_locked(&path, timeout))
            .await
            .map_err(|err| RemoteError::Unavailable(format!("file store task failed: {err}")))??;
        Ok(rows)
    }
}

fn not_found(collection: &str, id: &str) -> RemoteError {
    RemoteError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    }
}

#[async_trait]
impl RemoteStore for FileStore {
    async fn insert(&self, collection: &str, mut row: Value) -> RemoteResult<Value> {
        let id = ensure_row_id(&mut row)?;
        debug!(collection, id = %id, "file store insert");
        self.mutate(collection, move |rows| {
            if rows.iter().any(|existing| row_id(existing) == Some(id.as_str())) {
                return Err(RemoteError::Rejected(format!("duplicate id {id}")));
            }
            rows.push(row.clone());
            Ok(row)
        })
        .await
    }

    async fn update(&self, collection: &str, id: &str, fields: Value) -> RemoteResult<()> {
        let name = collection.to_string();
        let id = id.to_string();
        self.mutate(collection, move |rows| {
            let row = rows
                .iter_mut()
                .find(|row| row_id(row) == Some(id.as_str()))
                .ok_or_else(|| not_found(&name, &id))?;
            merge_fields(row, fields)
        })
        .await
    }

    async fn query(
        &self,
        collection: &str,
        filter: &Filter,
        order: Option<&Order>,
    ) -> RemoteResult<Vec<Value>> {
        let rows = self.read(collection).await?;
        Ok(select_rows(&rows, filter, order))
    }

    async fn delete(&self, collection: &str, id: &str) -> RemoteResult<()> {
        let name = collection.to_string();
        let id = id.to_string();
        self.mutate(collection, move |rows| {
            let before = rows.len();
            rows.retain(|row| row_id(row) != Some(id.as_str()));
            if rows.len() == before {
                Err(not_found(&name, &id))
            } else {
                Ok(())
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{lock_path_for, FileLock};
    use serde_json::json;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileStore {
        let storage = Storage::new(dir.path());
        storage.init().unwrap();
        FileStore::new(storage, 200)
    }

    #[tokio::test]
    async fn rows_persist_across_instances() {
        let dir = TempDir::new().unwrap();
        store(&dir)
            .insert("tasks", json!({"id": "a", "user_id": "u", "order_index": 1}))
            .await
            .unwrap();
        store(&dir)
            .insert("tasks", json!({"id": "b", "user_id": "u", "order_index": 0}))
            .await
            .unwrap();

        let rows = store(&dir)
            .query("tasks", &Filter::new().column_eq("user_id", "u"), Some(&Order::asc("order_index")))
            .await
            .unwrap();
        let ids: Vec<&str> = rows.iter().filter_map(row_id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[tokio::test]
    async fn update_and_delete_unknown_rows_fail() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(matches!(
            store.update("tasks", "ghost", json!({"status": "done"})).await,
            Err(RemoteError::NotFound { .. })
        ));
        assert!(matches!(
            store.delete("tasks", "ghost").await,
            Err(RemoteError::NotFound { .. })
        ));

        store.insert("tasks", json!({"id": "a"})).await.unwrap();
        assert!(matches!(
            store.insert("tasks", json!({"id": "a"})).await,
            Err(RemoteError::Rejected(_))
        ));
        store
            .update("tasks", "a", json!({"status": "done"}))
            .await
            .unwrap();
        let rows = store.query("tasks", &Filter::new(), None).await.unwrap();
        assert_eq!(rows, vec![json!({"id": "a", "status": "done"})]);
    }

    #[tokio::test]
    async fn held_lock_makes_store_unavailable() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let path = store.storage().collection_file("tasks").unwrap();
        let _held = FileLock::acquire(lock_path_for(&path), 1000).unwrap();

        assert!(matches!(
            store.insert("tasks", json!({"id": "a"})).await,
            Err(RemoteError::Unavailable(_))
        ));
    }
}
