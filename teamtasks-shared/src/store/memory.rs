/// In-memory document store
///
/// Keeps every collection in a `BTreeMap` keyed by document id behind a
/// single `RwLock`, and publishes a [`Change`] for every successful write.
/// Used for tests, local development, and as the fallback backend when no
/// `DATABASE_URL` is configured.
///
/// # Example
///
/// ```
/// use teamtasks_shared::store::{Collection, DocumentStore, Fields, Query};
/// use teamtasks_shared::store::memory::MemoryStore;
/// use uuid::Uuid;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::new();
/// let id = Uuid::new_v4();
///
/// let mut fields = Fields::new();
/// fields.insert("title".into(), "Ship report".into());
/// store.set(Collection::Tasks, id, fields).await?;
///
/// let all = store.query(&Query::new(Collection::Tasks)).await?;
/// assert_eq!(all.len(), 1);
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::{
    Change, ChangeKind, Collection, Document, DocumentStore, Fields, Query, StoreError,
    StoreResult, CHANGE_FEED_CAPACITY,
};

/// In-memory store
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, BTreeMap<Uuid, Fields>>>,
    changes: broadcast::Sender<Change>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Self {
            collections: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Number of documents in a collection
    pub async fn len(&self, collection: Collection) -> usize {
        self.collections
            .read()
            .await
            .get(&collection)
            .map(BTreeMap::len)
            .unwrap_or(0)
    }

    fn publish(&self, collection: Collection, id: Uuid, kind: ChangeKind) {
        // No receivers is fine: nobody is subscribed
        let _ = self.changes.send(Change { collection, id, kind });
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Document>> {
        let collections = self.collections.read().await;

        Ok(collections
            .get(&collection)
            .and_then(|docs| docs.get(&id))
            .map(|data| Document::new(id, data.clone())))
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let collections = self.collections.read().await;

        let Some(docs) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        Ok(docs
            .iter()
            .map(|(id, data)| Document::new(*id, data.clone()))
            .filter(|doc| query.matches(doc))
            .collect())
    }

    async fn set(&self, collection: Collection, id: Uuid, data: Fields) -> StoreResult<()> {
        self.collections
            .write()
            .await
            .entry(collection)
            .or_default()
            .insert(id, data);

        self.publish(collection, id, ChangeKind::Set);
        Ok(())
    }

    async fn update(&self, collection: Collection, id: Uuid, fields: Fields) -> StoreResult<()> {
        {
            let mut collections = self.collections.write().await;
            let existing = collections
                .get_mut(&collection)
                .and_then(|docs| docs.get_mut(&id))
                .ok_or(StoreError::NotFound { collection, id })?;

            existing.extend(fields);
        }

        self.publish(collection, id, ChangeKind::Update);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> StoreResult<bool> {
        let removed = self
            .collections
            .write()
            .await
            .get_mut(&collection)
            .and_then(|docs| docs.remove(&id))
            .is_some();

        if removed {
            self.publish(collection, id, ChangeKind::Delete);
        }
        Ok(removed)
    }

    fn changes(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::subscribe;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn fields(pairs: &[(&str, serde_json::Value)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();

        store
            .set(Collection::Tasks, id, fields(&[("title", json!("a"))]))
            .await
            .unwrap();

        let doc = store.get(Collection::Tasks, id).await.unwrap().unwrap();
        assert_eq!(doc.field("title"), Some(&json!("a")));
        assert!(store.get(Collection::Users, id).await.unwrap().is_none());

        assert!(store.delete(Collection::Tasks, id).await.unwrap());
        assert!(!store.delete(Collection::Tasks, id).await.unwrap());
        assert_eq!(store.len(Collection::Tasks).await, 0);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let store = MemoryStore::new();
        let id = Uuid::new_v4();

        store
            .set(
                Collection::Tasks,
                id,
                fields(&[("title", json!("a")), ("completed", json!(false))]),
            )
            .await
            .unwrap();
        store
            .update(Collection::Tasks, id, fields(&[("completed", json!(true))]))
            .await
            .unwrap();

        let doc = store.get(Collection::Tasks, id).await.unwrap().unwrap();
        assert_eq!(doc.field("title"), Some(&json!("a")));
        assert_eq!(doc.field("completed"), Some(&json!(true)));
    }

    #[tokio::test]
    async fn test_update_missing_document_fails() {
        let store = MemoryStore::new();
        let result = store
            .update(Collection::Tasks, Uuid::new_v4(), Fields::new())
            .await;

        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_writes_publish_changes() {
        let store = MemoryStore::new();
        let mut feed = store.changes();
        let id = Uuid::new_v4();

        store.set(Collection::Users, id, Fields::new()).await.unwrap();
        store.delete(Collection::Users, id).await.unwrap();

        assert_eq!(feed.recv().await.unwrap().kind, ChangeKind::Set);
        assert_eq!(feed.recv().await.unwrap().kind, ChangeKind::Delete);
    }

    #[tokio::test]
    async fn test_subscription_tracks_query() {
        let store = Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4().to_string();
        let query = Query::new(Collection::Tasks).where_eq("userId", owner.clone());

        let mut live = subscribe(store.clone(), query).await.unwrap();
        assert!(live.current().is_empty());

        let id = Uuid::new_v4();
        store
            .set(Collection::Tasks, id, fields(&[("userId", json!(owner))]))
            .await
            .unwrap();

        let snapshot = tokio::time::timeout(Duration::from_secs(1), live.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, id);
    }

    #[tokio::test]
    async fn test_subscription_ignores_unrelated_writes() {
        let store = Arc::new(MemoryStore::new());
        let query = Query::new(Collection::Tasks).where_eq("userId", "someone");

        let mut live = subscribe(store.clone(), query).await.unwrap();

        store
            .set(Collection::Tasks, Uuid::new_v4(), fields(&[("userId", json!("other"))]))
            .await
            .unwrap();
        store
            .set(Collection::Users, Uuid::new_v4(), Fields::new())
            .await
            .unwrap();

        let waited = tokio::time::timeout(Duration::from_millis(200), live.changed()).await;
        assert!(waited.is_err(), "no snapshot should be pushed for unrelated writes");
    }
}
