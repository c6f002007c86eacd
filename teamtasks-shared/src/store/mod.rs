/// Document store abstraction
///
/// TeamTasks keeps all application state in two document collections,
/// `users` and `tasks`. This module defines the store contract every backend
/// implements, plus the query model and live subscriptions built on top of it.
///
/// # Backends
///
/// - [`memory::MemoryStore`]: in-process store for development and tests
/// - [`postgres::PgDocumentStore`]: JSONB documents in PostgreSQL with
///   `LISTEN/NOTIFY` driving the change feed
///
/// # Change Feed
///
/// Every successful write publishes a [`Change`] on a broadcast channel.
/// [`subscribe`] turns that feed into a live query: it re-runs the query when
/// a change touches the query's collection and pushes the new result set if it
/// differs from the previous one.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use teamtasks_shared::store::{subscribe, Collection, DocumentStore, Query};
/// use teamtasks_shared::store::memory::MemoryStore;
/// use uuid::Uuid;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
///
/// let owner = Uuid::new_v4();
/// let query = Query::new(Collection::Tasks).where_eq("userId", owner.to_string());
///
/// let mut live = subscribe(store.clone(), query).await?;
/// println!("initial: {} tasks", live.current().len());
///
/// while let Some(snapshot) = live.changed().await {
///     println!("now: {} tasks", snapshot.len());
/// }
/// # Ok(())
/// # }
/// ```

pub mod memory;
pub mod postgres;
pub mod query;
pub mod subscription;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use query::{Filter, FilterOp, Query};
pub use subscription::Subscription;

/// JSON object holding a document's fields
pub type Fields = Map<String, Value>;

/// Store result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Capacity of the broadcast change feed
///
/// Slow subscribers that fall behind simply re-query, so lag is harmless.
pub const CHANGE_FEED_CAPACITY: usize = 256;

/// Error type for document store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Document does not exist (partial update on a missing id)
    #[error("Document {collection}/{id} not found")]
    NotFound { collection: Collection, id: Uuid },

    /// Document could not be decoded into the requested type
    #[error("Failed to decode {collection}/{id}: {message}")]
    Decode {
        collection: Collection,
        id: Uuid,
        message: String,
    },

    /// Value could not be encoded into a document
    #[error("Failed to encode document: {0}")]
    Encode(String),

    /// Backend failure (connection, query, listener)
    #[error("Store backend error: {0}")]
    Backend(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The collections the application uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    /// User profile records
    Users,

    /// Task records
    Tasks,
}

impl Collection {
    /// Collection name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Tasks => "tasks",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "users" => Ok(Collection::Users),
            "tasks" => Ok(Collection::Tasks),
            other => Err(StoreError::Backend(format!("Unknown collection: {}", other))),
        }
    }
}

/// A stored document: id plus JSON fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document id (unique within its collection)
    pub id: Uuid,

    /// Document fields
    pub data: Fields,
}

impl Document {
    /// Creates a document from id and fields
    pub fn new(id: Uuid, data: Fields) -> Self {
        Self { id, data }
    }

    /// Returns a field value, if present
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    /// Decodes the document into a typed record
    ///
    /// The document id is injected as the `id` field before decoding, so
    /// record types carry their id without storing it twice.
    pub fn decode<T: DeserializeOwned>(&self, collection: Collection) -> StoreResult<T> {
        let mut data = self.data.clone();
        data.insert("id".to_string(), Value::String(self.id.to_string()));

        serde_json::from_value(Value::Object(data)).map_err(|e| StoreError::Decode {
            collection,
            id: self.id,
            message: e.to_string(),
        })
    }
}

/// Encodes a record into document fields, dropping its `id` field
pub fn encode_fields<T: Serialize>(record: &T) -> StoreResult<Fields> {
    match serde_json::to_value(record).map_err(|e| StoreError::Encode(e.to_string()))? {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        other => Err(StoreError::Encode(format!(
            "Expected a JSON object, got {}",
            other
        ))),
    }
}

/// Kind of write that produced a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Document created or overwritten
    Set,

    /// Document fields partially updated
    Update,

    /// Document removed
    Delete,
}

/// A change notification published on the store's change feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Collection that changed
    pub collection: Collection,

    /// Document that changed
    pub id: Uuid,

    /// What happened to it
    pub kind: ChangeKind,
}

/// Contract implemented by every document store backend
///
/// All operations are single-document or single-query; the store offers no
/// transactions. Multi-step operations are sequenced by the caller.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads one document by id
    async fn get(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Document>>;

    /// One-shot filtered read, ordered by document id
    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>>;

    /// Writes (creates or overwrites) a document by id
    async fn set(&self, collection: Collection, id: Uuid, data: Fields) -> StoreResult<()>;

    /// Merges `fields` into an existing document
    ///
    /// Fails with [`StoreError::NotFound`] if the document does not exist.
    async fn update(&self, collection: Collection, id: Uuid, fields: Fields) -> StoreResult<()>;

    /// Deletes a document, returning whether it existed
    async fn delete(&self, collection: Collection, id: Uuid) -> StoreResult<bool>;

    /// Subscribes to the store's change feed
    fn changes(&self) -> broadcast::Receiver<Change>;

    /// Verifies the backend is reachable
    async fn ping(&self) -> StoreResult<()>;
}

/// Opens a live subscription to a query
///
/// The returned subscription holds the initial result set immediately and
/// receives a new snapshot whenever a write changes the query's results.
/// Dropping the subscription releases the background task.
///
/// # Errors
///
/// Returns an error if the initial query fails. Failures of later re-queries
/// are logged and the previous snapshot is kept.
pub async fn subscribe(
    store: Arc<dyn DocumentStore>,
    query: Query,
) -> StoreResult<Subscription<Vec<Document>>> {
    // Subscribe to the feed before the initial read so no write slips between them
    let mut changes = store.changes();
    let initial = store.query(&query).await?;

    let (tx, rx) = tokio::sync::watch::channel(initial);
    let token = CancellationToken::new();
    let cancelled = token.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancelled.cancelled() => break,
                received = changes.recv() => match received {
                    Ok(change) if change.collection != query.collection => continue,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, collection = %query.collection, "Change feed lagged, re-querying");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }

            match store.query(&query).await {
                Ok(documents) => {
                    tx.send_if_modified(|current| {
                        if *current == documents {
                            false
                        } else {
                            *current = documents;
                            true
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, collection = %query.collection, "Live query refresh failed");
                }
            }
        }

        tracing::debug!(collection = %query.collection, "Live query released");
    });

    Ok(Subscription::new(rx, token))
}

/// Opens a live subscription to a single document
///
/// Yields `None` while the document does not exist. Only changes to this
/// document (or feed resyncs, which carry the nil id) trigger a re-read.
pub async fn subscribe_document(
    store: Arc<dyn DocumentStore>,
    collection: Collection,
    id: Uuid,
) -> StoreResult<Subscription<Option<Document>>> {
    let mut changes = store.changes();
    let initial = store.get(collection, id).await?;

    Ok(subscription::spawn_producer(initial, move |tx, cancelled| async move {
        loop {
            tokio::select! {
                _ = cancelled.cancelled() => break,
                received = changes.recv() => match received {
                    Ok(change) if change.collection != collection => continue,
                    Ok(change) if change.id != id && !change.id.is_nil() => continue,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }

            match store.get(collection, id).await {
                Ok(document) => {
                    tx.send_if_modified(|current| {
                        if *current == document {
                            false
                        } else {
                            *current = document;
                            true
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, %collection, %id, "Live document refresh failed");
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Note {
        id: Uuid,
        text: String,
    }

    #[test]
    fn test_collection_round_trip() {
        assert_eq!("users".parse::<Collection>().unwrap(), Collection::Users);
        assert_eq!("tasks".parse::<Collection>().unwrap(), Collection::Tasks);
        assert!("projects".parse::<Collection>().is_err());
        assert_eq!(Collection::Tasks.to_string(), "tasks");
    }

    #[test]
    fn test_decode_injects_id() {
        let id = Uuid::new_v4();
        let mut data = Fields::new();
        data.insert("text".to_string(), json!("hello"));

        let note: Note = Document::new(id, data).decode(Collection::Tasks).unwrap();
        assert_eq!(note, Note { id, text: "hello".to_string() });
    }

    #[test]
    fn test_decode_reports_document() {
        let id = Uuid::new_v4();
        let err = Document::new(id, Fields::new())
            .decode::<Note>(Collection::Tasks)
            .unwrap_err();

        match err {
            StoreError::Decode { collection, id: failed, .. } => {
                assert_eq!(collection, Collection::Tasks);
                assert_eq!(failed, id);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_encode_fields_drops_id() {
        let note = Note {
            id: Uuid::new_v4(),
            text: "hello".to_string(),
        };

        let fields = encode_fields(&note).unwrap();
        assert!(!fields.contains_key("id"));
        assert_eq!(fields["text"], json!("hello"));
    }

    #[test]
    fn test_encode_rejects_non_objects() {
        assert!(encode_fields(&42).is_err());
    }

    #[tokio::test]
    async fn test_subscribe_document_follows_one_id() {
        use std::time::Duration;

        let store: Arc<dyn DocumentStore> = Arc::new(memory::MemoryStore::new());
        let id = Uuid::new_v4();

        let mut live = subscribe_document(store.clone(), Collection::Users, id)
            .await
            .unwrap();
        assert!(live.current().is_none());

        // Another document in the same collection does not wake the subscription
        store
            .set(Collection::Users, Uuid::new_v4(), Fields::new())
            .await
            .unwrap();

        let mut data = Fields::new();
        data.insert("name".to_string(), json!("Ann"));
        store.set(Collection::Users, id, data).await.unwrap();

        let snapshot = tokio::time::timeout(Duration::from_secs(1), live.changed())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.unwrap().field("name"), Some(&json!("Ann")));

        store.delete(Collection::Users, id).await.unwrap();
        let snapshot = tokio::time::timeout(Duration::from_secs(1), live.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(snapshot.is_none());
    }
}
