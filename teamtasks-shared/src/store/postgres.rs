/// PostgreSQL document store
///
/// Documents live in a single `documents` table keyed by `(collection, id)`
/// with their fields in a JSONB column. A trigger on the table calls
/// `pg_notify('document_changes', '<collection>:<id>:<kind>')` on every write;
/// a background [`PgListener`] forwards those notifications onto the store's
/// broadcast change feed, so writes from any API instance reach every
/// subscriber.
///
/// Overwriting an existing document is reported as [`ChangeKind::Update`]
/// because the upsert fires the table's update trigger.
///
/// # Example
///
/// ```no_run
/// use teamtasks_shared::db::pool::{connect, PoolConfig};
/// use teamtasks_shared::store::postgres::PgDocumentStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = connect(&PoolConfig::new(std::env::var("DATABASE_URL")?)).await?;
///
/// let store = PgDocumentStore::connect(pool).await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use sqlx::postgres::{PgListener, PgPool};
use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use super::{
    Change, ChangeKind, Collection, Document, DocumentStore, Fields, FilterOp, Query,
    StoreError, StoreResult, CHANGE_FEED_CAPACITY,
};

/// Notification channel the documents trigger publishes on
pub const CHANGE_CHANNEL: &str = "document_changes";

/// Delay before retrying after the listener connection fails
const LISTENER_RETRY_DELAY: Duration = Duration::from_secs(1);

/// PostgreSQL-backed document store
pub struct PgDocumentStore {
    pool: PgPool,
    changes: broadcast::Sender<Change>,
    _listener: DropGuard,
}

impl PgDocumentStore {
    /// Connects the store and starts the change listener
    ///
    /// # Errors
    ///
    /// Returns an error if the listener connection cannot be established.
    pub async fn connect(pool: PgPool) -> StoreResult<Self> {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);

        let mut listener = PgListener::connect_with(&pool).await?;
        listener.listen(CHANGE_CHANNEL).await?;

        let token = CancellationToken::new();
        tokio::spawn(run_listener(listener, changes.clone(), token.clone()));

        tracing::info!(channel = CHANGE_CHANNEL, "Document change listener started");

        Ok(Self {
            pool,
            changes,
            _listener: token.drop_guard(),
        })
    }

    /// Returns the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Forwards Postgres notifications onto the broadcast feed until cancelled
async fn run_listener(
    mut listener: PgListener,
    changes: broadcast::Sender<Change>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            received = listener.recv() => match received {
                Ok(notification) => match parse_notification(notification.payload()) {
                    Some(change) => {
                        let _ = changes.send(change);
                    }
                    None => {
                        tracing::warn!(payload = notification.payload(), "Ignoring malformed change notification");
                    }
                },
                Err(e) => {
                    tracing::warn!(error = %e, "Change listener connection lost, reconnecting");
                    tokio::time::sleep(LISTENER_RETRY_DELAY).await;

                    // Notifications sent while disconnected are lost; make every subscriber re-query
                    for collection in [Collection::Users, Collection::Tasks] {
                        let _ = changes.send(Change {
                            collection,
                            id: Uuid::nil(),
                            kind: ChangeKind::Update,
                        });
                    }
                }
            },
        }
    }

    tracing::debug!("Document change listener stopped");
}

/// Parses a `<collection>:<id>:<kind>` payload
fn parse_notification(payload: &str) -> Option<Change> {
    let mut parts = payload.splitn(3, ':');
    let collection = parts.next()?.parse().ok()?;
    let id = parts.next()?.parse().ok()?;
    let kind = match parts.next()? {
        "set" => ChangeKind::Set,
        "update" => ChangeKind::Update,
        "delete" => ChangeKind::Delete,
        _ => return None,
    };

    Some(Change {
        collection,
        id,
        kind,
    })
}

/// Builds the SELECT for a query
///
/// Missing fields compare as JSON `null`, matching the in-memory filter
/// semantics.
fn build_select(query: &Query) -> QueryBuilder<'static, Postgres> {
    let mut builder =
        QueryBuilder::new("SELECT id, data FROM documents WHERE collection = ");
    builder.push_bind(query.collection.as_str());

    for filter in &query.filters {
        match &filter.op {
            FilterOp::Eq(value) => {
                builder
                    .push(" AND COALESCE(data -> ")
                    .push_bind(filter.field.clone())
                    .push(", 'null'::jsonb) = ")
                    .push_bind(Json(value.clone()));
            }
            FilterOp::In(values) if values.is_empty() => {
                builder.push(" AND FALSE");
            }
            FilterOp::In(values) => {
                builder
                    .push(" AND ")
                    .push_bind(Json(values.clone()))
                    .push(" @> jsonb_build_array(COALESCE(data -> ")
                    .push_bind(filter.field.clone())
                    .push(", 'null'::jsonb))");
            }
        }
    }

    builder.push(" ORDER BY id");
    builder
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: Collection, id: Uuid) -> StoreResult<Option<Document>> {
        let row: Option<(Json<Fields>,)> =
            sqlx::query_as("SELECT data FROM documents WHERE collection = $1 AND id = $2")
                .bind(collection.as_str())
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(Json(data),)| Document::new(id, data)))
    }

    async fn query(&self, query: &Query) -> StoreResult<Vec<Document>> {
        let rows: Vec<(Uuid, Json<Fields>)> = build_select(query)
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(id, Json(data))| Document::new(id, data))
            .collect())
    }

    async fn set(&self, collection: Collection, id: Uuid, data: Fields) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data, updated_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (collection, id)
            DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(Json(data))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(&self, collection: Collection, id: Uuid, fields: Fields) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET data = data || $3, updated_at = NOW()
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(Json(fields))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { collection, id });
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    fn changes(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    async fn ping(&self) -> StoreResult<()> {
        crate::db::pool::ping(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Execute;

    #[test]
    fn test_parse_notification() {
        let id = Uuid::new_v4();
        let change = parse_notification(&format!("tasks:{}:delete", id)).unwrap();

        assert_eq!(change.collection, Collection::Tasks);
        assert_eq!(change.id, id);
        assert_eq!(change.kind, ChangeKind::Delete);
    }

    #[test]
    fn test_parse_notification_rejects_garbage() {
        assert!(parse_notification("").is_none());
        assert!(parse_notification("projects:00000000-0000-0000-0000-000000000000:set").is_none());
        assert!(parse_notification("users:not-a-uuid:set").is_none());
        assert!(parse_notification(&format!("users:{}:truncate", Uuid::new_v4())).is_none());
    }

    #[test]
    fn test_build_select_shapes_sql() {
        let query = Query::new(Collection::Tasks)
            .where_eq("completed", true)
            .where_in("userId", ["a", "b"]);

        let mut builder = build_select(&query);
        let sql = builder.build().sql().to_string();

        assert!(sql.starts_with("SELECT id, data FROM documents WHERE collection = $1"));
        assert!(sql.contains("COALESCE(data -> $2, 'null'::jsonb) = $3"));
        assert!(sql.contains("$4 @> jsonb_build_array(COALESCE(data -> $5, 'null'::jsonb))"));
        assert!(sql.ends_with("ORDER BY id"));
    }

    #[test]
    fn test_build_select_empty_in() {
        let query = Query::new(Collection::Users).where_in("id", Vec::<String>::new());
        let mut builder = build_select(&query);

        assert!(builder.build().sql().contains("AND FALSE"));
    }
}
