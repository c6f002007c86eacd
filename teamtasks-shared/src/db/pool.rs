/// PostgreSQL connection pool
///
/// One pool is shared by the document store and the identity provider. The
/// store's change listener holds a dedicated connection outside the pool, so
/// a server needs `max_connections + 1` connections from the database.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Default pool size
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Pool settings
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Upper bound on pooled connections
    pub max_connections: u32,

    /// How long a caller waits for a free connection
    pub acquire_timeout: Duration,

    /// Idle connections are closed after this long
    pub idle_timeout: Option<Duration>,
}

impl PoolConfig {
    /// Settings for `url` with default limits
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }
}

/// Opens the pool and checks the database answers
///
/// # Errors
///
/// Returns an error if the URL is invalid or the database is unreachable.
pub async fn connect(config: &PoolConfig) -> Result<PgPool, sqlx::Error> {
    tracing::info!(
        max_connections = config.max_connections,
        acquire_timeout_ms = config.acquire_timeout.as_millis() as u64,
        "Connecting to PostgreSQL"
    );

    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout);

    if let Some(idle) = config.idle_timeout {
        options = options.idle_timeout(idle);
    }

    let pool = options.connect(&config.url).await?;
    ping(&pool).await?;

    tracing::info!("PostgreSQL pool ready");
    Ok(pool)
}

/// Round-trips a trivial query
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
}
