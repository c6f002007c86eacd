/// Schema migrations
///
/// The SQL files under `teamtasks-shared/migrations/` are embedded at compile
/// time. They create the `documents` table with its change-feed trigger, and
/// the `identities` and `revoked_sessions` tables used by the identity
/// provider.

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::PgPool;

/// Embedded migrations
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Applies every pending migration
///
/// # Errors
///
/// Returns an error if a migration fails; the failed migration is rolled back.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    tracing::info!(
        embedded = MIGRATOR.iter().filter(|m| m.migration_type.is_up_migration()).count(),
        "Applying database migrations"
    );

    MIGRATOR.run(pool).await.map_err(|e| {
        tracing::error!(error = %e, "Database migration failed");
        e
    })
}

/// Latest successfully applied migration version, if any
pub async fn schema_version(pool: &PgPool) -> Result<Option<i64>, sqlx::Error> {
    let table: Option<String> =
        sqlx::query_scalar("SELECT to_regclass('public._sqlx_migrations')::text")
            .fetch_one(pool)
            .await?;

    if table.is_none() {
        return Ok(None);
    }

    sqlx::query_scalar("SELECT MAX(version) FROM _sqlx_migrations WHERE success")
        .fetch_one(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_reversible_pairs() {
        let ups: Vec<_> = MIGRATOR
            .iter()
            .filter(|m| m.migration_type.is_up_migration())
            .map(|m| m.description.to_string())
            .collect();
        let downs = MIGRATOR
            .iter()
            .filter(|m| m.migration_type.is_down_migration())
            .count();

        assert_eq!(ups, vec!["create documents", "create identities"]);
        assert_eq!(downs, ups.len());
    }
}
