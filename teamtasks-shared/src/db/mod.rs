/// PostgreSQL plumbing shared by the persistent backends
///
/// - `pool`: connection pool setup and liveness check
/// - `migrations`: embedded schema migrations
///
/// The backends themselves live in `store::postgres` and
/// `auth::identity::postgres`.

pub mod migrations;
pub mod pool;
