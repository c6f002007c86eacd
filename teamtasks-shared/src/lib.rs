//! # TeamTasks Shared Library
//!
//! Core types and services for a role-based task manager, used by the
//! TeamTasks API server.
//!
//! ## Module Organization
//!
//! - `store`: Document store abstraction with live subscriptions
//! - `auth`: Identity provider, sessions, passwords, and role checks
//! - `models`: User profiles and tasks
//! - `services`: Admin, manager, and user dashboards plus role routing
//! - `notify`: Push notification delivery
//! - `db`: PostgreSQL pool and migrations
//! - `error`: Domain error taxonomy

pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod notify;
pub mod services;
pub mod store;

pub use error::{DomainError, DomainResult};
pub use services::Backend;

/// Current version of the TeamTasks shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
