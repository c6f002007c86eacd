//! # TeamTasks API
//!
//! HTTP front end for the TeamTasks dashboards. Every route resolves the
//! caller's session, opens the dashboard matching their role, and delegates
//! to it; live views are served as Server-Sent Events.
//!
//! - `app`: shared state, router, session layer
//! - `config`: environment configuration
//! - `error`: HTTP error mapping
//! - `routes`: handlers grouped by dashboard

pub mod app;
pub mod config;
pub mod error;
pub mod routes;
