/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Sign-in, token refresh, and sign-out
/// - `me`: The caller's profile, push token, and personal task board
/// - `admin`: User lifecycle (Admin role)
/// - `manager`: Subordinates and tabbed task views (Manager role)
/// - `tasks`: Toggle and delete for task owners and their managers
/// - `stream`: Server-Sent Events adapter for live subscriptions

pub mod admin;
pub mod auth;
pub mod health;
pub mod manager;
pub mod me;
pub mod stream;
pub mod tasks;

use serde::Serialize;

/// Response carrying only a confirmation message
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
