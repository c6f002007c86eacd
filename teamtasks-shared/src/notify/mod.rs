/// Push notification delivery
///
/// Notifications are delivered through the Expo push service: one POST per
/// message carrying the recipient's push token, a title, and a body. Delivery
/// is best-effort. Callers that must not block or fail on delivery use
/// [`send_best_effort`], which spawns the send and logs failures at `warn`.
///
/// # Senders
///
/// - [`ExpoPushSender`]: HTTP delivery via `reqwest`
/// - [`NoopPushSender`]: discards messages (push disabled)
/// - [`RecordingPushSender`]: keeps messages in memory for tests
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use teamtasks_shared::notify::{send_best_effort, ExpoPushSender, PushMessage, PushSender};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let sender: Arc<dyn PushSender> = Arc::new(ExpoPushSender::new(
///     "https://exp.host/--/api/v2/push/send",
/// )?);
///
/// send_best_effort(
///     sender,
///     PushMessage::new("ExponentPushToken[abc]", "New Task Assigned", "You have been assigned: Ship report"),
/// );
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Default Expo push endpoint
pub const DEFAULT_PUSH_ENDPOINT: &str = "https://exp.host/--/api/v2/push/send";

/// Error type for push delivery
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// Request could not be sent or the service rejected it
    #[error("Push delivery failed: {0}")]
    Delivery(String),

    /// HTTP client could not be built
    #[error("Failed to build push client: {0}")]
    Client(String),
}

/// A single push message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    /// Recipient push token
    pub to: String,

    /// Notification sound
    pub sound: String,

    /// Title line
    pub title: String,

    /// Body text
    pub body: String,
}

impl PushMessage {
    /// Creates a message with the default sound
    pub fn new(to: impl Into<String>, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            sound: "default".to_string(),
            title: title.into(),
            body: body.into(),
        }
    }

    /// The notification sent to a user when a task is assigned to them
    pub fn task_assigned(to: impl Into<String>, task_title: &str) -> Self {
        Self::new(
            to,
            "New Task Assigned",
            format!("You have been assigned: {}", task_title),
        )
    }
}

/// Contract for push delivery backends
#[async_trait]
pub trait PushSender: Send + Sync {
    /// Delivers one message
    async fn send(&self, message: &PushMessage) -> Result<(), PushError>;
}

/// Sends a message on a spawned task, logging failures
///
/// Never blocks the caller and never reports failure to it.
pub fn send_best_effort(sender: Arc<dyn PushSender>, message: PushMessage) {
    tokio::spawn(async move {
        match sender.send(&message).await {
            Ok(()) => tracing::debug!(title = %message.title, "Push notification sent"),
            Err(e) => tracing::warn!(error = %e, title = %message.title, "Push notification failed"),
        }
    });
}

/// Expo push service sender
#[derive(Debug, Clone)]
pub struct ExpoPushSender {
    endpoint: String,
    client: reqwest::Client,
}

impl ExpoPushSender {
    /// Creates a sender posting to `endpoint`
    pub fn new(endpoint: impl Into<String>) -> Result<Self, PushError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PushError::Client(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    /// Endpoint messages are posted to
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl PushSender for ExpoPushSender {
    async fn send(&self, message: &PushMessage) -> Result<(), PushError> {
        self.client
            .post(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(message)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| PushError::Delivery(e.to_string()))?;

        Ok(())
    }
}

/// Sender that drops every message
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPushSender;

#[async_trait]
impl PushSender for NoopPushSender {
    async fn send(&self, message: &PushMessage) -> Result<(), PushError> {
        tracing::trace!(title = %message.title, "Push disabled, dropping message");
        Ok(())
    }
}

/// Sender that records messages, optionally failing every send
#[derive(Debug, Default)]
pub struct RecordingPushSender {
    sent: Mutex<Vec<PushMessage>>,
    fail: bool,
}

impl RecordingPushSender {
    /// Creates a recorder that accepts every message
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a recorder whose sends always fail (messages are still recorded)
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Messages passed to `send` so far
    pub async fn sent(&self) -> Vec<PushMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl PushSender for RecordingPushSender {
    async fn send(&self, message: &PushMessage) -> Result<(), PushError> {
        self.sent.lock().await.push(message.clone());

        if self.fail {
            return Err(PushError::Delivery("recording sender set to fail".to_string()));
        }
        Ok(())
    }
}
