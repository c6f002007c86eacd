/// Common test utilities for integration tests
///
/// This module provides shared infrastructure for integration tests:
/// - An in-memory backend (store, identities, recording push sender)
/// - A bootstrapped admin account and its access token
/// - Request helpers driving the router with `tower::ServiceExt::oneshot`
/// - An SSE reader for the live endpoints

use axum::body::{Body, BodyDataStream};
use axum::http::{Request, StatusCode};
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use teamtasks_api::app::{build_router, AppState};
use teamtasks_api::config::{ApiConfig, Config, JwtConfig, PushConfig};
use teamtasks_shared::auth::identity::memory::MemoryIdentityProvider;
use teamtasks_shared::notify::{RecordingPushSender, DEFAULT_PUSH_ENDPOINT};
use teamtasks_shared::services::bootstrap_admin;
use teamtasks_shared::store::memory::MemoryStore;
use teamtasks_shared::Backend;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret-of-32-bytes!";
pub const PASSWORD: &str = "pw123456";

/// Test context containing all necessary resources
pub struct TestContext {
    pub app: axum::Router,
    pub backend: Backend,
    pub push: Arc<RecordingPushSender>,
    pub admin_token: String,
}

impl TestContext {
    /// Creates a context with a fresh in-memory backend and one admin
    pub async fn new() -> anyhow::Result<Self> {
        let push = Arc::new(RecordingPushSender::new());
        let backend = Backend::new(
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryIdentityProvider::new(TEST_SECRET)),
            push.clone(),
        );

        bootstrap_admin(&backend, "root@x.com", PASSWORD, "Root").await?;

        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
            },
            database: None,
            jwt: JwtConfig {
                secret: TEST_SECRET.to_string(),
            },
            push: PushConfig {
                enabled: true,
                endpoint: DEFAULT_PUSH_ENDPOINT.to_string(),
            },
            bootstrap_admin: None,
        };

        let app = build_router(AppState::new(backend.clone(), config));

        let mut ctx = TestContext {
            app,
            backend,
            push,
            admin_token: String::new(),
        };
        ctx.admin_token = ctx.login("root@x.com", PASSWORD).await?;

        Ok(ctx)
    }

    /// Sends a request and returns the status and JSON body
    ///
    /// An empty body is returned as `Value::Null`.
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> anyhow::Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;

        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };

        Ok((status, json))
    }

    /// Opens a streaming endpoint and returns its body stream
    pub async fn open_stream(
        &self,
        uri: &str,
        token: &str,
    ) -> anyhow::Result<(StatusCode, BodyDataStream)> {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .header("authorization", format!("Bearer {}", token))
            .body(Body::empty())?;

        let response = self.app.clone().oneshot(request).await?;
        Ok((response.status(), response.into_body().into_data_stream()))
    }

    /// Signs in and returns the access token
    pub async fn login(&self, email: &str, password: &str) -> anyhow::Result<String> {
        let (status, body) = self
            .send(
                "POST",
                "/v1/auth/login",
                None,
                Some(serde_json::json!({ "email": email, "password": password })),
            )
            .await?;

        if status != StatusCode::OK {
            anyhow::bail!("login failed with {}: {}", status, body);
        }

        body["accessToken"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("login response without accessToken: {}", body))
    }

    /// Creates a user through the admin API and returns their id
    pub async fn create_user(
        &self,
        name: &str,
        role: &str,
        manager_id: Option<&str>,
    ) -> anyhow::Result<String> {
        let (status, body) = self
            .send(
                "POST",
                "/v1/admin/users",
                Some(&self.admin_token),
                Some(serde_json::json!({
                    "name": name,
                    "email": email_for(name),
                    "password": PASSWORD,
                    "role": role,
                    "managerId": manager_id,
                })),
            )
            .await?;

        if status != StatusCode::CREATED {
            anyhow::bail!("user creation failed with {}: {}", status, body);
        }

        body["user"]["id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("response without user id: {}", body))
    }
}

/// Email address the helpers use for a display name
pub fn email_for(name: &str) -> String {
    format!("{}@x.com", name.to_lowercase())
}

/// Reads the next complete SSE event from a stream, as raw text
///
/// Fails if no event arrives within two seconds.
pub async fn next_event(stream: &mut BodyDataStream) -> anyhow::Result<String> {
    let mut buffer = String::new();

    loop {
        if let Some(end) = buffer.find("\n\n") {
            return Ok(buffer[..end].to_string());
        }

        let chunk = tokio::time::timeout(Duration::from_secs(2), stream.next())
            .await
            .map_err(|_| anyhow::anyhow!("no SSE event within 2 seconds"))?
            .ok_or_else(|| anyhow::anyhow!("SSE stream ended"))??;

        buffer.push_str(std::str::from_utf8(&chunk)?);
    }
}

/// Helper to wait for condition with timeout
pub async fn wait_for<F, Fut>(condition: F, timeout_secs: u64) -> anyhow::Result<()>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_secs(timeout_secs);

    loop {
        if condition().await {
            return Ok(());
        }

        if start.elapsed() > timeout {
            anyhow::bail!("Condition not met within {} seconds", timeout_secs);
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
