/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use teamtasks_api::{app::{build_router, AppState}, config::Config};
/// use teamtasks_shared::Backend;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let backend = Backend::in_memory(config.jwt.secret.clone());
/// let app = build_router(AppState::new(backend, config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use teamtasks_shared::auth::middleware;
use teamtasks_shared::Backend;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Store, identity, and push handles
    pub backend: Backend,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates new application state
    pub fn new(backend: Backend, config: Config) -> Self {
        Self {
            backend,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                          # Health check (public)
/// └── /v1/
///     ├── /auth/
///     │   ├── POST /login              # public
///     │   ├── POST /refresh            # public
///     │   └── POST /logout
///     ├── /me/
///     │   ├── GET  /                   # any role
///     │   ├── PUT  /push-token         # any role
///     │   ├── GET  /tasks              # User
///     │   ├── GET  /tasks/stream
///     │   └── POST /tasks
///     ├── /admin/users/                # Admin
///     │   ├── GET    /
///     │   ├── GET    /stream
///     │   ├── POST   /
///     │   ├── DELETE /:id
///     │   └── POST   /:id/toggle-role
///     ├── /manager/                    # Manager
///     │   ├── GET  /subordinates
///     │   ├── GET  /tasks?tab=
///     │   ├── GET  /tasks/stream?tab=
///     │   └── POST /tasks
///     └── /tasks/                      # owner or owner's manager
///         ├── POST   /:id/toggle
///         └── DELETE /:id
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Logging (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Session authentication (per-route basis)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    // Login and refresh are public; logout needs the session
    let auth_routes = Router::new()
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .merge(
            Router::new()
                .route("/logout", post(routes::auth::logout))
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    session_auth_layer,
                )),
        );

    let me_routes = Router::new()
        .route("/", get(routes::me::get_profile))
        .route("/push-token", put(routes::me::register_push_token))
        .route("/tasks", get(routes::me::get_board).post(routes::me::create_task))
        .route("/tasks/stream", get(routes::me::stream_board));

    let admin_routes = Router::new()
        .route("/users", get(routes::admin::list_users).post(routes::admin::create_user))
        .route("/users/stream", get(routes::admin::stream_users))
        .route("/users/:id", delete(routes::admin::delete_user))
        .route("/users/:id/toggle-role", post(routes::admin::toggle_role));

    let manager_routes = Router::new()
        .route("/subordinates", get(routes::manager::list_subordinates))
        .route("/tasks", get(routes::manager::list_tasks).post(routes::manager::create_task))
        .route("/tasks/stream", get(routes::manager::stream_tasks));

    let task_routes = Router::new()
        .route("/:id", delete(routes::tasks::delete_task))
        .route("/:id/toggle", post(routes::tasks::toggle_task));

    // Everything below requires a verified session
    let session_routes = Router::new()
        .nest("/me", me_routes)
        .nest("/admin", admin_routes)
        .nest("/manager", manager_routes)
        .nest("/tasks", task_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            session_auth_layer,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(session_routes);

    let cors = cors_layer(&state.config.api.cors_origins);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Session authentication middleware layer
///
/// Verifies the bearer token with the identity provider, then injects
/// `AuthContext` into request extensions.
async fn session_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth = middleware::authenticate(state.backend.identities.as_ref(), req.headers()).await?;

    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}
