//! Local HTTP API consumed by the web front end.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::client::{BackendClient, ReplyGenerator};
use crate::config::AppConfig;
use crate::error::{ClientError, IdentityError, ServerError};
use crate::identity::{IdentityStore, SignUpRequest, UserAccount};
use crate::profile::{DEFAULT_PROFILE_USER, PolicyProfile, RequestProfile};
use crate::session::{
    ChatSession, ChatThread, RequestIdentity, SendOutcome, SharedSession, ThreadId,
};

/// Build the application state from configuration.
pub fn build_state(config: &AppConfig) -> Result<AppState, ServerError> {
    let backend = match config.backend.request_timeout() {
        Some(timeout) => BackendClient::with_timeout(&config.backend.base_url, timeout)?,
        None => BackendClient::new(&config.backend.base_url)?,
    };
    let backend = Arc::new(backend);

    let identity = Arc::new(IdentityStore::open(&config.identity.path)?);

    // A sign-in survives restarts, like the browser's local storage.
    let mut session = ChatSession::new();
    session.set_identity(identity.current_user().map(request_identity));

    Ok(AppState {
        session: SharedSession::new(session),
        replies: Arc::clone(&backend) as Arc<dyn ReplyGenerator>,
        profiles: backend,
        identity,
    })
}

/// Build the router with all API routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(api_health))
        .route("/api/session", get(api_get_session))
        .route("/api/session/draft", put(api_set_draft))
        .route("/api/threads", post(api_create_thread))
        .route(
            "/api/threads/{id}",
            get(api_get_thread)
                .patch(api_rename_thread)
                .delete(api_delete_thread),
        )
        .route("/api/threads/{id}/select", post(api_select_thread))
        .route("/api/messages", post(api_send_message))
        .route("/api/auth/signup", post(api_sign_up))
        .route("/api/auth/signin", post(api_sign_in))
        .route("/api/auth/signout", post(api_sign_out))
        .route("/api/auth/me", get(api_current_user))
        .route("/api/profile", get(api_get_profile).put(api_save_profile))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> Result<(), ServerError> {
    let state = build_state(&config)?;

    info!(
        name: "backend.config.loaded",
        base_url = %config.backend.base_url,
        timeout_secs = ?config.backend.request_timeout_secs,
        "Backend configuration loaded"
    );

    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

fn request_identity(account: UserAccount) -> RequestIdentity {
    RequestIdentity {
        user_id: account.id,
        profile: Some(RequestProfile::Account(account.profile)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Error returned by API handlers, rendered as `{ "error": ... }`.
#[derive(Debug)]
pub enum ApiError {
    Identity(IdentityError),
    Upstream(ClientError),
    NotFound(String),
}

impl From<IdentityError> for ApiError {
    fn from(e: IdentityError) -> Self {
        Self::Identity(e)
    }
}

impl From<ClientError> for ApiError {
    fn from(e: ClientError) -> Self {
        Self::Upstream(e)
    }
}

impl ApiError {
    fn message(&self) -> String {
        match self {
            Self::Identity(e) => e.to_string(),
            Self::Upstream(e) => e.to_string(),
            Self::NotFound(what) => format!("{what} not found"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Identity(IdentityError::EmailTaken) => StatusCode::CONFLICT,
            Self::Identity(IdentityError::InvalidCredentials) => StatusCode::UNAUTHORIZED,
            Self::Identity(IdentityError::Invalid(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Identity(e) => {
                tracing::error!(error = %e, "Identity store failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Upstream(e) => {
                tracing::error!(error = %e, "Backend request failed");
                StatusCode::BAD_GATEWAY
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
        };
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session & threads
// ─────────────────────────────────────────────────────────────────────────────

/// Sidebar entry for one thread.
#[derive(Debug, Serialize)]
struct ThreadSummary {
    id: ThreadId,
    title: String,
    message_count: usize,
    last_activity: Option<DateTime<Utc>>,
}

/// Snapshot of the session for the view layer.
#[derive(Debug, Serialize)]
struct SessionView {
    /// Most recently created first.
    threads: Vec<ThreadSummary>,
    current_thread_id: ThreadId,
    pending: bool,
    draft: String,
    user_id: Option<String>,
}

impl SessionView {
    fn of(session: &ChatSession) -> Self {
        Self {
            threads: session
                .threads()
                .iter()
                .map(|t| ThreadSummary {
                    id: t.id(),
                    title: t.title().to_string(),
                    message_count: t.messages().len(),
                    last_activity: t.last_activity(),
                })
                .collect(),
            current_thread_id: session.current_id(),
            pending: session.is_pending(),
            draft: session.draft().to_string(),
            user_id: session.identity().map(|i| i.user_id.clone()),
        }
    }
}

/// GET /api/health - Local liveness plus backend reachability.
async fn api_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let backend = match state.replies.health().await {
        Ok(health) => json!(health),
        Err(e) => {
            tracing::warn!(error = %e, "Backend health check failed");
            json!({ "status": "unreachable", "message": e.to_string() })
        }
    };
    Json(json!({ "status": "ok", "backend": backend }))
}

/// GET /api/session - Threads, current thread, pending flag and draft.
async fn api_get_session(State(state): State<AppState>) -> Json<SessionView> {
    Json(state.session.read(SessionView::of))
}

#[derive(Debug, Deserialize)]
struct DraftRequest {
    text: String,
}

/// PUT /api/session/draft - Replace the draft text.
async fn api_set_draft(
    State(state): State<AppState>,
    Json(req): Json<DraftRequest>,
) -> Json<SessionView> {
    Json(state.session.update(|s| {
        s.set_draft(req.text);
        SessionView::of(s)
    }))
}

/// POST /api/threads - Create a thread and make it current.
async fn api_create_thread(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<ChatThread>), ApiError> {
    state
        .session
        .update(|s| {
            let id = s.create_thread();
            s.thread(id).cloned()
        })
        .map(|thread| (StatusCode::CREATED, Json(thread)))
        .ok_or_else(|| ApiError::NotFound("new thread".to_string()))
}

/// GET /api/threads/:id - A thread with its messages.
async fn api_get_thread(
    State(state): State<AppState>,
    Path(id): Path<ThreadId>,
) -> Result<Json<ChatThread>, ApiError> {
    state
        .session
        .read(|s| s.thread(id).cloned())
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("thread {id}")))
}

#[derive(Debug, Deserialize)]
struct RenameRequest {
    title: String,
}

/// PATCH /api/threads/:id - Rename. Unknown ids leave the session unchanged.
async fn api_rename_thread(
    State(state): State<AppState>,
    Path(id): Path<ThreadId>,
    Json(req): Json<RenameRequest>,
) -> Json<SessionView> {
    Json(state.session.update(|s| {
        s.rename_thread(id, req.title);
        SessionView::of(s)
    }))
}

/// POST /api/threads/:id/select - Make a thread current.
async fn api_select_thread(
    State(state): State<AppState>,
    Path(id): Path<ThreadId>,
) -> Json<SessionView> {
    Json(state.session.update(|s| {
        s.select_thread(id);
        SessionView::of(s)
    }))
}

/// DELETE /api/threads/:id - Delete a thread.
async fn api_delete_thread(
    State(state): State<AppState>,
    Path(id): Path<ThreadId>,
) -> Json<SessionView> {
    Json(state.session.update(|s| {
        s.delete_thread(id);
        SessionView::of(s)
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Messages
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SendRequest {
    message: String,
}

#[derive(Debug, Serialize)]
struct SendResponse {
    outcome: SendOutcome,
    session: SessionView,
    /// The thread the message was sent on; absent if it was deleted
    /// before the reply arrived.
    thread: Option<ChatThread>,
}

/// POST /api/messages - Send on the current thread and wait for the reply.
async fn api_send_message(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> Json<SendResponse> {
    let (thread_id, outcome) = state
        .session
        .send_message(&req.message, state.replies.as_ref())
        .await;
    tracing::info!(thread_id = %thread_id, outcome = ?outcome, "Send resolved");

    Json(state.session.read(|s| SendResponse {
        outcome,
        session: SessionView::of(s),
        thread: s.thread(thread_id).cloned(),
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Identity
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SignInRequest {
    email: String,
    password: String,
}

/// POST /api/auth/signup - Register an account (does not sign in).
async fn api_sign_up(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<UserAccount>), ApiError> {
    let account = state.identity.sign_up(req)?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// POST /api/auth/signin - Sign in and attach the user to outgoing requests.
async fn api_sign_in(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<UserAccount>, ApiError> {
    let account = state.identity.sign_in(&req.email, &req.password)?;
    state
        .session
        .update(|s| s.set_identity(Some(request_identity(account.clone()))));
    Ok(Json(account))
}

/// POST /api/auth/signout - Sign out and detach the user.
async fn api_sign_out(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.identity.sign_out()?;
    state.session.update(|s| s.set_identity(None));
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me - The signed-in user, or null.
async fn api_current_user(State(state): State<AppState>) -> Json<Option<UserAccount>> {
    Json(state.identity.current_user())
}

// ─────────────────────────────────────────────────────────────────────────────
// Profile
// ─────────────────────────────────────────────────────────────────────────────

fn profile_user(state: &AppState) -> String {
    state
        .session
        .read(|s| s.identity().map(|i| i.user_id.clone()))
        .unwrap_or_else(|| DEFAULT_PROFILE_USER.to_string())
}

/// GET /api/profile - Backend profile of the current user (empty if none).
async fn api_get_profile(State(state): State<AppState>) -> Result<Json<PolicyProfile>, ApiError> {
    let user_id = profile_user(&state);
    let profile = state.profiles.fetch_profile(&user_id).await?;
    Ok(Json(profile.unwrap_or_default()))
}

/// PUT /api/profile - Create or replace the current user's backend profile.
async fn api_save_profile(
    State(state): State<AppState>,
    Json(profile): Json<PolicyProfile>,
) -> Result<StatusCode, ApiError> {
    let user_id = profile_user(&state);
    state.profiles.save_profile(&user_id, &profile).await?;
    tracing::info!(user_id = %user_id, "Profile saved");
    Ok(StatusCode::NO_CONTENT)
}
