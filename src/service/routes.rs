//! Axum routes for the authorship service.

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, Json, Path, State},
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::credentials::BearerToken;
use crate::error::{CoreError, ErrorKind};
use crate::graph::EdgeRepair;
use crate::types::{
    AuthenticatedActor, LoginPayload, Post, PostDraft, PostId, PostPatch, RegistrationPayload,
    Session, UserId, UserPatch, UserView,
};

use super::state::{ServiceState, ServiceStore};
use super::validation::{
    validate_draft, validate_login, validate_post_patch, validate_registration, validate_user_patch,
};

type AppState<S> = Arc<ServiceState<S>>;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Success body shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Always `true`; failures use [`ErrorResponse`].
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Number of items, for list responses.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub count: Option<usize>,
    /// The payload.
    pub data: T,
}

impl<T> Envelope<T> {
    fn ok(message: &str, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
            count: None,
            data,
        })
    }
}

impl<T> Envelope<Vec<T>> {
    fn list(message: &str, data: Vec<T>) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
            count: Some(data.len()),
            data,
        })
    }
}

/// Structured error response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`.
    pub success: bool,
    /// Human-readable error message.
    pub message: String,
    /// Machine-readable error code (see [`ErrorKind::code`]).
    pub code: String,
    /// The pending edge write, for partial follow failures.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub repair: Option<EdgeRepair>,
}

/// Error that renders as an HTTP response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                success: false,
                message: message.into(),
                code: kind.code().to_string(),
                repair: None,
            },
        }
    }

    /// Map a core error to a status code.
    ///
    /// With `conceal_forbidden`, ownership failures look like missing
    /// resources.
    pub fn from_core(err: CoreError, conceal_forbidden: bool) -> Self {
        let kind = err.kind();
        let status = match kind {
            ErrorKind::InvalidInput | ErrorKind::InvalidOperation => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden if conceal_forbidden => {
                return Self::new(StatusCode::NOT_FOUND, ErrorKind::NotFound, "Resource not found");
            }
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::PartialFailure => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let repair = match &err {
            CoreError::PartialFailure { repair, .. } => Some(*repair),
            _ => None,
        };
        let message = match kind {
            // Store and crypto details stay in the logs.
            ErrorKind::InternalError => {
                tracing::error!(error = %err, "Request failed");
                "Internal server error".to_string()
            }
            ErrorKind::PartialFailure => {
                tracing::error!(error = %err, "Follow edge left half-written");
                err.to_string()
            }
            _ => err.to_string(),
        };

        let mut api_error = Self::new(status, kind, message);
        api_error.body.repair = repair;
        api_error
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorKind::InvalidInput, message)
    }

    /// HTTP status of this error.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_client_error() {
            tracing::warn!(code = %self.body.code, error = %self.body.message, "Request error");
        }
        (self.status, Json(self.body)).into_response()
    }
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall status.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Pending follow-edge repairs.
    pub pending_repairs: usize,
    /// Database connectivity status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseHealth>,
}

/// Database health information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseHealth {
    /// Whether a test query succeeded.
    pub connected: bool,
    /// Open connections.
    pub pool_size: u32,
    /// Idle connections.
    pub pool_idle: usize,
    /// Configured pool ceiling.
    pub pool_max: u32,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    /// Always `alive`.
    pub status: String,
}

/// Readiness response with dependency status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Whether the service can take traffic.
    pub ready: bool,
    /// Whether the store is reachable.
    pub database: bool,
    /// Reason when not ready.
    pub details: Option<String>,
}

// ============================================================================
// Extractors
// ============================================================================

/// The caller, resolved from `Authorization: Bearer <token>`.
#[derive(Debug, Clone, Copy)]
pub struct Actor(pub AuthenticatedActor);

#[async_trait]
impl<S: ServiceStore> FromRequestParts<AppState<S>> for Actor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState<S>) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::from_core(CoreError::bad_token(), false))?;

        state
            .kernel
            .credentials
            .verify_token(&BearerToken::from_string(token.to_string()))
            .map(Actor)
            .map_err(|e| ApiError::from_core(e, false))
    }
}

fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    UserId::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid user id: {raw}")))
}

fn parse_post_id(raw: &str) -> Result<PostId, ApiError> {
    PostId::parse_str(raw).map_err(|_| ApiError::bad_request(format!("Invalid post id: {raw}")))
}

impl<S: ServiceStore> ServiceState<S> {
    fn reject(&self, err: CoreError) -> ApiError {
        ApiError::from_core(err, self.conceal_forbidden)
    }
}

// ============================================================================
// User Handlers
// ============================================================================

async fn register_handler<S: ServiceStore>(
    State(state): State<AppState<S>>,
    body: Result<Json<RegistrationPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Session>>), ApiError> {
    let Json(payload) = body?;
    validate_registration(&payload).map_err(|e| state.reject(e))?;

    let session = state.kernel.identity.register(payload).await.map_err(|e| state.reject(e))?;
    Ok((StatusCode::CREATED, Envelope::ok("User registered successfully", session)))
}

async fn login_handler<S: ServiceStore>(
    State(state): State<AppState<S>>,
    body: Result<Json<LoginPayload>, JsonRejection>,
) -> Result<Json<Envelope<Session>>, ApiError> {
    let Json(payload) = body?;
    validate_login(&payload).map_err(|e| state.reject(e))?;

    let session = state
        .kernel
        .identity
        .login(&payload.email, &payload.password)
        .await
        .map_err(|e| state.reject(e))?;
    Ok(Envelope::ok("Login successful", session))
}

async fn list_users_handler<S: ServiceStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
) -> Result<Json<Envelope<Vec<UserView>>>, ApiError> {
    let users = state.kernel.identity.fetch_active_all(&actor).await.map_err(|e| state.reject(e))?;
    Ok(Envelope::list("Users fetched successfully", users))
}

async fn own_profile_handler<S: ServiceStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
) -> Result<Json<Envelope<UserView>>, ApiError> {
    let user = state.kernel.identity.fetch_self(actor.id).await.map_err(|e| state.reject(e))?;
    Ok(Envelope::ok("User fetched successfully", user))
}

async fn edit_user_handler<S: ServiceStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    body: Result<Json<UserPatch>, JsonRejection>,
) -> Result<Json<Envelope<UserView>>, ApiError> {
    let target = parse_user_id(&id)?;
    let Json(patch) = body?;
    validate_user_patch(&patch).map_err(|e| state.reject(e))?;

    let user = state
        .kernel
        .identity
        .edit(target, &actor, patch)
        .await
        .map_err(|e| state.reject(e))?;
    Ok(Envelope::ok("User updated successfully", user))
}

async fn remove_own_handler<S: ServiceStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
) -> Result<Json<Envelope<UserView>>, ApiError> {
    let user = state
        .kernel
        .identity
        .deactivate(actor.id, &actor)
        .await
        .map_err(|e| state.reject(e))?;
    Ok(Envelope::ok("User removed successfully", user))
}

async fn remove_user_handler<S: ServiceStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> Result<Json<Envelope<UserView>>, ApiError> {
    let target = parse_user_id(&id)?;
    let user = state
        .kernel
        .identity
        .deactivate(target, &actor)
        .await
        .map_err(|e| state.reject(e))?;
    Ok(Envelope::ok("User removed successfully", user))
}

async fn follow_handler<S: ServiceStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> Result<Json<Envelope<UserView>>, ApiError> {
    let target = parse_user_id(&id)?;
    let user = state.kernel.graph.follow(actor.id, target).await.map_err(|e| state.reject(e))?;
    Ok(Envelope::ok("User followed successfully", user))
}

async fn unfollow_handler<S: ServiceStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> Result<Json<Envelope<UserView>>, ApiError> {
    let target = parse_user_id(&id)?;
    let user = state.kernel.graph.unfollow(actor.id, target).await.map_err(|e| state.reject(e))?;
    Ok(Envelope::ok("User unfollowed successfully", user))
}

// ============================================================================
// Post Handlers
// ============================================================================

async fn create_post_handler<S: ServiceStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    body: Result<Json<PostDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<Post>>), ApiError> {
    let Json(draft) = body?;
    validate_draft(&draft).map_err(|e| state.reject(e))?;

    let post = state.kernel.content.create(&actor, draft).await.map_err(|e| state.reject(e))?;
    Ok((StatusCode::CREATED, Envelope::ok("Post successfully created", post)))
}

async fn list_posts_handler<S: ServiceStore>(
    State(state): State<AppState<S>>,
) -> Result<Json<Envelope<Vec<Post>>>, ApiError> {
    let posts = state.kernel.content.get_active().await.map_err(|e| state.reject(e))?;
    Ok(Envelope::list("Posts fetched successfully", posts))
}

async fn get_post_handler<S: ServiceStore>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Post>>, ApiError> {
    let id = parse_post_id(&id)?;
    let post = state.kernel.content.get_one(id).await.map_err(|e| state.reject(e))?;
    Ok(Envelope::ok("Post fetched successfully", post))
}

async fn edit_post_handler<S: ServiceStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<String>,
    body: Result<Json<PostPatch>, JsonRejection>,
) -> Result<Json<Envelope<Post>>, ApiError> {
    let id = parse_post_id(&id)?;
    let Json(patch) = body?;
    validate_post_patch(&patch).map_err(|e| state.reject(e))?;

    let post = state.kernel.content.edit(id, &actor, patch).await.map_err(|e| state.reject(e))?;
    Ok(Envelope::ok("Post updated successfully", post))
}

async fn retract_post_handler<S: ServiceStore>(
    State(state): State<AppState<S>>,
    Actor(actor): Actor,
    Path(id): Path<String>,
) -> Result<Json<Envelope<Post>>, ApiError> {
    let id = parse_post_id(&id)?;
    let post = state.kernel.content.retract(id, &actor).await.map_err(|e| state.reject(e))?;
    Ok(Envelope::ok("Post retracted successfully", post))
}

// ============================================================================
// Health Handlers
// ============================================================================

/// Health check endpoint (detailed).
async fn health_handler<S: ServiceStore>(State(state): State<AppState<S>>) -> Json<HealthResponse> {
    let db_healthy = state.store.is_healthy().await;
    let database = state.store.pool_stats().map(|stats| DatabaseHealth {
        connected: db_healthy,
        pool_size: stats.size,
        pool_idle: stats.idle,
        pool_max: stats.max,
    });

    Json(HealthResponse {
        status: if db_healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        pending_repairs: state.kernel.graph.pending_repairs().len(),
        database,
    })
}

/// Liveness probe endpoint.
///
/// Does NOT check dependencies.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Returns 200 if the store answers, 503 otherwise.
async fn readiness_handler<S: ServiceStore>(
    State(state): State<AppState<S>>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    if state.store.is_healthy().await {
        Ok(Json(ReadinessResponse {
            ready: true,
            database: true,
            details: None,
        }))
    } else {
        Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                database: false,
                details: Some("Database connection failed".to_string()),
            }),
        ))
    }
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the authorship service.
pub fn create_router<S: ServiceStore>(state: ServiceState<S>) -> Router {
    let state = Arc::new(state);

    Router::new()
        // Identity
        .route("/users/register", post(register_handler::<S>))
        .route("/users/login", post(login_handler::<S>))
        .route("/users/get-all", get(list_users_handler::<S>))
        .route("/users/get-own", get(own_profile_handler::<S>))
        .route("/users/edit/:id", put(edit_user_handler::<S>))
        .route("/users/remove-own", delete(remove_own_handler::<S>))
        .route("/users/remove/:id", delete(remove_user_handler::<S>))
        // Follow graph
        .route("/users/:id/follow", put(follow_handler::<S>))
        .route("/users/:id/unfollow", put(unfollow_handler::<S>))
        // Content
        .route("/post/create", post(create_post_handler::<S>))
        .route("/post/fetch-all", get(list_posts_handler::<S>))
        .route("/post/fetch-one/:id", get(get_post_handler::<S>))
        .route("/post/edit/:id", put(edit_post_handler::<S>))
        .route("/post/retract/:id", delete(retract_post_handler::<S>))
        // Health checks
        .route("/health", get(health_handler::<S>))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler::<S>))
        .with_state(state)
}
