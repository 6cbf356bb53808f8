//! HTTP API server for the diploma node.
//!
//! Provides REST endpoints for login, credential issuance, retrieval,
//! revocation and public verification.

use axum::{
    body::Bytes,
    extract::{FromRequestParts, Path, Query, State},
    http::{header, request::Parts, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

use diploma_core::{Claims, Credential, CredentialId, CredentialSummary, Role, Verdict};

use crate::error::ApiError;
use crate::session::authenticate;
use crate::state::NodeState;

// --- Request / response types ---

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize, Deserialize)]
pub struct StatusResponse {
    pub version: String,
    pub uptime_secs: u64,
    pub public_key: String,
    pub active_sessions: usize,
}

#[derive(Serialize, Deserialize)]
pub struct PublicKeyResponse {
    pub algorithm: String,
    pub public_key: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: String,
    pub expires_in: u64,
    pub username: String,
    pub role: Role,
}

#[derive(Serialize, Deserialize)]
pub struct IssueRequest {
    pub subject_name: String,
    pub credential_title: String,
}

#[derive(Serialize, Deserialize)]
pub struct IssueResponse {
    pub id: CredentialId,
    pub download_url: String,
    pub credential: Credential,
}

#[derive(Deserialize, Default)]
pub struct ListQuery {
    /// Return unsigned summaries instead of full records.
    #[serde(default)]
    pub summary: bool,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListResponse {
    Full {
        credentials: Vec<Credential>,
        count: usize,
    },
    Summary {
        summaries: Vec<CredentialSummary>,
        count: usize,
    },
}

#[derive(Serialize, Deserialize)]
pub struct RevokeResponse {
    pub id: CredentialId,
    pub revoked: bool,
}

// --- Authentication ---

/// Claims of the caller, resolved from an `Authorization: Bearer` header.
pub struct Caller(pub Claims);

impl FromRequestParts<Arc<NodeState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<NodeState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".into()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("expected a Bearer token".into()))?;
        state
            .sessions
            .resolve(token.trim())
            .map(Caller)
            .ok_or_else(|| ApiError::Unauthorized("invalid or expired session".into()))
    }
}

fn parse_id(raw: &str) -> Result<CredentialId, ApiError> {
    CredentialId::new(raw).map_err(|_| ApiError::NotFound(format!("credential {}", raw)))
}

fn download_url(id: &CredentialId) -> String {
    format!("/api/v1/credentials/{}/download", id)
}

// --- Handlers ---

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
    })
}

async fn handle_status(State(state): State<Arc<NodeState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        public_key: state.engine.public_key().to_hex(),
        active_sessions: state.sessions.len(),
    })
}

async fn handle_public_key(State(state): State<Arc<NodeState>>) -> Json<PublicKeyResponse> {
    Json(PublicKeyResponse {
        algorithm: "ed25519".into(),
        public_key: state.engine.public_key().to_hex(),
    })
}

async fn handle_login(
    State(state): State<Arc<NodeState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let storage = state.storage.clone();
    let username = req.username.clone();
    // argon2 verification blocks for tens of milliseconds.
    let claims = tokio::task::spawn_blocking(move || {
        authenticate(&storage, &username, &req.password)
    })
    .await
    .map_err(|e| ApiError::Internal(e.to_string()))?
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    let Some(claims) = claims else {
        tracing::warn!(username = %req.username, "login failed");
        return Err(ApiError::Unauthorized("invalid username or password".into()));
    };

    let issued = state.sessions.create(claims.clone());
    tracing::info!(username = %claims.username, role = %claims.role, "login succeeded");
    Ok(Json(LoginResponse {
        token: issued.token,
        token_type: "Bearer".into(),
        expires_in: issued.expires_in.as_secs(),
        username: claims.username,
        role: claims.role,
    }))
}

async fn handle_issue(
    State(state): State<Arc<NodeState>>,
    Caller(claims): Caller,
    Json(req): Json<IssueRequest>,
) -> Result<(StatusCode, Json<IssueResponse>), ApiError> {
    let credential = state
        .engine
        .issue(&claims, &req.subject_name, &req.credential_title)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(IssueResponse {
            id: credential.id.clone(),
            download_url: download_url(&credential.id),
            credential,
        }),
    ))
}

async fn handle_list(
    State(state): State<Arc<NodeState>>,
    Caller(claims): Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let list = state.engine.list(&claims)?.collect_all().await?;
    let count = list.len();
    Ok(Json(if query.summary {
        ListResponse::Summary {
            summaries: list.summaries(),
            count,
        }
    } else {
        ListResponse::Full {
            credentials: list.into_vec(),
            count,
        }
    }))
}

async fn handle_get(
    State(state): State<Arc<NodeState>>,
    Caller(claims): Caller,
    Path(id): Path<String>,
) -> Result<Json<Credential>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.engine.get(&claims, &id).await?))
}

async fn handle_download(
    State(state): State<Arc<NodeState>>,
    Caller(claims): Caller,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let credential = state.engine.get(&claims, &id).await?;
    let body = serde_json::to_vec_pretty(&credential).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"diploma-{}.json\"", credential.id),
            ),
        ],
        body,
    ))
}

async fn handle_revoke(
    State(state): State<Arc<NodeState>>,
    Caller(claims): Caller,
    Path(id): Path<String>,
) -> Result<Json<RevokeResponse>, ApiError> {
    let id = parse_id(&id)?;
    state.engine.revoke(&claims, &id).await?;
    Ok(Json(RevokeResponse { id, revoked: true }))
}

/// Unauthenticated. The body is taken raw so that unparseable input still
/// yields a verdict rather than an extractor rejection.
async fn handle_verify(
    State(state): State<Arc<NodeState>>,
    body: Bytes,
) -> Result<Json<Verdict>, ApiError> {
    let record = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    Ok(Json(state.engine.verify(&record).await?))
}

// --- Server ---

pub fn build_router(state: Arc<NodeState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handle_health))
        .route("/api/v1/status", get(handle_status))
        .route("/api/v1/public-key", get(handle_public_key))
        .route("/api/v1/login", post(handle_login))
        .route(
            "/api/v1/credentials",
            post(handle_issue).get(handle_list),
        )
        .route("/api/v1/credentials/{id}", get(handle_get))
        .route("/api/v1/credentials/{id}/download", get(handle_download))
        .route("/api/v1/credentials/{id}/revoke", post(handle_revoke))
        .route("/api/v1/verify", post(handle_verify))
        .with_state(state)
}

pub async fn start_api_server(
    listen_addr: SocketAddr,
    state: Arc<NodeState>,
) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "HTTP API server started");
    axum::serve(listener, app).await?;
    Ok(())
}
