//! Container lifecycle endpoints.
//!
//! Wire types mirror the Docker Engine API subset the workload manager
//! speaks; the handlers marshal them into the dispatch core.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use chainferry_engine::ContainerSpec;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for `POST /containers/create`, Docker-API-shaped.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateBody {
    /// Image reference.
    pub image: String,
    /// Environment variables as `KEY=value` pairs.
    #[serde(default)]
    pub env: Vec<String>,
    /// Command to run.
    #[serde(default)]
    pub cmd: Vec<String>,
    /// Entrypoint override.
    #[serde(default)]
    pub entrypoint: Option<Vec<String>>,
    /// Attach to stdout.
    #[serde(default)]
    pub attach_stdout: bool,
    /// Attach to stderr.
    #[serde(default)]
    pub attach_stderr: bool,
    /// Host-level resource settings.
    #[serde(default)]
    pub host_config: Option<HostConfigBody>,
}

/// Host resource settings within a create request.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct HostConfigBody {
    /// Network mode for the container.
    #[serde(default)]
    pub network_mode: Option<String>,
    /// Memory ceiling in bytes.
    #[serde(default)]
    pub memory: Option<i64>,
}

impl From<CreateBody> for ContainerSpec {
    fn from(body: CreateBody) -> Self {
        let host = body.host_config.unwrap_or_default();
        Self {
            image: body.image,
            env: body.env,
            cmd: body.cmd,
            entrypoint: body.entrypoint.and_then(|e| e.into_iter().next()),
            attach_stdout: body.attach_stdout,
            attach_stderr: body.attach_stderr,
            network_mode: host.network_mode,
            memory_bytes: host.memory,
        }
    }
}

/// Response body for a successful create.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateResponse {
    /// Identifier for subsequent lifecycle calls.
    pub id: String,
    /// Engine warnings, if any.
    pub warnings: Vec<String>,
}

/// Query parameters for create.
#[derive(Debug, Deserialize)]
pub struct CreateQuery {
    /// Workload reference; absent or empty for engine containers.
    #[serde(default)]
    pub name: Option<String>,
}

/// Query parameters for archive upload/fetch.
#[derive(Debug, Deserialize)]
pub struct ArchiveQuery {
    /// In-container path.
    pub path: String,
}

/// Query parameters for stop.
#[derive(Debug, Deserialize)]
pub struct StopQuery {
    /// Seconds to wait before killing.
    #[serde(default)]
    pub t: Option<i64>,
}

/// Query parameters for kill.
#[derive(Debug, Deserialize)]
pub struct KillQuery {
    /// Signal to deliver.
    #[serde(default)]
    pub signal: Option<String>,
}

/// Response body for wait.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct WaitResponse {
    /// Exit status of the container.
    pub status_code: i64,
}

/// `POST /containers/create?name=`
pub async fn create(
    State(state): State<AppState>,
    Query(query): Query<CreateQuery>,
    Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
    let name = query.name.unwrap_or_default();
    let spec = ContainerSpec::from(body);

    let created = state.router.create(&name, &spec).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateResponse {
            id: created.id,
            warnings: created.warnings,
        }),
    ))
}

/// `PUT /containers/{id}/archive?path=`
pub async fn upload(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ArchiveQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let content = if body.is_empty() { None } else { Some(body) };
    state.router.upload(&id, &query.path, content).await?;
    Ok(StatusCode::OK)
}

/// `GET /containers/{id}/archive?path=`
pub async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ArchiveQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let content = state.router.fetch(&id, &query.path).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/x-tar")],
        content,
    ))
}

/// `POST /containers/{id}/start`
pub async fn start(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.router.start(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /containers/{id}/stop?t=`
pub async fn stop(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<StopQuery>,
) -> Result<impl IntoResponse, ApiError> {
    state.router.stop(&id, query.t).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /containers/{id}/kill?signal=`
pub async fn kill(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<KillQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let signal = query.signal.as_deref().unwrap_or("SIGKILL");
    state.router.kill(&id, signal).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /containers/{id}`
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.router.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /containers/{id}/attach`
///
/// Attach stub. The workload manager issues this call but never consumes
/// the stream; answer OK without hijacking the connection.
pub async fn attach(Path(_id): Path<String>) -> impl IntoResponse {
    StatusCode::OK
}

/// `POST /containers/{id}/wait`
pub async fn wait(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.router.wait(&id).await?;
    Ok((StatusCode::OK, Json(WaitResponse { status_code: 0 })))
}
