//! Image endpoints.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters for `POST /images/create`.
#[derive(Debug, Deserialize)]
pub struct ImageCreateQuery {
    /// Image reference to pull.
    #[serde(rename = "fromImage")]
    pub from_image: String,
}

/// Query parameters for `POST /build`.
#[derive(Debug, Deserialize)]
pub struct BuildQuery {
    /// Dockerfile path within the build context.
    #[serde(default)]
    pub dockerfile: Option<String>,
    /// Tag to apply to the built image.
    #[serde(default)]
    pub t: Option<String>,
}

/// `POST /images/create?fromImage=`
pub async fn create(
    State(state): State<AppState>,
    Query(query): Query<ImageCreateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let progress = state.images.create(&query.from_image).await?;
    Ok(progress_response(progress))
}

/// `GET /images/{name}/json`
pub async fn inspect(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let details = state.images.inspect(&name).await?;
    Ok((StatusCode::OK, Json(details)))
}

/// `POST /build?dockerfile=&t=`
pub async fn build(
    State(state): State<AppState>,
    Query(query): Query<BuildQuery>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let dockerfile = query.dockerfile.as_deref().unwrap_or("Dockerfile");
    let tags: Vec<String> = query.t.into_iter().collect();
    let context = if body.is_empty() { None } else { Some(body) };

    let progress = state.images.build(dockerfile, &tags, context).await?;
    Ok(progress_response(progress))
}

/// `GET /tar/{name}`
///
/// Streams a delivery-mode export back to the air-gapped puller.
pub async fn download(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(ApiError::BadRequest(format!("invalid image name: {name}")));
    }

    let path = state.images.delivery_path(&name);
    match tokio::fs::read(&path).await {
        Ok(content) => Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/x-tar")],
            content,
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::NotFound(format!("no export for {name}")))
        }
        Err(e) => Err(ApiError::Internal(e.to_string())),
    }
}

fn progress_response(progress: Bytes) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        progress,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::time::Duration;

    use chainferry_control::{
        ContainerRouter, ImageMode, ImagePipeline, PipelineConfig, RouterConfig,
    };
    use chainferry_engine::{Engine, MockEngine};
    use chainferry_orchestrator::{MockOrchestrator, Orchestrator};

    fn test_state(delivery_dir: PathBuf) -> (Arc<MockEngine>, AppState) {
        let engine = Arc::new(MockEngine::new());
        let orchestrator = Arc::new(MockOrchestrator::new());

        let router = Arc::new(ContainerRouter::new(
            Arc::clone(&engine) as Arc<dyn Engine>,
            orchestrator as Arc<dyn Orchestrator>,
            RouterConfig::default(),
        ));
        let images = Arc::new(ImagePipeline::new(
            Arc::clone(&engine) as Arc<dyn Engine>,
            PipelineConfig {
                mode: ImageMode::Delivery,
                delivery_dir,
                inspect_interval: Duration::ZERO,
                inspect_attempts: 3,
            },
        ));

        (engine, AppState::new(router, images))
    }

    #[tokio::test]
    async fn create_pulls_requested_image() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, state) = test_state(dir.path().to_path_buf());

        create(
            State(state),
            Query(ImageCreateQuery {
                from_image: "busybox:latest".to_string(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(engine.pulled(), vec!["busybox:latest".to_string()]);
    }

    #[tokio::test]
    async fn build_then_download_round_trips_the_export() {
        let dir = tempfile::tempdir().unwrap();
        let (_, state) = test_state(dir.path().to_path_buf());

        build(
            State(state.clone()),
            Query(BuildQuery {
                dockerfile: None,
                t: Some("mycc-1.0".to_string()),
            }),
            Bytes::from_static(b"context"),
        )
        .await
        .unwrap();

        let response = download(State(state), Path("mycc-1.0".to_string()))
            .await
            .unwrap()
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn download_missing_export_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (_, state) = test_state(dir.path().to_path_buf());

        let err = download(State(state), Path("absent".to_string()))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn download_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let (_, state) = test_state(dir.path().to_path_buf());

        let err = download(State(state), Path("../etc/passwd".to_string()))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn build_without_tag_is_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let (_, state) = test_state(dir.path().to_path_buf());

        let err = build(
            State(state),
            Query(BuildQuery {
                dockerfile: None,
                t: None,
            }),
            Bytes::from_static(b"context"),
        )
        .await
        .err()
        .unwrap();
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn inspect_missing_image_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (engine, state) = test_state(dir.path().to_path_buf());
        engine.fail_pulls(true);

        let err = inspect(State(state), Path("mycc".to_string()))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
