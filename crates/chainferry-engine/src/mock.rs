//! An in-memory engine for testing without a Docker daemon.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::types::{ContainerSpec, CreatedContainer};
use crate::{Engine, EngineError, Result};

#[derive(Default)]
struct MockState {
    containers: HashMap<String, MockContainer>,
    images: HashMap<String, serde_json::Value>,
    pulls: Vec<String>,
    pushes: Vec<String>,
    tags: Vec<(String, String)>,
    exports: Vec<String>,
    fail_pulls: bool,
    push_delay: Duration,
    next_id: u64,
}

#[derive(Default)]
struct MockContainer {
    spec: ContainerSpec,
    started: bool,
    files: HashMap<String, Bytes>,
}

/// A mock engine that records every call in memory.
///
/// Image pulls can be made to fail wholesale with [`MockEngine::fail_pulls`],
/// and the peak number of concurrently executing builds is observable for
/// serialization tests.
pub struct MockEngine {
    state: Mutex<MockState>,
    active_builds: AtomicUsize,
    peak_builds: AtomicUsize,
    server_address: String,
    project: String,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self {
            state: Mutex::new(MockState::default()),
            active_builds: AtomicUsize::new(0),
            peak_builds: AtomicUsize::new(0),
            server_address: "registry.example.com".to_string(),
            project: "chainferry".to_string(),
        }
    }
}

impl MockEngine {
    /// Create a new mock engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Make every subsequent pull fail with a not-found engine error.
    pub fn fail_pulls(&self, fail: bool) {
        self.lock().fail_pulls = fail;
    }

    /// Make every subsequent push take this long, for overlap tests.
    pub fn set_push_delay(&self, delay: Duration) {
        self.lock().push_delay = delay;
    }

    /// Register an image as present on the engine.
    pub fn add_image(&self, reference: &str) {
        self.lock()
            .images
            .insert(reference.to_string(), serde_json::json!({ "Id": reference }));
    }

    /// References pulled so far, in order.
    #[must_use]
    pub fn pulled(&self) -> Vec<String> {
        self.lock().pulls.clone()
    }

    /// References pushed so far, in order.
    #[must_use]
    pub fn pushed(&self) -> Vec<String> {
        self.lock().pushes.clone()
    }

    /// Tags applied so far as `(source, target)` pairs.
    #[must_use]
    pub fn tags(&self) -> Vec<(String, String)> {
        self.lock().tags.clone()
    }

    /// References exported to disk so far.
    #[must_use]
    pub fn exported(&self) -> Vec<String> {
        self.lock().exports.clone()
    }

    /// Number of live containers.
    #[must_use]
    pub fn container_count(&self) -> usize {
        self.lock().containers.len()
    }

    /// Whether the container was started.
    #[must_use]
    pub fn is_started(&self, id: &str) -> bool {
        self.lock().containers.get(id).is_some_and(|c| c.started)
    }

    /// The image a container was created from, if the container exists.
    #[must_use]
    pub fn container_image(&self, id: &str) -> Option<String> {
        self.lock()
            .containers
            .get(id)
            .map(|c| c.spec.image.clone())
    }

    /// File content copied into a container, if any.
    #[must_use]
    pub fn file_in(&self, id: &str, path: &str) -> Option<Bytes> {
        self.lock()
            .containers
            .get(id)
            .and_then(|c| c.files.get(path).cloned())
    }

    /// Peak number of builds observed executing concurrently.
    #[must_use]
    pub fn peak_concurrent_builds(&self) -> usize {
        self.peak_builds.load(Ordering::SeqCst)
    }

    fn not_found() -> EngineError {
        EngineError::Api(bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "no such image".to_string(),
        })
    }
}

#[async_trait]
impl Engine for MockEngine {
    async fn create_container(&self, spec: &ContainerSpec) -> Result<CreatedContainer> {
        let mut state = self.lock();
        state.next_id += 1;
        let id = format!("{:064x}", state.next_id);
        state.containers.insert(
            id.clone(),
            MockContainer {
                spec: spec.clone(),
                ..Default::default()
            },
        );
        Ok(CreatedContainer {
            id,
            warnings: Vec::new(),
        })
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        match state.containers.get_mut(id) {
            Some(container) => {
                container.started = true;
                Ok(())
            }
            None => Err(Self::not_found()),
        }
    }

    async fn stop_container(&self, id: &str, _timeout_secs: Option<i64>) -> Result<()> {
        let mut state = self.lock();
        match state.containers.get_mut(id) {
            Some(container) => {
                container.started = false;
                Ok(())
            }
            None => Err(Self::not_found()),
        }
    }

    async fn kill_container(&self, id: &str, _signal: &str) -> Result<()> {
        self.stop_container(id, None).await
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.lock().containers.remove(id);
        Ok(())
    }

    async fn wait_container(&self, id: &str) -> Result<()> {
        if self.lock().containers.contains_key(id) {
            Ok(())
        } else {
            Err(Self::not_found())
        }
    }

    async fn copy_into(&self, id: &str, path: &str, content: Bytes) -> Result<()> {
        let mut state = self.lock();
        match state.containers.get_mut(id) {
            Some(container) => {
                container.files.insert(path.to_string(), content);
                Ok(())
            }
            None => Err(Self::not_found()),
        }
    }

    async fn copy_from(&self, id: &str, path: &str) -> Result<Bytes> {
        self.lock()
            .containers
            .get(id)
            .and_then(|c| c.files.get(path).cloned())
            .ok_or_else(Self::not_found)
    }

    async fn build_image(&self, _dockerfile: &str, tag: &str, _context: Bytes) -> Result<Bytes> {
        let active = self.active_builds.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_builds.fetch_max(active, Ordering::SeqCst);

        // Long enough for overlapping callers to be observable.
        tokio::time::sleep(Duration::from_millis(20)).await;

        self.add_image(tag);
        self.active_builds.fetch_sub(1, Ordering::SeqCst);
        Ok(Bytes::from_static(b"{\"stream\":\"built\"}\n"))
    }

    async fn pull_image(&self, reference: &str, _authenticated: bool) -> Result<Bytes> {
        let mut state = self.lock();
        if state.fail_pulls {
            return Err(Self::not_found());
        }
        state.pulls.push(reference.to_string());
        state
            .images
            .insert(reference.to_string(), serde_json::json!({ "Id": reference }));
        Ok(Bytes::from_static(b"{\"status\":\"pulled\"}\n"))
    }

    async fn push_image(&self, reference: &str) -> Result<Bytes> {
        let delay = self.lock().push_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.lock().pushes.push(reference.to_string());
        Ok(Bytes::from_static(b"{\"status\":\"pushed\"}\n"))
    }

    async fn tag_image(&self, reference: &str, new_reference: &str) -> Result<()> {
        let mut state = self.lock();
        let value = state
            .images
            .get(reference)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({ "Id": reference }));
        state.images.insert(new_reference.to_string(), value);
        state
            .tags
            .push((reference.to_string(), new_reference.to_string()));
        Ok(())
    }

    async fn inspect_image(&self, reference: &str) -> Result<serde_json::Value> {
        self.lock()
            .images
            .get(reference)
            .cloned()
            .ok_or_else(Self::not_found)
    }

    async fn export_image(&self, reference: &str, dest: &Path) -> Result<()> {
        if !self.lock().images.contains_key(reference) {
            return Err(Self::not_found());
        }
        tokio::fs::write(dest, b"mock image archive").await?;
        self.lock().exports.push(reference.to_string());
        Ok(())
    }

    fn registry_address(&self) -> &str {
        &self.server_address
    }

    fn registry_project(&self) -> &str {
        &self.project
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn container_lifecycle_round_trip() {
        let engine = MockEngine::new();
        let created = engine
            .create_container(&ContainerSpec {
                image: "busybox".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(created.id.len(), 64);
        assert_eq!(engine.container_count(), 1);
        assert_eq!(engine.container_image(&created.id).as_deref(), Some("busybox"));

        engine.start_container(&created.id).await.unwrap();
        assert!(engine.is_started(&created.id));

        engine.remove_container(&created.id).await.unwrap();
        assert_eq!(engine.container_count(), 0);
    }

    #[tokio::test]
    async fn failing_pull_reports_not_found() {
        let engine = MockEngine::new();
        engine.fail_pulls(true);

        let err = engine.pull_image("missing", true).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn build_registers_image_for_inspect() {
        let engine = MockEngine::new();
        engine
            .build_image("Dockerfile", "mycc-1.0", Bytes::new())
            .await
            .unwrap();
        assert!(engine.inspect_image("mycc-1.0").await.is_ok());
    }
}
