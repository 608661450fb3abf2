//! Gateway application state.

use std::sync::Arc;

use chainferry_control::{ContainerRouter, ImagePipeline};

/// Shared application state for the gateway.
///
/// Holds the dispatch-core handles every HTTP handler needs. Constructed
/// once at startup and cloned per request.
#[derive(Clone)]
pub struct AppState {
    /// Lifecycle verb dispatcher.
    pub router: Arc<ContainerRouter>,
    /// Image build/distribution pipeline.
    pub images: Arc<ImagePipeline>,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(router: Arc<ContainerRouter>, images: Arc<ImagePipeline>) -> Self {
        Self { router, images }
    }
}
