//! Image build, distribution and inspection pipeline.
//!
//! All builds are serialized behind one async lock: the engine cannot
//! safely interleave build contexts under this system's usage pattern, so
//! correctness wins over throughput. The lock is held across the build
//! submission and the post-build inspect poll.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{info, warn};

use chainferry_engine::Engine;

use crate::{ControlError, Result};

/// Where built images go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageMode {
    /// Tag and push to the configured private registry.
    Registry,
    /// Air-gapped: export to a local `<tag>.tar` for out-of-band delivery.
    Delivery,
}

/// Configuration for the image pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Distribution mode for built images.
    pub mode: ImageMode,
    /// Directory delivery-mode tar files are written to.
    pub delivery_dir: PathBuf,
    /// Pause between post-build inspect attempts.
    pub inspect_interval: Duration,
    /// Maximum inspect attempts before the build is declared lost.
    pub inspect_attempts: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: ImageMode::Registry,
            delivery_dir: PathBuf::from("/var/lib/chainferry/images"),
            inspect_interval: Duration::from_secs(1),
            inspect_attempts: 300,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    ///
    /// Supported variables: `IMAGE_MODE` (`registry` or `delivery`),
    /// `IMAGE_DELIVERY_DIR`.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("IMAGE_MODE") {
            if val == "delivery" {
                config.mode = ImageMode::Delivery;
            }
        }
        if let Ok(val) = std::env::var("IMAGE_DELIVERY_DIR") {
            config.delivery_dir = PathBuf::from(val);
        }

        config
    }
}

/// Builds, pulls, tags, pushes and exports images through the engine.
pub struct ImagePipeline {
    engine: Arc<dyn Engine>,
    config: PipelineConfig,
    build_lock: Mutex<()>,
}

impl ImagePipeline {
    /// Create a pipeline over the given engine.
    #[must_use]
    pub fn new(engine: Arc<dyn Engine>, config: PipelineConfig) -> Self {
        Self {
            engine,
            config,
            build_lock: Mutex::new(()),
        }
    }

    /// Path a delivery-mode export lands at for a given tag.
    #[must_use]
    pub fn delivery_path(&self, tag: &str) -> PathBuf {
        self.config.delivery_dir.join(format!("{tag}.tar"))
    }

    /// Build an image from a tar build context and distribute it.
    ///
    /// Holds the global build lock for the build plus the inspect poll
    /// that confirms the image landed; distribution runs outside the
    /// lock. Registry mode tags the image with its fully-qualified remote
    /// reference and pushes it, draining the push before returning;
    /// delivery mode exports it to `<tag>.tar` instead, truncating any
    /// previous export.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::EmptyContent`] for a missing context,
    /// [`ControlError::MissingImageTag`] when no tag is supplied,
    /// [`ControlError::ImageNotFound`] if the built image never shows up,
    /// and backend errors otherwise.
    pub async fn build(
        &self,
        dockerfile: &str,
        tags: &[String],
        context: Option<Bytes>,
    ) -> Result<Bytes> {
        let context = context.ok_or(ControlError::EmptyContent)?;
        let tag = tags.first().ok_or(ControlError::MissingImageTag)?;

        let guard = self.build_lock.lock().await;

        let progress = self.engine.build_image(dockerfile, tag, context).await?;
        self.await_image(tag).await?;

        // The image exists on the engine now; the next build can start
        // while this one distributes.
        drop(guard);

        match self.config.mode {
            ImageMode::Registry => {
                let remote = self.qualify(tag);
                self.engine.tag_image(tag, &remote).await?;
                self.engine.push_image(&remote).await?;
                info!(tag, remote = %remote, "built and pushed image");
            }
            ImageMode::Delivery => {
                let dest = self.delivery_path(tag);
                self.engine.export_image(tag, &dest).await?;
                info!(tag, dest = %dest.display(), "built and exported image");
            }
        }

        Ok(progress)
    }

    /// Pull an image, returning the engine's drained pull progress.
    ///
    /// # Errors
    ///
    /// Returns an error if the pull fails.
    pub async fn create(&self, from_image: &str) -> Result<Bytes> {
        Ok(self.engine.pull_image(from_image, false).await?)
    }

    /// Inspect an image, provisioning it locally first.
    ///
    /// References not already qualified with the registry host are
    /// qualified against the configured registry and project. The image is
    /// pulled before inspection because workload images may not yet be
    /// present on this engine.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::ImageNotFound`] if the pull fails, and
    /// backend errors otherwise.
    pub async fn inspect(&self, reference: &str) -> Result<serde_json::Value> {
        let qualified = if reference.starts_with(self.engine.registry_address()) {
            reference.to_string()
        } else {
            self.qualify(reference)
        };

        if let Err(e) = self.engine.pull_image(&qualified, true).await {
            warn!(image = %qualified, error = %e, "pre-inspect pull failed");
            return Err(ControlError::ImageNotFound(qualified));
        }

        Ok(self.engine.inspect_image(&qualified).await?)
    }

    /// Apply an additional tag to an image.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the tag.
    pub async fn add_tag(&self, reference: &str, new_reference: &str) -> Result<()> {
        Ok(self.engine.tag_image(reference, new_reference).await?)
    }

    /// Push an image with the configured registry credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the push fails.
    pub async fn push(&self, reference: &str) -> Result<Bytes> {
        Ok(self.engine.push_image(reference).await?)
    }

    fn qualify(&self, short: &str) -> String {
        format!(
            "{}/{}/{}",
            self.engine.registry_address(),
            self.engine.registry_project(),
            short
        )
    }

    /// Poll inspect until the freshly built image is visible.
    async fn await_image(&self, tag: &str) -> Result<()> {
        for attempt in 1..=self.config.inspect_attempts {
            if self.engine.inspect_image(tag).await.is_ok() {
                return Ok(());
            }

            if attempt < self.config.inspect_attempts {
                tokio::time::sleep(self.config.inspect_interval).await;
            }
        }

        warn!(
            tag,
            attempts = self.config.inspect_attempts,
            "built image never became inspectable"
        );

        Err(ControlError::ImageNotFound(tag.to_string()))
    }
}
