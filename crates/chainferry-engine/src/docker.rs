//! Docker engine implementation.
//!
//! [`DockerEngine`] binds the [`Engine`] capability trait to the Docker API.
//! Streaming responses (build, pull, push) are drained here and returned as
//! collected newline-delimited JSON progress, so callers always observe the
//! operation's completion rather than its initiation.

use std::path::Path;

use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::container::{
    Config, CreateContainerOptions, DownloadFromContainerOptions, KillContainerOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions, UploadToContainerOptions,
    WaitContainerOptions,
};
use bollard::image::{BuildImageOptions, CreateImageOptions, PushImageOptions, TagImageOptions};
use bollard::models::HostConfig;
use bollard::{Docker, API_DEFAULT_VERSION};
use bytes::Bytes;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::types::{ContainerSpec, CreatedContainer};
use crate::Result;

/// Connection timeout for engine API calls, in seconds.
const ENGINE_TIMEOUT_SECS: u64 = 120;

/// The `Engine` trait is the capability interface over the local container
/// engine.
///
/// The control plane consumes exactly these operations; the raw client is
/// never exposed upward.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Create a container from the given spec.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine rejects the creation.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<CreatedContainer>;

    /// Start a created container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be started.
    async fn start_container(&self, id: &str) -> Result<()>;

    /// Stop a running container, waiting up to `timeout_secs` before killing.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be stopped.
    async fn stop_container(&self, id: &str, timeout_secs: Option<i64>) -> Result<()>;

    /// Send a signal to a running container.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal cannot be delivered.
    async fn kill_container(&self, id: &str, signal: &str) -> Result<()>;

    /// Remove a container.
    ///
    /// # Errors
    ///
    /// Returns an error if removal fails.
    async fn remove_container(&self, id: &str) -> Result<()>;

    /// Block until the container is no longer running.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine reports a wait failure.
    async fn wait_container(&self, id: &str) -> Result<()>;

    /// Copy a tar archive into the container at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    async fn copy_into(&self, id: &str, path: &str, content: Bytes) -> Result<()>;

    /// Copy the file tree at `path` out of the container as a tar archive.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    async fn copy_from(&self, id: &str, path: &str) -> Result<Bytes>;

    /// Build an image from a tar build context, applying `tag`.
    ///
    /// Returns the drained build progress.
    ///
    /// # Errors
    ///
    /// Returns an error if the build submission or the build itself fails.
    async fn build_image(&self, dockerfile: &str, tag: &str, context: Bytes) -> Result<Bytes>;

    /// Pull an image, optionally with the configured registry credentials.
    ///
    /// Returns the drained pull progress.
    ///
    /// # Errors
    ///
    /// Returns an error if the pull fails (including image-not-found).
    async fn pull_image(&self, reference: &str, authenticated: bool) -> Result<Bytes>;

    /// Push an image with the configured registry credentials, draining the
    /// response fully before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the push fails.
    async fn push_image(&self, reference: &str) -> Result<Bytes>;

    /// Apply an additional tag to an image.
    ///
    /// # Errors
    ///
    /// Returns an error if the tag cannot be applied.
    async fn tag_image(&self, reference: &str, new_reference: &str) -> Result<()>;

    /// Inspect an image present on the engine.
    ///
    /// # Errors
    ///
    /// Returns an error if the image is missing or the engine call fails.
    async fn inspect_image(&self, reference: &str) -> Result<serde_json::Value>;

    /// Export an image to a local tar file, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the export stream or the file write fails.
    async fn export_image(&self, reference: &str, dest: &Path) -> Result<()>;

    /// Registry host images are pushed to and pulled from.
    fn registry_address(&self) -> &str;

    /// Registry project qualified image references live under.
    fn registry_project(&self) -> &str;
}

/// Docker-backed engine.
pub struct DockerEngine {
    client: Docker,
    config: EngineConfig,
}

impl DockerEngine {
    /// Connect to the Docker engine described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the client cannot
    /// be constructed.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let client = if config.endpoint.starts_with("unix://") {
            Docker::connect_with_socket(&config.endpoint, ENGINE_TIMEOUT_SECS, API_DEFAULT_VERSION)?
        } else {
            Docker::connect_with_http(&config.endpoint, ENGINE_TIMEOUT_SECS, API_DEFAULT_VERSION)?
        };

        info!(endpoint = %config.endpoint, "connected to container engine");

        Ok(Self { client, config })
    }

    /// Credentials for the configured private registry.
    ///
    /// The email is deliberately blanked; registries in this deployment
    /// authenticate on username/password/server only.
    fn credentials(&self) -> DockerCredentials {
        let registry = &self.config.registry;
        DockerCredentials {
            username: Some(registry.username.clone()),
            password: Some(registry.password.clone()),
            email: Some(String::new()),
            serveraddress: Some(registry.server_address.clone()),
            ..Default::default()
        }
    }
}

/// Split `repo:tag` into its repository and optional tag.
///
/// A colon inside the final path segment is a tag separator; a colon in an
/// earlier segment (registry port) is not.
fn split_reference(reference: &str) -> (&str, Option<&str>) {
    match reference.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo, Some(tag)),
        _ => (reference, None),
    }
}

/// Drain a progress stream into newline-delimited JSON.
async fn drain_progress<T, S>(mut stream: S) -> Result<Bytes>
where
    T: serde::Serialize,
    S: futures::Stream<Item = std::result::Result<T, bollard::errors::Error>> + Unpin,
{
    let mut out = Vec::new();
    while let Some(item) = stream.next().await {
        let info = item?;
        serde_json::to_writer(&mut out, &info)?;
        out.push(b'\n');
    }
    Ok(Bytes::from(out))
}

/// Append one build output line as a `{"stream": ...}` JSON record.
///
/// Build progress items carry aux payloads that do not round-trip through
/// serde, so only the textual stream output is re-encoded.
fn append_build_line(out: &mut Vec<u8>, line: &str) -> Result<()> {
    serde_json::to_writer(&mut *out, &serde_json::json!({ "stream": line }))?;
    out.push(b'\n');
    Ok(())
}

#[async_trait]
impl Engine for DockerEngine {
    async fn create_container(&self, spec: &ContainerSpec) -> Result<CreatedContainer> {
        let host_config = HostConfig {
            network_mode: spec.network_mode.clone(),
            memory: spec.memory_bytes,
            ..Default::default()
        };

        let config = Config {
            image: Some(spec.image.clone()),
            env: Some(spec.env.clone()),
            cmd: Some(spec.cmd.clone()),
            entrypoint: spec.entrypoint.clone().map(|e| vec![e]),
            attach_stdout: Some(spec.attach_stdout),
            attach_stderr: Some(spec.attach_stderr),
            host_config: Some(host_config),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await?;

        debug!(id = %response.id, image = %spec.image, "created engine container");

        Ok(CreatedContainer {
            id: response.id,
            warnings: response.warnings,
        })
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.client
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn stop_container(&self, id: &str, timeout_secs: Option<i64>) -> Result<()> {
        let options = timeout_secs.map(|t| StopContainerOptions { t });
        self.client.stop_container(id, options).await?;
        Ok(())
    }

    async fn kill_container(&self, id: &str, signal: &str) -> Result<()> {
        self.client
            .kill_container(id, Some(KillContainerOptions { signal }))
            .await?;
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.client
            .remove_container(id, None::<RemoveContainerOptions>)
            .await?;
        Ok(())
    }

    async fn wait_container(&self, id: &str) -> Result<()> {
        let stream = self
            .client
            .wait_container(id, None::<WaitContainerOptions<String>>);
        futures::pin_mut!(stream);

        if let Some(result) = stream.next().await {
            result?;
        }
        Ok(())
    }

    async fn copy_into(&self, id: &str, path: &str, content: Bytes) -> Result<()> {
        let options = UploadToContainerOptions {
            path: path.to_string(),
            ..Default::default()
        };
        self.client
            .upload_to_container(id, Some(options), content.into())
            .await?;
        Ok(())
    }

    async fn copy_from(&self, id: &str, path: &str) -> Result<Bytes> {
        let options = DownloadFromContainerOptions {
            path: path.to_string(),
        };
        let stream = self.client.download_from_container(id, Some(options));
        futures::pin_mut!(stream);

        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(Bytes::from(out))
    }

    async fn build_image(&self, dockerfile: &str, tag: &str, context: Bytes) -> Result<Bytes> {
        let options = BuildImageOptions {
            dockerfile: dockerfile.to_string(),
            t: tag.to_string(),
            rm: true,
            ..Default::default()
        };

        let stream = self.client.build_image(options, None, Some(context.into()));
        futures::pin_mut!(stream);

        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            let info = item?;
            if let Some(line) = info.stream {
                append_build_line(&mut out, &line)?;
            }
        }

        info!(tag, "image build drained");
        Ok(Bytes::from(out))
    }

    async fn pull_image(&self, reference: &str, authenticated: bool) -> Result<Bytes> {
        let options = CreateImageOptions {
            from_image: reference.to_string(),
            ..Default::default()
        };
        let credentials = authenticated.then(|| self.credentials());

        let stream = self.client.create_image(Some(options), None, credentials);
        futures::pin_mut!(stream);

        drain_progress(stream).await
    }

    async fn push_image(&self, reference: &str) -> Result<Bytes> {
        let (repo, tag) = split_reference(reference);
        let options = PushImageOptions {
            tag: tag.unwrap_or("latest"),
        };

        let stream = self
            .client
            .push_image(repo, Some(options), Some(self.credentials()));
        futures::pin_mut!(stream);

        let progress = drain_progress(stream).await?;
        info!(reference, "image push drained");
        Ok(progress)
    }

    async fn tag_image(&self, reference: &str, new_reference: &str) -> Result<()> {
        let (repo, tag) = split_reference(new_reference);
        let options = TagImageOptions {
            repo,
            tag: tag.unwrap_or("latest"),
        };
        self.client.tag_image(reference, Some(options)).await?;
        Ok(())
    }

    async fn inspect_image(&self, reference: &str) -> Result<serde_json::Value> {
        let inspect = self.client.inspect_image(reference).await?;
        Ok(serde_json::to_value(inspect)?)
    }

    async fn export_image(&self, reference: &str, dest: &Path) -> Result<()> {
        let stream = self.client.export_image(reference);
        futures::pin_mut!(stream);
        let mut file = tokio::fs::File::create(dest).await?;

        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;

        info!(reference, dest = %dest.display(), "image exported");
        Ok(())
    }

    fn registry_address(&self) -> &str {
        &self.config.registry.server_address
    }

    fn registry_project(&self) -> &str {
        &self.config.registry.project
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_reference_plain() {
        assert_eq!(split_reference("mycc"), ("mycc", None));
        assert_eq!(split_reference("mycc:1.0"), ("mycc", Some("1.0")));
    }

    #[test]
    fn credentials_blank_the_email() {
        let mut config = EngineConfig::default();
        config.registry.project = "chainferry".to_string();
        config.registry.username = "user".to_string();
        config.registry.password = "secret".to_string();
        config.registry.email = "dev@example.com".to_string();
        config.registry.server_address = "registry.example.com".to_string();

        let engine = DockerEngine::new(config).unwrap();
        let credentials = engine.credentials();

        assert_eq!(credentials.email.as_deref(), Some(""));
        assert_eq!(credentials.username.as_deref(), Some("user"));
        assert_eq!(
            credentials.serveraddress.as_deref(),
            Some("registry.example.com")
        );
    }

    #[tokio::test]
    async fn drain_progress_emits_one_json_line_per_item() {
        let items = vec![
            Ok(bollard::models::CreateImageInfo {
                status: Some("Pulling from proj/mycc".to_string()),
                ..Default::default()
            }),
            Ok(bollard::models::CreateImageInfo {
                status: Some("Download complete".to_string()),
                ..Default::default()
            }),
        ];

        let out = drain_progress(futures::stream::iter(items)).await.unwrap();
        let text = std::str::from_utf8(&out).unwrap();

        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("Pulling from proj/mycc"));
        assert!(text.contains("Download complete"));
    }

    #[test]
    fn build_lines_are_reencoded_as_stream_records() {
        let mut out = Vec::new();
        append_build_line(&mut out, "Step 1/4 : FROM busybox").unwrap();
        append_build_line(&mut out, "Successfully built").unwrap();

        let text = std::str::from_utf8(&out).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert_eq!(
            text.lines().next().unwrap(),
            r#"{"stream":"Step 1/4 : FROM busybox"}"#
        );
    }

    #[test]
    fn split_reference_with_registry_port() {
        assert_eq!(
            split_reference("registry.example.com:5000/proj/mycc"),
            ("registry.example.com:5000/proj/mycc", None)
        );
        assert_eq!(
            split_reference("registry.example.com:5000/proj/mycc:1.0"),
            ("registry.example.com:5000/proj/mycc", Some("1.0"))
        );
    }
}
