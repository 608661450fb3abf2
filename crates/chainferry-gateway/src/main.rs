//! Chainferry gateway service binary.
//!
//! Wires the engine and orchestrator backends into the dispatch core,
//! spawns the deployment sweeper, and serves the Docker-compatible HTTP
//! surface until interrupted.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chainferry_control::{ContainerRouter, ImagePipeline, PipelineConfig, RouterConfig};
use chainferry_engine::{DockerEngine, Engine, EngineConfig};
use chainferry_gateway::{create_router, AppState, GatewayConfig};
use chainferry_orchestrator::{
    KubeOrchestrator, Orchestrator, OrchestratorConfig, Sweeper, SweeperConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,chainferry=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting chainferry gateway");

    let gateway_config = GatewayConfig::from_env();
    let engine_config = EngineConfig::from_env();
    let orchestrator_config = OrchestratorConfig::from_env();
    let pipeline_config = PipelineConfig::from_env();
    let sweeper_config = SweeperConfig::from_env();
    sweeper_config.validate()?;

    tracing::info!(
        listen_addr = %gateway_config.listen_addr,
        engine_endpoint = %engine_config.endpoint,
        namespace = %orchestrator_config.namespace,
        sweeper_enabled = sweeper_config.enabled,
        "Configuration loaded"
    );

    let engine: Arc<dyn Engine> = Arc::new(DockerEngine::new(engine_config)?);
    let orchestrator: Arc<dyn Orchestrator> =
        Arc::new(KubeOrchestrator::new(orchestrator_config).await?);

    let router = Arc::new(ContainerRouter::new(
        Arc::clone(&engine),
        Arc::clone(&orchestrator),
        RouterConfig::default(),
    ));
    let images = Arc::new(ImagePipeline::new(Arc::clone(&engine), pipeline_config));

    let (stop_tx, stop_rx) = watch::channel(false);
    let sweeper = Sweeper::new(Arc::clone(&orchestrator), sweeper_config, stop_rx);
    let sweeper_handle = tokio::spawn(sweeper.run());

    let state = AppState::new(router, images);
    let app = create_router(state, &gateway_config);

    tracing::info!(listen_addr = %gateway_config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&gateway_config.listen_addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutdown signal received");
            let _ = stop_tx.send(true);
        })
        .await?;

    sweeper_handle.await?;
    tracing::info!("Gateway stopped");

    Ok(())
}
