//! Router configuration.
//!
//! Sets up the axum router with the Docker Engine API subset and the
//! trace/body-limit middleware.

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::GatewayConfig;
use crate::handlers::{containers, health, images};
use crate::state::AppState;

/// Create the gateway router with all routes and middleware.
///
/// # Routes
///
/// - `HEAD|GET /_ping` - Engine liveness
/// - `POST /containers/create?name=` - Create container or workload
/// - `PUT|GET /containers/:id/archive?path=` - Upload/fetch content
/// - `POST /containers/:id/attach` - Attach stub
/// - `POST /containers/:id/start|stop|kill|wait` - Lifecycle verbs
/// - `DELETE /containers/:id` - Remove
/// - `POST /images/create?fromImage=` - Pull image
/// - `GET /images/:name/json` - Inspect image
/// - `POST /build?dockerfile=&t=` - Build image
/// - `GET /tar/:name` - Download delivery-mode export
pub fn create_router(state: AppState, config: &GatewayConfig) -> Router {
    Router::new()
        .route("/_ping", get(health::ping).head(health::ping))
        .route("/containers/create", post(containers::create))
        .route(
            "/containers/:id/archive",
            put(containers::upload).get(containers::fetch),
        )
        .route("/containers/:id/attach", post(containers::attach))
        .route("/containers/:id/start", post(containers::start))
        .route("/containers/:id/stop", post(containers::stop))
        .route("/containers/:id/kill", post(containers::kill))
        .route("/containers/:id/wait", post(containers::wait))
        .route("/containers/:id", delete(containers::remove))
        .route("/images/create", post(images::create))
        .route("/images/:name/json", get(images::inspect))
        .route("/build", post(images::build))
        .route("/tar/:name", get(images::download))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes))
        .with_state(state)
}
