//! HTTP surface for chainferry.
//!
//! A thin axum layer speaking the Docker Engine API subset the workload
//! manager expects, marshalling requests into the dispatch core and errors
//! back into status codes. All state is injected at startup; there is no
//! ambient global service.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
