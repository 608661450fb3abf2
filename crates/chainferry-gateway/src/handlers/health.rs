//! Engine liveness endpoint.

use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Liveness handler for `HEAD|GET /_ping`.
///
/// Docker API compatibility: the workload manager pings this before
/// issuing any lifecycle call.
pub async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ping_returns_ok() {
        let response = ping().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
