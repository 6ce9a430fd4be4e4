//! Liveness endpoint shared by both services.

use axum::{Json, Router, routing::get};
use serde::Serialize;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    /// Always `ok` while the process serves requests.
    pub status: &'static str,
    /// Which service answered, `auction` or `search`.
    pub service: &'static str,
    /// Crate version of the running binary.
    pub version: &'static str,
}

/// Router exposing `GET /health` for `service`, usable under any state.
pub fn router<S>(service: &'static str) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route(
        "/health",
        get(move || async move {
            Json(HealthReport {
                status: "ok",
                service,
                version: env!("CARGO_PKG_VERSION"),
            })
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_names_the_service() {
        // Arrange
        let app: Router = router("search");
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        // Act
        let response = app.oneshot(request).await.unwrap();

        // Assert
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["service"], "search");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }
}
