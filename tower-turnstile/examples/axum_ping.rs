use axum::{
    Json, Router,
    error_handling::HandleErrorLayer,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;
use tower::BoxError;
use tower::ServiceBuilder;
use tower_turnstile::{AdmissionLayer, AdmitError};
use turnstile::FixedWindow;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt().init();

    // 1. Setup Limiter: 5 requests per second, shared by every route
    let limit = NonZeroUsize::new(5).ok_or("limit must be non-zero")?;
    let limiter = Arc::new(FixedWindow::new(limit, Duration::from_secs(1))?);

    // 2. Build the Router
    let app = Router::new()
        .route("/ping", get(|| async { "pong" }))
        .layer(
            ServiceBuilder::new()
                // The outermost layer: turns BoxError into a Response
                .layer(HandleErrorLayer::new(handle_admit_error))
                .layer(AdmissionLayer::new(limiter).with_label("fixed_window"))
                // Converts the Route's Infallible to BoxError for the gate
                .map_err(BoxError::from),
        );

    // 3. Serve
    let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
    tracing::info!("Listening on http://127.0.0.1:8080");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Rejections become 429 Too Many Requests with a JSON body, anything else a 500
async fn handle_admit_error(err: BoxError) -> Response {
    match AdmitError::from_box(err) {
        AdmitError::RateLimited { reason } => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": reason })),
        )
            .into_response(),
        other => other.into_response(),
    }
}
