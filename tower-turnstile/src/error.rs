use std::borrow::Cow;

use tower::BoxError;

/// Errors produced by the admission gate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdmitError {
    /// The limiter denied the request; the inner service was never called.
    ///
    /// When the `axum` feature is enabled, this converts to `429 Too Many Requests`.
    /// When the `tonic` feature is enabled, this converts to `RESOURCE_EXHAUSTED`.
    #[error("{reason}")]
    RateLimited {
        /// Human-readable explanation returned to the client.
        reason: Cow<'static, str>,
    },

    /// An unexpected error occurred in the inner service.
    ///
    /// The string contains the `Display` representation of the inner error.
    #[error("Internal service error: {0}")]
    Inner(String),
}

impl AdmitError {
    /// Classify an error surfaced by a service stack containing the gate.
    ///
    /// Admission errors are returned as they are; anything else becomes
    /// [`AdmitError::Inner`].
    pub fn from_box(err: BoxError) -> Self {
        match err.downcast::<AdmitError>() {
            Ok(admit) => *admit,
            Err(other) => AdmitError::Inner(other.to_string()),
        }
    }

    /// Whether this error is a limiter rejection.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AdmitError::RateLimited { .. })
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for AdmitError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match self {
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Inner(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, self.to_string()).into_response()
    }
}

#[cfg(feature = "tonic")]
impl From<AdmitError> for tonic::Status {
    fn from(err: AdmitError) -> Self {
        match err {
            AdmitError::RateLimited { reason } => tonic::Status::resource_exhausted(reason),
            AdmitError::Inner(msg) => tonic::Status::internal(msg),
        }
    }
}
