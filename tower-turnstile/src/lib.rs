//! # Tower Turnstile
//!
//! `tower-turnstile` puts a [`turnstile`] limiter in front of any
//! [Tower](https://github.com/tower-rs/tower) service.
//!
//! ## The Admission Gate
//!
//! [`AdmissionLayer`] consults its [`Limiter`] exactly once per request, in
//! `call`. Admitted requests go straight to the inner service. Denied requests
//! never reach it: they complete immediately with
//! [`AdmitError::RateLimited`], carrying a human-readable reason
//! (`"rate limit exceeded"` unless overridden).
//!
//! The gate never queues or waits, so the latency of a rejection does not depend
//! on the load behind it.
//!
//! ## Feature Flags
//!
//! - `axum`: Enables `IntoResponse` for [`AdmitError`] (429 / 500).
//! - `tonic`: Enables `From<AdmitError> for tonic::Status` (`RESOURCE_EXHAUSTED` / `INTERNAL`).

mod error;
mod layer;
mod service;
mod utils;


#[cfg(doc)]
use turnstile::Limiter;

pub use error::AdmitError;
pub use layer::AdmissionLayer;
pub use service::AdmissionService;
pub use service::ResponseFuture;
pub use utils::ServiceBuilderExt;

/// Reason attached to rejections unless one is configured.
pub const DEFAULT_REASON: &str = "rate limit exceeded";
