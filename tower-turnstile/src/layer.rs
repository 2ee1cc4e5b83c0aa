use std::borrow::Cow;
use std::sync::Arc;

use tower::Layer;
use turnstile::Limiter;

use crate::DEFAULT_REASON;
use crate::service::AdmissionService;

/// Applies admission control to requests.
///
/// Every service produced by one layer shares the same limiter, so a single
/// budget guards all of them.
#[derive(Debug)]
pub struct AdmissionLayer<L>
where
    L: ?Sized,
{
    limiter: Arc<L>,
    reason: Cow<'static, str>,
    label: Option<Cow<'static, str>>,
}

impl<L> Clone for AdmissionLayer<L>
where
    L: ?Sized,
{
    fn clone(&self) -> Self {
        Self {
            limiter: Arc::clone(&self.limiter),
            reason: self.reason.clone(),
            label: self.label.clone(),
        }
    }
}

impl<L> AdmissionLayer<L>
where
    L: Limiter + ?Sized,
{
    /// Create an AdmissionLayer
    pub fn new(limiter: Arc<L>) -> Self {
        AdmissionLayer {
            limiter,
            reason: Cow::Borrowed(DEFAULT_REASON),
            label: None,
        }
    }

    /// Set the human-readable reason returned with rejections.
    pub fn with_reason(mut self, reason: impl Into<Cow<'static, str>>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Set the `limiter` attribute recorded on the admission counters.
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl<L, S> Layer<S> for AdmissionLayer<L>
where
    L: ?Sized,
{
    type Service = AdmissionService<L, S>;

    fn layer(&self, service: S) -> Self::Service {
        let svc = AdmissionService::new(service, self.limiter.clone()).with_reason(self.reason.clone());
        match &self.label {
            Some(label) => svc.with_label(label.clone()),
            None => svc,
        }
    }
}
