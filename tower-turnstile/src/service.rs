use std::borrow::Cow;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::Context;
use std::task::Poll;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::Counter;
use pin_project_lite::pin_project;
use tower::BoxError;
use tower::Service;

use turnstile::Limiter;

use crate::DEFAULT_REASON;
use crate::error::AdmitError;

#[derive(Clone, Debug)]
struct AdmissionMetrics {
    admitted: Counter<u64>,
    rejected: Counter<u64>,
    label: KeyValue,
}

impl AdmissionMetrics {
    fn new(label: Cow<'static, str>) -> Self {
        let meter = global::meter("turnstile");
        let label = match label {
            Cow::Borrowed(label) => KeyValue::new("limiter", label),
            Cow::Owned(label) => KeyValue::new("limiter", label),
        };
        Self {
            admitted: meter.u64_counter("turnstile.admitted").build(),
            rejected: meter.u64_counter("turnstile.rejected").build(),
            label,
        }
    }
}

/// Consults a [`Limiter`] once per request before handing it to `inner`.
///
/// Denied requests complete immediately with [`AdmitError::RateLimited`] and
/// never reach the inner service.
#[derive(Debug)]
pub struct AdmissionService<L, S>
where
    L: ?Sized,
{
    inner: S,
    limiter: Arc<L>,
    reason: Cow<'static, str>,
    instruments: AdmissionMetrics,
}

impl<L, S> Clone for AdmissionService<L, S>
where
    L: ?Sized,
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            limiter: Arc::clone(&self.limiter),
            reason: self.reason.clone(),
            instruments: self.instruments.clone(),
        }
    }
}

pin_project! {
    /// Response future of [`AdmissionService`].
    pub struct ResponseFuture<F> {
        #[pin]
        state: State<F>,
    }
}

pin_project! {
    #[project = StateProj]
    enum State<F> {
        Admitted {
            #[pin]
            future: F,
        },
        Rejected {
            error: Option<AdmitError>,
        },
    }
}

impl<F, T, E> Future for ResponseFuture<F>
where
    F: Future<Output = Result<T, E>>,
    E: Into<BoxError>,
{
    type Output = Result<T, BoxError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project().state.project() {
            StateProj::Admitted { future } => future.poll(cx).map_err(Into::into),
            StateProj::Rejected { error } => {
                let error = error.take().expect("polled after completion");
                Poll::Ready(Err(Box::new(error)))
            }
        }
    }
}

impl<L, S, Req> Service<Req> for AdmissionService<L, S>
where
    L: Limiter + ?Sized,
    S: Service<Req>,
    S::Error: Into<BoxError>,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = ResponseFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness is the inner service's alone; the limiter is consulted in call
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let attributes = std::slice::from_ref(&self.instruments.label);

        let state = if self.limiter.allow() {
            self.instruments.admitted.add(1, attributes);
            State::Admitted {
                future: self.inner.call(req),
            }
        } else {
            self.instruments.rejected.add(1, attributes);
            tracing::debug!(limiter = %self.instruments.label.value, "request rejected");
            State::Rejected {
                error: Some(AdmitError::RateLimited {
                    reason: self.reason.clone(),
                }),
            }
        };

        ResponseFuture { state }
    }
}

impl<L, S> AdmissionService<L, S>
where
    L: ?Sized,
{
    pub fn new(inner: S, limiter: Arc<L>) -> Self {
        Self {
            inner,
            limiter,
            reason: Cow::Borrowed(DEFAULT_REASON),
            instruments: AdmissionMetrics::new(Cow::Borrowed("limiter")),
        }
    }

    /// Set the reason carried by [`AdmitError::RateLimited`].
    pub fn with_reason(mut self, reason: impl Into<Cow<'static, str>>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Set the `limiter` attribute recorded on the admission counters.
    pub fn with_label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.instruments = AdmissionMetrics::new(label.into());
        self
    }

    /// A reference to the inner service.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}
