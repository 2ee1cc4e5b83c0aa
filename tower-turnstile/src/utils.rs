use std::sync::Arc;

use tower::ServiceBuilder;
use tower::layer::util::Stack;

use turnstile::Limiter;

use crate::AdmissionLayer;

/// Service Builder Extension adding admission control to tower::ServiceBuilder.
pub trait ServiceBuilderExt<L> {
    /// Reject requests the limiter does not admit, before they reach the service.
    fn admission_control(
        self,
        limiter: Arc<dyn Limiter>,
    ) -> ServiceBuilder<Stack<AdmissionLayer<dyn Limiter>, L>>;
}

impl<L> ServiceBuilderExt<L> for ServiceBuilder<L> {
    fn admission_control(
        self,
        limiter: Arc<dyn Limiter>,
    ) -> ServiceBuilder<Stack<AdmissionLayer<dyn Limiter>, L>> {
        self.layer(AdmissionLayer::new(limiter))
    }
}
