//! Span helpers shared by the bootstrap and the polling loops.

use tracing::{Span, span::Entered};

use crate::init::build_sha;

/// Guard that keeps the application-level span entered for the lifetime of the process.
pub struct GlobalContextGuard {
    _guard: Entered<'static>,
}

impl GlobalContextGuard {
    #[must_use]
    /// Enter the application-level tracing span for the lifetime of the guard.
    pub fn new(component: impl Into<String>) -> Self {
        let component = component.into();
        let span: &'static Span = Box::leak(Box::new(
            tracing::info_span!("app", component = %component, build_sha = %build_sha()),
        ));
        let guard = span.enter();
        Self { _guard: guard }
    }
}

/// Span wrapping one poll of one job.
///
/// `trigger` names the path that scheduled the poll (`checker` or `recovery`).
#[must_use]
pub fn job_span(job_id: &str, trigger: &'static str) -> Span {
    tracing::info_span!("job", job_id = %job_id, trigger)
}
