//! Sink for handler faults caught during dispatch.

use std::sync::Arc;

use tracing::error;

use crate::foundation::context::Context;
use crate::foundation::error::HandlerFault;

/// Receives every [`HandlerFault`] caught while dispatching.
///
/// Reporting is fire-and-forget: dispatch continues with the next handler
/// once `report` returns.
pub trait FaultReporter: Send + Sync {
    fn report(&self, fault: &HandlerFault, ctx: &Context);
}

/// A shared fault reporter.
pub type BoxedReporter = Arc<dyn FaultReporter>;

impl<F> FaultReporter for F
where
    F: Fn(&HandlerFault, &Context) + Send + Sync,
{
    fn report(&self, fault: &HandlerFault, ctx: &Context) {
        self(fault, ctx)
    }
}

/// Logs faults through `tracing` at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl FaultReporter for TracingReporter {
    fn report(&self, fault: &HandlerFault, ctx: &Context) {
        error!(to = %ctx.to(), from = %ctx.from(), "Handler fault: {fault}");
    }
}
