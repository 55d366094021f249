//! Handler system.
//!
//! Handlers are plain synchronous closures taking a [`Context`]. Anything
//! returning a type that implements [`HandleResponse`] qualifies:
//!
//! ```rust,ignore
//! // No return value
//! domain.mount("ping", |ctx: Context| {
//!     ctx.reply("pong");
//! })?;
//!
//! // Return Result<(), E> - errors are reported as handler faults
//! domain.mount("store/:key", |ctx: Context| -> Result<(), StoreError> {
//!     store.put(ctx.param("key").unwrap_or_default(), ctx.body())?;
//!     Ok(())
//! })?;
//! ```

use std::fmt;
use std::sync::Arc;

use crate::foundation::context::Context;
use crate::foundation::error::HandlerFault;

// ============================================================================
// HandleResponse - Handle handler return values
// ============================================================================

/// A trait for types a handler may return.
pub trait HandleResponse {
    /// Converts the return value into a dispatch outcome.
    fn into_outcome(self) -> Result<(), HandlerFault>;
}

impl HandleResponse for () {
    fn into_outcome(self) -> Result<(), HandlerFault> {
        Ok(())
    }
}

/// `Ok` handles the inner value; `Err` becomes [`HandlerFault::Failed`].
impl<T: HandleResponse, E: fmt::Display> HandleResponse for Result<T, E> {
    fn into_outcome(self) -> Result<(), HandlerFault> {
        match self {
            Ok(inner) => inner.into_outcome(),
            Err(e) => Err(HandlerFault::Failed(e.to_string())),
        }
    }
}

impl<T: HandleResponse> HandleResponse for Option<T> {
    fn into_outcome(self) -> Result<(), HandlerFault> {
        self.map_or(Ok(()), HandleResponse::into_outcome)
    }
}

// ============================================================================
// Handler Trait
// ============================================================================

/// A message handler.
///
/// Implemented for every `Fn(Context) -> R` where `R: HandleResponse`.
pub trait Handler: Send + Sync + 'static {
    /// Invokes the handler.
    fn call(&self, ctx: Context) -> Result<(), HandlerFault>;
}

impl<F, R> Handler for F
where
    F: Fn(Context) -> R + Send + Sync + 'static,
    R: HandleResponse,
{
    fn call(&self, ctx: Context) -> Result<(), HandlerFault> {
        self(ctx).into_outcome()
    }
}

/// A type-erased handler stored in the mount table.
pub type BoxedHandler = Arc<dyn Handler>;

/// Boxes a handler for storage.
pub fn into_handler<H: Handler>(handler: H) -> BoxedHandler {
    Arc::new(handler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_outcomes() {
        assert_eq!(().into_outcome(), Ok(()));
        assert_eq!(Ok::<(), String>(()).into_outcome(), Ok(()));
        assert_eq!(
            Err::<(), _>("boom").into_outcome(),
            Err(HandlerFault::Failed("boom".into()))
        );
        assert_eq!(
            Ok::<_, String>(Some(Err::<(), _>("inner"))).into_outcome(),
            Err(HandlerFault::Failed("inner".into()))
        );
        assert_eq!(None::<()>.into_outcome(), Ok(()));
    }
}
