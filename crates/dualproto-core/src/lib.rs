//! # dualproto core
//!
//! An in-process, address-routed message bus.
//!
//! Producers send messages to hierarchical destination addresses such as
//! `user/bob`; consumers mount handlers against address patterns. Every send
//! is routed synchronously to all matching handlers, and one-shot waits and
//! request/reply exchanges are built on the same routing.
//!
//! ## Architecture Layers
//!
//! ### Foundation Layer
//!
//! Value types:
//! - **Addresses**: [`Address`], an immutable segment sequence
//! - **Patterns**: [`Pattern`] with literal, `*`, `:name`, `**` and `::name` segments
//! - **Messages**: [`Message`], [`Status`] and the per-handler [`Context`]
//!
//! ### Framework Layer
//!
//! The bus:
//! - **Dispatcher**: [`Domain`], fail-isolated fan-out in registration order
//! - **Mounting**: [`MountSpec`] handlers, sequences and trees
//! - **Waits**: [`WaitFor`], resolved exactly once by a match, a deadline or a drop
//! - **Correlation**: [`Domain::get`] and [`Domain::request`] over ephemeral mailboxes
//!
//! ### Integration Layer
//!
//! Collaborators the bus consumes:
//! - **Tokens**: [`TokenSource`], defaulting to [`UuidTokenSource`]
//! - **Faults**: [`FaultReporter`], defaulting to [`TracingReporter`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use dualproto_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> BusResult<()> {
//!     let domain = Domain::new();
//!
//!     domain.mount("greet/:name", |ctx: Context| {
//!         let name = ctx.param("name").unwrap_or("stranger");
//!         ctx.reply(format!("hello, {name}"));
//!     })?;
//!
//!     let (body, _) = domain
//!         .request("greet/world", (), GetOptions::new())
//!         .await?
//!         .into_result()?;
//!     assert_eq!(body, "hello, world");
//!     Ok(())
//! }
//! ```

// Architectural layers
pub mod foundation;
pub mod framework;
pub mod integration;

// Re-export foundation types
pub use foundation::{
    Address, BusError, BusResult, Context, HandlerFault, Message, Options, Param, Params,
    Pattern, PatternError, PatternResult, STATUS_KEY, Segment, Status, TokenError, TokenResult,
};

// Re-export framework types
pub use framework::{
    BoxedHandler, DEFAULT_REQUEST_TIMEOUT, Deadline, Domain, DomainBuilder, GetOptions,
    HandleResponse, Handler, IntoMountSpec, MountSpec, REPLY_SEGMENT, RegistrationId, Response,
    WaitFor, into_handler,
};

// Re-export integration types
pub use integration::{
    BoxedReporter, BoxedTokenSource, FaultReporter, TokenSource, TracingReporter,
    UuidTokenSource,
};

/// Prelude for common imports.
pub mod prelude {
    pub use super::foundation::{
        Address, BusError, BusResult, Context, Message, Options, PatternError, Status,
    };
    pub use super::framework::{Domain, GetOptions, IntoMountSpec, MountSpec, Response};
}
