//! Integration layer - Collaborator interfaces.
//!
//! The bus consumes two external capabilities:
//! - a [`TokenSource`] naming ephemeral reply mailboxes
//! - a [`FaultReporter`] receiving handler faults

pub mod reporter;
pub mod token;

pub use reporter::{BoxedReporter, FaultReporter, TracingReporter};
pub use token::{BoxedTokenSource, TokenSource, UuidTokenSource};
