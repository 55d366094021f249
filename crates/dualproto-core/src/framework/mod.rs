//! Framework layer - Registration, dispatch and correlation.
//!
//! This module contains the bus itself:
//! - Handler trait and return-value handling
//! - Mount specifications and the mount table
//! - The [`Domain`] dispatcher with fail-isolated fan-out
//! - One-shot waits and request/reply correlation

pub mod dispatcher;
pub mod handler;
pub mod mount;
pub mod request;
pub mod table;
pub mod wait;

pub use dispatcher::{DEFAULT_REQUEST_TIMEOUT, Domain, DomainBuilder};
pub use handler::{BoxedHandler, HandleResponse, Handler, into_handler};
pub use mount::{IntoMountSpec, MountSpec};
pub use request::{Deadline, GetOptions, REPLY_SEGMENT, Response};
pub use table::RegistrationId;
pub use wait::WaitFor;
