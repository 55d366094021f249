//! Dispatch context handed to handlers.
//!
//! A [`Context`] composes two parts, much like a shared event base plus
//! per-consumer data:
//!
//! - the **shared** [`Message`] of one send, wrapped in an `Arc` and never
//!   mutated, so every matching handler sees the same payload without copying;
//! - the **per-handler** [`Params`] bound by that handler's own pattern.
//!
//! Each handler invocation owns its `Context`; parameters bound for one
//! registration are never visible to another.

use std::sync::Arc;

use serde_json::Value;

use super::address::Address;
use super::error::{BusError, BusResult};
use super::message::{Message, Options, Status};
use super::pattern::Params;
use crate::framework::dispatcher::Domain;

/// The context object passed to handlers and returned by waits.
///
/// # Example
///
/// ```rust,ignore
/// domain.mount("message/:name", |ctx: Context| {
///     println!("{} sent a message to {:?}", ctx.from(), ctx.param("name"));
///     ctx.reply("received");
/// })?;
/// ```
#[derive(Clone)]
pub struct Context {
    message: Arc<Message>,
    params: Params,
    domain: Domain,
}

impl Context {
    pub(crate) fn new(message: Arc<Message>, params: Params, domain: Domain) -> Self {
        Self {
            message,
            params,
            domain,
        }
    }

    /// Builds a context for an outcome the bus produced itself, such as a
    /// request timeout. `to` is the reply mailbox and `from` the original
    /// destination.
    pub(crate) fn synthesized(domain: Domain, to: Address, from: Address, status: Status) -> Self {
        let message = Message::new(to, from, Value::Null, status.to_options());
        Self::new(Arc::new(message), Params::default(), domain)
    }

    /// Destination address.
    pub fn to(&self) -> &Address {
        &self.message.to
    }

    /// Source address.
    pub fn from(&self) -> &Address {
        &self.message.from
    }

    /// Message body.
    pub fn body(&self) -> &Value {
        &self.message.body
    }

    /// Message options.
    pub fn options(&self) -> &Options {
        &self.message.options
    }

    /// Parameters bound by the matched pattern.
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Shorthand for a `:name` binding.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.one(name)
    }

    /// Shorthand for a `::name` binding.
    pub fn tail(&self, name: &str) -> Option<&[String]> {
        self.params.tail(name)
    }

    /// The bus this message was dispatched on.
    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Status carried in `options.statusCode`; [`Status::Ok`] when absent.
    pub fn status(&self) -> Status {
        self.message.status()
    }

    /// The serialisable message (`to`, `from`, `body`, `options`).
    pub fn to_message(&self) -> Message {
        Message::clone(&self.message)
    }

    /// The destination with its last `n` segments removed.
    ///
    /// `parent(0)` is the full destination.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::InvalidParent`] if `n` exceeds the destination
    /// length.
    pub fn parent(&self, n: usize) -> BusResult<Address> {
        let to = self.to();
        to.len()
            .checked_sub(n)
            .and_then(|len| to.truncated(len))
            .ok_or_else(|| BusError::InvalidParent {
                depth: n,
                point: to.to_string(),
            })
    }

    /// The immediate parent of the destination, `parent(1)`.
    pub fn parent_default(&self) -> BusResult<Address> {
        self.parent(1)
    }

    /// Sends a message on the owning bus.
    pub fn send(
        &self,
        to: impl Into<Address>,
        from: impl Into<Address>,
        body: impl Into<Value>,
        options: Options,
    ) -> bool {
        self.domain.send(to, from, body, options)
    }

    /// Sends `body` back to this message's source.
    pub fn reply(&self, body: impl Into<Value>) -> bool {
        self.reply_with(body, Options::new())
    }

    /// Sends `body` back to this message's source with the given options.
    pub fn reply_with(&self, body: impl Into<Value>, options: Options) -> bool {
        self.domain
            .send(self.from().clone(), Address::empty(), body, options)
    }

    /// Splits the context into the reply body and options.
    pub fn into_response(self) -> (Value, Options) {
        match Arc::try_unwrap(self.message) {
            Ok(message) => (message.body, message.options),
            Err(shared) => (shared.body.clone(), shared.options.clone()),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("to", self.to())
            .field("from", self.from())
            .field("body", self.body())
            .field("options", self.options())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(to: &[&str]) -> Context {
        let message = Message::new(Address::from(to), Address::empty(), Value::Null, Options::new());
        Context::new(Arc::new(message), Params::default(), Domain::new())
    }

    #[test]
    fn test_parent_defaults() {
        let ctx = context(&["play", "him", "off"]);
        assert_eq!(ctx.parent_default().unwrap(), Address::from(["play", "him"]));
        assert_eq!(ctx.parent(0).unwrap(), Address::from(["play", "him", "off"]));
        assert_eq!(ctx.parent(2).unwrap(), Address::from(["play"]));
        assert_eq!(ctx.parent(3).unwrap(), Address::empty());
    }

    #[test]
    fn test_parent_too_deep() {
        let ctx = context(&["play", "him", "off"]);
        assert!(matches!(
            ctx.parent(4),
            Err(BusError::InvalidParent { depth: 4, .. })
        ));
    }

    #[test]
    fn test_synthesized_carries_status() {
        let ctx = Context::synthesized(
            Domain::new(),
            Address::from(["token", "request"]),
            Address::from(["svc"]),
            Status::Unreachable,
        );
        assert_eq!(ctx.status(), Status::Unreachable);
        assert!(ctx.body().is_null());
        assert_eq!(ctx.from(), &Address::from(["svc"]));
    }
}
