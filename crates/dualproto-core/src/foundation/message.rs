//! Messages and reply status.
//!
//! A [`Message`] is what a sender hands to the bus: a destination, a source,
//! an opaque JSON body and a string-keyed option map. It is built fresh per
//! send and never mutated afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::address::Address;

/// String-keyed message options.
pub type Options = serde_json::Map<String, Value>;

/// Option key carrying the status of a correlated reply.
pub const STATUS_KEY: &str = "statusCode";

/// The serialisable part of a dispatched message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Destination address.
    #[serde(default)]
    pub to: Address,
    /// Source address; empty when the sender did not name itself.
    #[serde(default)]
    pub from: Address,
    /// Opaque payload.
    #[serde(default)]
    pub body: Value,
    /// Free-form options.
    #[serde(default)]
    pub options: Options,
}

impl Message {
    /// Creates a message.
    pub fn new(to: Address, from: Address, body: Value, options: Options) -> Self {
        Self {
            to,
            from,
            body,
            options,
        }
    }

    /// Reads [`STATUS_KEY`] from the options.
    pub fn status(&self) -> Status {
        Status::from_options(&self.options)
    }
}

// =============================================================================
// Status
// =============================================================================

/// Outcome of a correlated exchange, encoded as `options.statusCode`.
///
/// A reply that carries no status code is treated as [`Status::Ok`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// 200: a reply arrived.
    Ok,
    /// 408: no reply before the deadline.
    Timeout,
    /// 503: nothing was mounted at the destination.
    Unreachable,
    /// Any other code set by a responder.
    Other(u16),
}

impl Status {
    /// Numeric status code.
    pub fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::Timeout => 408,
            Self::Unreachable => 503,
            Self::Other(code) => code,
        }
    }

    /// Maps a numeric code back to a status.
    pub fn from_code(code: u16) -> Self {
        match code {
            200 => Self::Ok,
            408 => Self::Timeout,
            503 => Self::Unreachable,
            other => Self::Other(other),
        }
    }

    /// Reads the status from an option map.
    pub fn from_options(options: &Options) -> Self {
        options
            .get(STATUS_KEY)
            .and_then(Value::as_u64)
            .and_then(|code| u16::try_from(code).ok())
            .map_or(Self::Ok, Self::from_code)
    }

    /// Returns `true` for 2xx codes.
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.code())
    }

    /// Options containing only this status.
    pub fn to_options(self) -> Options {
        let mut options = Options::new();
        options.insert(STATUS_KEY.to_string(), Value::from(self.code()));
        options
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let message: Message = serde_json::from_value(json!({})).unwrap();
        assert!(message.to.is_empty());
        assert!(message.from.is_empty());
        assert!(message.options.is_empty());
        assert!(message.body.is_null());
    }

    #[test]
    fn test_serializes_only_message_fields() {
        let message = Message::new(
            Address::from(["vice", "president"]),
            Address::from(["senate"]),
            json!({ "maybe": "house" }),
            json!({ "punching": "bag" }).as_object().cloned().unwrap(),
        );
        let value = serde_json::to_value(&message).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 4);
        assert_eq!(value["to"], json!(["vice", "president"]));
        assert_eq!(value["from"], json!(["senate"]));
        assert_eq!(value["body"]["maybe"], "house");
        assert_eq!(value["options"]["punching"], "bag");
    }

    #[test]
    fn test_status_from_options() {
        assert_eq!(Status::from_options(&Options::new()), Status::Ok);
        assert_eq!(Status::from_options(&Status::Timeout.to_options()), Status::Timeout);
        assert_eq!(Status::from_code(503), Status::Unreachable);
        assert_eq!(Status::from_code(404), Status::Other(404));
        assert!(!Status::Unreachable.is_success());
    }
}
