//! Foundation layer - Addresses, patterns and messages.
//!
//! This module contains the value types every other layer builds on:
//! - [`Address`] for destinations and sources
//! - [`Pattern`] compilation and parameter extraction
//! - [`Message`] and reply [`Status`]
//! - the per-handler [`Context`]
//! - error types shared across the crate

pub mod address;
pub mod context;
pub mod error;
pub mod message;
pub mod pattern;

pub use address::Address;
pub use context::Context;
pub use error::{
    BusError, BusResult, HandlerFault, PatternError, PatternResult, TokenError, TokenResult,
};
pub use message::{Message, Options, STATUS_KEY, Status};
pub use pattern::{Param, Params, Pattern, Segment};
