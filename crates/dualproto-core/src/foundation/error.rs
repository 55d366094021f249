//! Unified error types for the dualproto core.
//!
//! Structural mistakes (bad mount patterns) fail fast through
//! [`PatternError`]. Temporal outcomes of a wait are reported through
//! [`BusError`]; for `get`/`request` they are encoded as a status on the
//! resolved context instead. Handler failures are captured as
//! [`HandlerFault`] and reported, never returned.

use thiserror::Error;

// =============================================================================
// Pattern Errors
// =============================================================================

/// Errors raised while compiling a mount pattern.
///
/// Raised synchronously from `mount`/`wait_for`; existing registrations are
/// never affected by a failed call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    /// The pattern has no segments.
    #[error("unable to mount empty point")]
    Empty,

    /// A tail marker (`**` or `::name`) appeared before the final segment.
    #[error("tail segment '{segment}' at position {index} must be the last segment")]
    TailNotLast {
        /// The offending segment as written.
        segment: String,
        /// Its zero-based position.
        index: usize,
    },

    /// The same parameter name is bound twice.
    #[error("duplicate parameter name '{0}'")]
    DuplicateParam(String),

    /// A parameter marker with no name (`:` or `::`).
    #[error("parameter at position {0} has an empty name")]
    EmptyParamName(usize),
}

// =============================================================================
// Bus Errors
// =============================================================================

/// Errors surfaced by bus operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    /// A mount or wait pattern was malformed.
    #[error(transparent)]
    InvalidPattern(#[from] PatternError),

    /// A wait deadline elapsed before any matching send.
    #[error("timed out waiting for a matching message")]
    Timeout,

    /// No handler matched the destination of a request.
    #[error("no handler mounted at '{0}'")]
    Unreachable(String),

    /// The identifier collaborator could not produce a token.
    #[error("identifier unavailable: {0}")]
    IdentifierUnavailable(String),

    /// `parent(n)` was asked for more levels than the destination has.
    #[error("invalid parent slice {depth} for point '{point}'")]
    InvalidParent {
        /// The requested depth.
        depth: usize,
        /// The destination that was sliced.
        point: String,
    },

    /// The bus was dropped while a wait was pending.
    #[error("bus closed before the wait resolved")]
    Closed,
}

impl BusError {
    /// Returns `true` for [`BusError::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

// =============================================================================
// Handler Faults
// =============================================================================

/// A failure raised by a handler during dispatch.
///
/// Caught per handler and passed to the bus's fault reporter; never
/// propagated to the sender.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerFault {
    /// The handler returned an error.
    #[error("handler failed: {0}")]
    Failed(String),

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

// =============================================================================
// Token Errors
// =============================================================================

/// Errors raised by a token source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The source cannot produce any more tokens.
    #[error("token source exhausted")]
    Exhausted,

    /// Any other failure reported by the source.
    #[error("{0}")]
    Other(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for pattern compilation.
pub type PatternResult<T> = Result<T, PatternError>;

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Result type for token allocation.
pub type TokenResult<T> = Result<T, TokenError>;
