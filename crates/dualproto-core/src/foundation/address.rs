//! Hierarchical addresses.
//!
//! An [`Address`] is an ordered sequence of string segments such as
//! `["user", "bob"]`. Addresses are written with `/` as the separator when
//! displayed or parsed from a string.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// An immutable, cheaply clonable sequence of address segments.
///
/// The empty address is valid as a `from` value; destinations must be
/// non-empty for a send to be routed.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address {
    segments: Arc<[String]>,
}

impl Address {
    /// Creates an address from any iterable of segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// The empty address.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses a `/`-delimited path. Empty components are skipped, so
    /// `"/a//b/"` is `["a", "b"]`.
    pub fn parse(path: &str) -> Self {
        Self::new(path.split('/').filter(|s| !s.is_empty()))
    }

    /// Returns the segments of this address.
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns a new address with `segment` appended.
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.to_vec();
        segments.push(segment.into());
        Self::new(segments)
    }

    /// Returns a new address with all of `other`'s segments appended.
    pub fn join(&self, other: &Address) -> Self {
        Self::new(self.segments.iter().chain(other.segments.iter()).cloned())
    }

    /// Returns the first `len` segments, or `None` if the address is shorter.
    pub fn truncated(&self, len: usize) -> Option<Self> {
        self.segments.get(..len).map(|s| Self::new(s.iter().cloned()))
    }

    /// Returns `true` if `prefix` is a segment-wise prefix of this address.
    pub fn starts_with(&self, prefix: &Address) -> bool {
        self.segments.starts_with(&prefix.segments)
    }
}

impl Deref for Address {
    type Target = [String];

    fn deref(&self) -> &Self::Target {
        &self.segments
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

impl From<&str> for Address {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl From<String> for Address {
    fn from(path: String) -> Self {
        Self::parse(&path)
    }
}

impl From<&Address> for Address {
    fn from(address: &Address) -> Self {
        address.clone()
    }
}

impl From<Vec<String>> for Address {
    fn from(segments: Vec<String>) -> Self {
        Self::new(segments)
    }
}

impl From<&[&str]> for Address {
    fn from(segments: &[&str]) -> Self {
        Self::new(segments.iter().copied())
    }
}

impl<const N: usize> From<[&str; N]> for Address {
    fn from(segments: [&str; N]) -> Self {
        Self::new(segments)
    }
}

impl<const N: usize> From<[String; N]> for Address {
    fn from(segments: [String; N]) -> Self {
        Self::new(segments)
    }
}
