//! Mount patterns and parameter extraction.
//!
//! A [`Pattern`] is compiled once at mount time from raw segments:
//!
//! | Raw       | Segment                      | Consumes          | Binds            |
//! |-----------|------------------------------|-------------------|------------------|
//! | `name`    | [`Segment::Literal`]         | exactly one       | nothing          |
//! | `*`       | [`Segment::Wildcard`]        | exactly one       | nothing          |
//! | `:name`   | [`Segment::Param`]           | exactly one       | `name` → segment |
//! | `**`      | [`Segment::TailWildcard`]    | the rest (0..)    | nothing          |
//! | `::name`  | [`Segment::TailParam`]       | the rest (0..)    | `name` → slice   |
//!
//! Tail segments may only appear last.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::address::Address;
use super::error::{PatternError, PatternResult};

const PARAM_MARKER: char = ':';
const WILDCARD: &str = "*";
const TAIL_WILDCARD: &str = "**";

/// One compiled pattern segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Matches one segment by exact string equality.
    Literal(String),
    /// Matches any single segment.
    Wildcard,
    /// Matches any single segment and binds it.
    Param(String),
    /// Matches all remaining segments, including none.
    TailWildcard,
    /// Matches all remaining segments and binds them.
    TailParam(String),
}

impl Segment {
    fn parse(raw: &str, index: usize) -> PatternResult<Self> {
        if raw == TAIL_WILDCARD {
            return Ok(Self::TailWildcard);
        }
        if raw == WILDCARD {
            return Ok(Self::Wildcard);
        }
        let Some(rest) = raw.strip_prefix(PARAM_MARKER) else {
            return Ok(Self::Literal(raw.to_string()));
        };
        let (tail, name) = match rest.strip_prefix(PARAM_MARKER) {
            Some(name) => (true, name),
            None => (false, rest),
        };
        if name.is_empty() {
            return Err(PatternError::EmptyParamName(index));
        }
        Ok(if tail {
            Self::TailParam(name.to_string())
        } else {
            Self::Param(name.to_string())
        })
    }

    /// Returns `true` for `**` and `::name`.
    pub fn is_tail(&self) -> bool {
        matches!(self, Self::TailWildcard | Self::TailParam(_))
    }

    /// The emitter-level key of this segment: literals stay as written,
    /// single-segment captures become `*` and tail captures become `**`.
    pub fn key(&self) -> &str {
        match self {
            Self::Literal(name) => name,
            Self::Wildcard | Self::Param(_) => WILDCARD,
            Self::TailWildcard | Self::TailParam(_) => TAIL_WILDCARD,
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(name) => f.write_str(name),
            Self::Wildcard => f.write_str(WILDCARD),
            Self::Param(name) => write!(f, "{PARAM_MARKER}{name}"),
            Self::TailWildcard => f.write_str(TAIL_WILDCARD),
            Self::TailParam(name) => write!(f, "{PARAM_MARKER}{PARAM_MARKER}{name}"),
        }
    }
}

/// A compiled, well-formed mount pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pattern {
    segments: Vec<Segment>,
}

impl Pattern {
    /// Compiles raw segments into a pattern.
    ///
    /// # Errors
    ///
    /// Fails on an empty pattern, a tail marker before the last position,
    /// a duplicate parameter name, or an unnamed parameter.
    pub fn compile<I, S>(raw: I) -> PatternResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut segments = Vec::new();
        for (index, raw) in raw.into_iter().enumerate() {
            segments.push(Segment::parse(raw.as_ref(), index)?);
        }
        Self::from_segments(segments)
    }

    /// Validates already-built segments.
    pub fn from_segments(segments: Vec<Segment>) -> PatternResult<Self> {
        if segments.is_empty() {
            return Err(PatternError::Empty);
        }

        let last = segments.len() - 1;
        let mut names: Vec<&str> = Vec::new();
        for (index, segment) in segments.iter().enumerate() {
            if segment.is_tail() && index != last {
                return Err(PatternError::TailNotLast {
                    segment: segment.to_string(),
                    index,
                });
            }
            if let Segment::Param(name) | Segment::TailParam(name) = segment {
                if names.contains(&name.as_str()) {
                    return Err(PatternError::DuplicateParam(name.clone()));
                }
                names.push(name);
            }
        }

        Ok(Self { segments })
    }

    /// A pattern matching exactly `address`, with no segment read as syntax.
    pub fn literal(address: &Address) -> PatternResult<Self> {
        Self::from_segments(
            address
                .segments()
                .iter()
                .cloned()
                .map(Segment::Literal)
                .collect(),
        )
    }

    /// Returns the compiled segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns `true` if the pattern ends in `**` or `::name`.
    pub fn has_tail(&self) -> bool {
        self.segments.last().is_some_and(Segment::is_tail)
    }

    /// Number of segments before any tail marker.
    pub fn fixed_len(&self) -> usize {
        self.segments.len() - usize::from(self.has_tail())
    }

    /// Matches `address` against this pattern, returning the bound
    /// parameters on success.
    pub fn matches(&self, address: &Address) -> Option<Params> {
        let fixed = self.fixed_len();
        if address.len() < fixed || (!self.has_tail() && address.len() != fixed) {
            return None;
        }

        let mut params = Params::default();
        for (index, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Literal(name) => {
                    if address[index] != *name {
                        return None;
                    }
                }
                Segment::Wildcard | Segment::TailWildcard => {}
                Segment::Param(name) => {
                    params.insert(name.clone(), Param::One(address[index].clone()));
                }
                Segment::TailParam(name) => {
                    params.insert(name.clone(), Param::Tail(address[index..].to_vec()));
                }
            }
        }
        Some(params)
    }

    /// Returns `true` if this pattern's segment keys begin with the keys of
    /// the raw segments in `prefix` (see [`Segment::key`]). Used by `unmount`,
    /// so `a/:id` is under both `a/*` and `a/:other`.
    pub fn is_under(&self, prefix: &Address) -> bool {
        self.segments.len() >= prefix.len()
            && self
                .segments
                .iter()
                .zip(prefix.iter())
                .all(|(own, raw)| own.key() == raw_key(raw))
    }
}

/// The [`Segment::key`] of an uncompiled segment.
fn raw_key(raw: &str) -> &str {
    if raw == TAIL_WILDCARD || raw.starts_with("::") {
        TAIL_WILDCARD
    } else if raw == WILDCARD || raw.starts_with(PARAM_MARKER) {
        WILDCARD
    } else {
        raw
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl TryFrom<&Address> for Pattern {
    type Error = PatternError;

    fn try_from(address: &Address) -> PatternResult<Self> {
        Self::compile(address.iter())
    }
}

impl TryFrom<Address> for Pattern {
    type Error = PatternError;

    fn try_from(address: Address) -> PatternResult<Self> {
        Self::compile(address.iter())
    }
}

// =============================================================================
// Parameters
// =============================================================================

/// A bound parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Param {
    /// Bound by `:name`.
    One(String),
    /// Bound by `::name`.
    Tail(Vec<String>),
}

impl Param {
    /// Returns the single segment, if this was bound by `:name`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::One(value) => Some(value),
            Self::Tail(_) => None,
        }
    }

    /// Returns the tail slice, if this was bound by `::name`.
    pub fn as_slice(&self) -> Option<&[String]> {
        match self {
            Self::One(_) => None,
            Self::Tail(values) => Some(values),
        }
    }
}

/// Parameters bound while matching a pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(HashMap<String, Param>);

impl Params {
    fn insert(&mut self, name: String, value: Param) {
        self.0.insert(name, value);
    }

    /// Returns the raw binding for `name`.
    pub fn get(&self, name: &str) -> Option<&Param> {
        self.0.get(name)
    }

    /// Returns a `:name` binding.
    pub fn one(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Param::as_str)
    }

    /// Returns a `::name` binding.
    pub fn tail(&self, name: &str) -> Option<&[String]> {
        self.get(name).and_then(Param::as_slice)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(raw: &[&str]) -> Pattern {
        Pattern::compile(raw).unwrap()
    }

    #[test]
    fn test_compile_rejects_malformed() {
        assert_eq!(Pattern::compile(Vec::<&str>::new()), Err(PatternError::Empty));
        assert!(matches!(
            Pattern::compile(["a", "**", "b"]),
            Err(PatternError::TailNotLast { index: 1, .. })
        ));
        assert!(matches!(
            Pattern::compile(["::rest", "b"]),
            Err(PatternError::TailNotLast { index: 0, .. })
        ));
        assert_eq!(
            Pattern::compile([":id", "x", ":id"]),
            Err(PatternError::DuplicateParam("id".into()))
        );
        assert_eq!(
            Pattern::compile(["a", ":id", "::id"]),
            Err(PatternError::DuplicateParam("id".into()))
        );
        assert_eq!(Pattern::compile(["a", ":"]), Err(PatternError::EmptyParamName(1)));
        assert_eq!(Pattern::compile(["::"]), Err(PatternError::EmptyParamName(0)));
    }

    #[test]
    fn test_literal_matches_only_equal_addresses() {
        let pattern = compile(&["user", "bob"]);
        assert!(pattern.matches(&Address::from(["user", "bob"])).is_some());
        assert!(pattern.matches(&Address::from(["user"])).is_none());
        assert!(pattern.matches(&Address::from(["user", "alice"])).is_none());
        assert!(pattern.matches(&Address::from(["user", "bob", "x"])).is_none());
    }

    #[test]
    fn test_literal_pattern_ignores_syntax() {
        let pattern = Pattern::literal(&Address::from([":tok", "**"])).unwrap();
        assert_eq!(
            pattern.segments(),
            [Segment::Literal(":tok".into()), Segment::Literal("**".into())]
        );
        assert!(pattern.matches(&Address::from([":tok", "**"])).unwrap().is_empty());
        assert!(pattern.matches(&Address::from(["other", "**"])).is_none());
        assert!(pattern.matches(&Address::from([":tok"])).is_none());
        assert_eq!(Pattern::literal(&Address::empty()), Err(PatternError::Empty));
    }

    #[test]
    fn test_single_wildcard_consumes_exactly_one() {
        let pattern = compile(&["user", "*"]);
        assert!(pattern.matches(&Address::from(["user", "bob"])).is_some());
        assert!(pattern.matches(&Address::from(["user"])).is_none());
        assert!(pattern.matches(&Address::from(["user", "bob", "x"])).is_none());
    }

    #[test]
    fn test_tail_wildcard_matches_prefix_and_extensions() {
        let pattern = compile(&["a", "**"]);
        assert!(pattern.matches(&Address::from(["a"])).is_some());
        assert!(pattern.matches(&Address::from(["a", "b", "c"])).is_some());
        assert!(pattern.matches(&Address::from(["x"])).is_none());

        let deep = compile(&["did", "toowild2", "**"]);
        assert!(deep.matches(&Address::from(["did"])).is_none());
        assert!(deep.matches(&Address::from(["did", "toowild2"])).is_some());
    }

    #[test]
    fn test_params_bind_segments() {
        let pattern = compile(&["cupcake", ":flavor"]);
        let params = pattern.matches(&Address::from(["cupcake", "chocolate"])).unwrap();
        assert_eq!(params.one("flavor"), Some("chocolate"));
        assert_eq!(params.tail("flavor"), None);
    }

    #[test]
    fn test_tail_param_binds_slice() {
        let pattern = compile(&["resolve", "::tail"]);
        let params = pattern.matches(&Address::from(["resolve", "a", "b", "c"])).unwrap();
        assert_eq!(params.tail("tail"), Some(&["a".to_string(), "b".into(), "c".into()][..]));

        let empty = pattern.matches(&Address::from(["resolve"])).unwrap();
        assert_eq!(empty.tail("tail"), Some(&[][..]));
    }

    #[test]
    fn test_is_under_compares_keys() {
        let prefix = Address::from(["a", ":x"]);
        assert!(compile(&["a", "*", "c"]).is_under(&prefix));
        assert!(compile(&["a", ":y"]).is_under(&prefix));
        assert!(!compile(&["a", "b"]).is_under(&prefix));
        assert!(!compile(&["a"]).is_under(&prefix));
        assert!(compile(&["a", "**"]).is_under(&Address::from(["a"])));
        assert!(compile(&["a", "::rest"]).is_under(&Address::from(["a", "**"])));
    }

    #[test]
    fn test_display_round_trips_raw_form() {
        assert_eq!(compile(&["a", ":b", "::c"]).to_string(), "a/:b/::c");
    }
}
