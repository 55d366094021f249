//! Structured mount specifications.
//!
//! `mount` accepts a single handler, a sequence of specs mounted at the same
//! point, or a tree whose keys extend the point. Mounting a tree at `P` is
//! the same as mounting each leaf at `P` followed by its key path.
//!
//! ```rust,ignore
//! domain.mount(
//!     "users",
//!     MountSpec::tree()
//!         .at(":id", MountSpec::sequence([audit.into_mount_spec(), lookup.into_mount_spec()]))
//!         .at("admin/**", admin_handler),
//! )?;
//! ```

use crate::foundation::address::Address;
use crate::foundation::context::Context;
use crate::framework::handler::{BoxedHandler, HandleResponse, Handler, into_handler};

/// A handler, a sequence of specs, or a keyed tree of specs.
#[derive(Clone)]
pub enum MountSpec {
    /// One handler at the current point.
    Handler(BoxedHandler),
    /// Several specs at the same point, mounted in order.
    Sequence(Vec<MountSpec>),
    /// Specs keyed by a path extending the current point, mounted in order.
    Tree(Vec<(Address, MountSpec)>),
}

impl MountSpec {
    /// A single handler.
    pub fn handler<H: Handler>(handler: H) -> Self {
        Self::Handler(into_handler(handler))
    }

    /// A sequence of specs at the same point.
    pub fn sequence<I>(specs: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoMountSpec,
    {
        Self::Sequence(specs.into_iter().map(IntoMountSpec::into_mount_spec).collect())
    }

    /// An empty tree; add branches with [`MountSpec::at`].
    pub fn tree() -> Self {
        Self::Tree(Vec::new())
    }

    /// Adds a branch under `key`. On a non-tree spec, the existing spec is
    /// kept at the current point and the branch is added after it.
    pub fn at(self, key: impl Into<Address>, spec: impl IntoMountSpec) -> Self {
        let branch = (key.into(), spec.into_mount_spec());
        match self {
            Self::Tree(mut branches) => {
                branches.push(branch);
                Self::Tree(branches)
            }
            other => Self::Tree(vec![(Address::empty(), other), branch]),
        }
    }

    /// Flattens the spec into `(point, handler)` leaves in mount order.
    pub fn flatten(self, point: &Address) -> Vec<(Address, BoxedHandler)> {
        let mut leaves = Vec::new();
        self.flatten_into(point, &mut leaves);
        leaves
    }

    fn flatten_into(self, point: &Address, leaves: &mut Vec<(Address, BoxedHandler)>) {
        match self {
            Self::Handler(handler) => leaves.push((point.clone(), handler)),
            Self::Sequence(specs) => {
                for spec in specs {
                    spec.flatten_into(point, leaves);
                }
            }
            Self::Tree(branches) => {
                for (key, spec) in branches {
                    spec.flatten_into(&point.join(&key), leaves);
                }
            }
        }
    }
}

impl std::fmt::Debug for MountSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("Handler"),
            Self::Sequence(specs) => f.debug_tuple("Sequence").field(specs).finish(),
            Self::Tree(branches) => f.debug_tuple("Tree").field(branches).finish(),
        }
    }
}

/// Conversion into a [`MountSpec`].
pub trait IntoMountSpec {
    fn into_mount_spec(self) -> MountSpec;
}

impl IntoMountSpec for MountSpec {
    fn into_mount_spec(self) -> MountSpec {
        self
    }
}

impl<F, R> IntoMountSpec for F
where
    F: Fn(Context) -> R + Send + Sync + 'static,
    R: HandleResponse,
{
    fn into_mount_spec(self) -> MountSpec {
        MountSpec::handler(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf() -> MountSpec {
        MountSpec::handler(|_: Context| {})
    }

    fn points(spec: MountSpec, point: &str) -> Vec<String> {
        spec.flatten(&Address::from(point))
            .into_iter()
            .map(|(address, _)| address.to_string())
            .collect()
    }

    #[test]
    fn test_flatten_handler_and_sequence() {
        assert_eq!(points(leaf(), "a"), ["a"]);
        assert_eq!(points(MountSpec::sequence([leaf(), leaf()]), "a/b"), ["a/b", "a/b"]);
    }

    #[test]
    fn test_flatten_tree_extends_point() {
        let spec = MountSpec::tree()
            .at("x", leaf())
            .at("y/:id", MountSpec::sequence([leaf(), MountSpec::tree().at("**", leaf())]));
        assert_eq!(points(spec, "root"), ["root/x", "root/y/:id", "root/y/:id/**"]);
    }

    #[test]
    fn test_at_on_handler_keeps_it_first() {
        let spec = leaf().at("child", leaf());
        assert_eq!(points(spec, "p"), ["p", "p/child"]);
    }
}
