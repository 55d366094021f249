//! Registry of mounted handlers.
//!
//! The [`MountTable`] keeps `(pattern, handler)` registrations in insertion
//! order and answers lookups with a full scan. The table itself is not
//! synchronised; [`Domain`](super::dispatcher::Domain) guards it with a lock
//! and takes a snapshot of the matches before invoking any handler.

use std::fmt;

use crate::foundation::address::Address;
use crate::foundation::pattern::{Params, Pattern};
use crate::framework::handler::BoxedHandler;

/// Identifies a single registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationId(pub(crate) u64);

impl RegistrationId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Registration {
    id: RegistrationId,
    pattern: Pattern,
    handler: BoxedHandler,
}

/// A handler matched against a concrete address.
pub(crate) struct Match {
    pub(crate) id: RegistrationId,
    pub(crate) handler: BoxedHandler,
    pub(crate) params: Params,
}

/// Ordered collection of registrations.
#[derive(Default)]
pub(crate) struct MountTable {
    entries: Vec<Registration>,
}

impl MountTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends a registration. Ids must be allocated in increasing order.
    pub(crate) fn insert(&mut self, id: RegistrationId, pattern: Pattern, handler: BoxedHandler) {
        self.entries.push(Registration {
            id,
            pattern,
            handler,
        });
    }

    /// Removes one registration by id, handing back its handler so the
    /// caller can drop it after releasing the lock.
    pub(crate) fn remove(&mut self, id: RegistrationId) -> Option<BoxedHandler> {
        let index = self
            .entries
            .binary_search_by_key(&id, |entry| entry.id)
            .ok()?;
        Some(self.entries.remove(index).handler)
    }

    /// Removes every registration whose pattern lies under `prefix`,
    /// returning the removed handlers.
    pub(crate) fn remove_prefix(&mut self, prefix: &Address) -> Vec<BoxedHandler> {
        if prefix.is_empty() {
            return Vec::new();
        }
        let (removed, kept): (Vec<Registration>, Vec<Registration>) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|entry| entry.pattern.is_under(prefix));
        self.entries = kept;
        removed.into_iter().map(|entry| entry.handler).collect()
    }

    /// Every registration matching `address`, in insertion order.
    pub(crate) fn match_all(&self, address: &Address) -> Vec<Match> {
        self.entries
            .iter()
            .filter_map(|entry| {
                entry.pattern.matches(address).map(|params| Match {
                    id: entry.id,
                    handler: BoxedHandler::clone(&entry.handler),
                    params,
                })
            })
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Number of registrations whose pattern lies under `prefix`.
    pub(crate) fn count_under(&self, prefix: &Address) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.pattern.is_under(prefix))
            .count()
    }

    /// Mounted patterns in insertion order.
    pub(crate) fn patterns(&self) -> impl Iterator<Item = (RegistrationId, &Pattern)> {
        self.entries.iter().map(|entry| (entry.id, &entry.pattern))
    }
}

impl fmt::Debug for MountTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| entry.pattern.to_string()))
            .finish()
    }
}
