//! One-shot waits.
//!
//! [`Domain::wait_for`] mounts a registration that resolves a [`WaitFor`]
//! future with the first matching message. The registration is removed
//! exactly once, by whichever happens first:
//!
//! - a matching send claims the result slot and removes it from inside the
//!   handler;
//! - the deadline elapses and the future claims the slot;
//! - the future is dropped.
//!
//! The slot is a `Mutex<Option<Sender>>`; only the party that takes the
//! sender may deregister, so a send racing the timer can never resolve the
//! wait twice.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{self, Poll};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::time::{Instant, Sleep, sleep_until};
use tracing::trace;

use crate::foundation::address::Address;
use crate::foundation::context::Context;
use crate::foundation::error::{BusError, BusResult, PatternResult};
use crate::foundation::pattern::Pattern;
use crate::framework::dispatcher::{Domain, WeakDomain};
use crate::framework::handler::into_handler;
use crate::framework::table::RegistrationId;

type Slot = Mutex<Option<oneshot::Sender<Context>>>;

impl Domain {
    /// Waits for the first message matching `pattern`.
    ///
    /// The registration is in place when this returns, so a send issued
    /// right afterwards is observed even before the future is polled.
    /// `None` or a zero duration waits indefinitely.
    ///
    /// The future resolves with:
    /// - `Ok(ctx)` for the first matching message;
    /// - [`BusError::Timeout`] once the deadline elapses;
    /// - [`BusError::Closed`] if the registration is unmounted or the domain
    ///   is dropped first.
    ///
    /// # Errors
    ///
    /// Fails synchronously if `pattern` is malformed.
    pub fn wait_for(
        &self,
        pattern: impl Into<Address>,
        timeout: Option<Duration>,
    ) -> PatternResult<WaitFor> {
        let pattern = Pattern::try_from(pattern.into())?;
        Ok(self.wait_on(pattern, timeout))
    }

    /// [`Domain::wait_for`] with an already compiled pattern.
    pub(crate) fn wait_on(&self, pattern: Pattern, timeout: Option<Duration>) -> WaitFor {
        let (sender, receiver) = oneshot::channel();
        let slot: Arc<Slot> = Arc::new(Mutex::new(Some(sender)));
        let weak_slot = Arc::downgrade(&slot);

        let id = self.mount_with(pattern, move |id| {
            into_handler(move |ctx: Context| {
                let claimed = slot.lock().take();
                if let Some(sender) = claimed {
                    ctx.domain().remove(id);
                    let _ = sender.send(ctx);
                }
            })
        });

        WaitFor {
            receiver,
            deadline: timeout.filter(|t| !t.is_zero()).map(|t| Instant::now() + t),
            sleep: None,
            guard: WaitGuard {
                domain: self.downgrade(),
                id,
                slot: weak_slot,
            },
        }
    }

    /// [`Domain::wait_for`] with the domain's default wait deadline.
    pub fn wait(&self, pattern: impl Into<Address>) -> PatternResult<WaitFor> {
        self.wait_for(pattern, self.wait_timeout())
    }
}

/// Deregisters a pending wait unless a matching send got there first.
struct WaitGuard {
    domain: WeakDomain,
    id: RegistrationId,
    slot: Weak<Slot>,
}

impl WaitGuard {
    /// Claims the result slot. Returns `false` if a send already claimed it
    /// or the registration is gone.
    fn disarm(&self) -> bool {
        let Some(slot) = self.slot.upgrade() else {
            return false;
        };
        let claimed = slot.lock().take().is_some();
        if claimed {
            if let Some(domain) = self.domain.upgrade() {
                domain.remove(self.id);
            }
        }
        claimed
    }
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        if self.disarm() {
            trace!(id = %self.id, "Pending wait cancelled");
        }
    }
}

/// Future returned by [`Domain::wait_for`].
///
/// Dropping it before it resolves removes the registration.
#[must_use = "a wait does nothing unless awaited, and dropping it deregisters"]
pub struct WaitFor {
    receiver: oneshot::Receiver<Context>,
    deadline: Option<Instant>,
    sleep: Option<Pin<Box<Sleep>>>,
    guard: WaitGuard,
}

impl WaitFor {
    /// The id of the underlying registration.
    pub fn id(&self) -> RegistrationId {
        self.guard.id
    }

    /// The instant at which the wait times out, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
}

impl Future for WaitFor {
    type Output = BusResult<Context>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut task::Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;

        if let Poll::Ready(result) = this.receiver.poll_unpin(cx) {
            return Poll::Ready(result.map_err(|_| BusError::Closed));
        }

        let Some(deadline) = this.deadline else {
            return Poll::Pending;
        };
        let sleep = this
            .sleep
            .get_or_insert_with(|| Box::pin(sleep_until(deadline)));
        if sleep.as_mut().poll(cx).is_pending() {
            return Poll::Pending;
        }

        if this.guard.disarm() {
            trace!(id = %this.guard.id, "Wait timed out");
            return Poll::Ready(Err(BusError::Timeout));
        }

        // A matching send claimed the slot first; its context is in flight.
        this.deadline = None;
        this.sleep = None;
        this.receiver
            .poll_unpin(cx)
            .map(|result| result.map_err(|_| BusError::Closed))
    }
}

impl std::fmt::Debug for WaitFor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitFor")
            .field("id", &self.guard.id)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}
