//! The address-routed dispatcher.
//!
//! A [`Domain`] owns a mount table and routes every send to all matching
//! handlers:
//!
//! 1. Matches are looked up in registration order under a read lock
//! 2. The lock is released, then each handler runs with its own [`Context`]
//! 3. Failures (errors or panics) are reported and dispatch continues, even
//!    when the reporter itself panics
//!
//! Since handlers run outside the lock they are free to send, mount or
//! unmount on the same domain.
//!
//! ```rust,ignore
//! use dualproto_core::prelude::*;
//!
//! let domain = Domain::new();
//! domain.mount("cupcake/:flavor", |ctx: Context| {
//!     println!("one {} cupcake", ctx.param("flavor").unwrap_or("plain"));
//! })?;
//!
//! assert!(domain.send_to("cupcake/chocolate", ()));
//! ```

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::{Level, debug, span, trace, warn};

use crate::foundation::address::Address;
use crate::foundation::context::Context;
use crate::foundation::error::{BusError, BusResult, HandlerFault, PatternResult};
use crate::foundation::message::{Message, Options};
use crate::foundation::pattern::Pattern;
use crate::framework::handler::BoxedHandler;
use crate::framework::mount::IntoMountSpec;
use crate::framework::table::{MountTable, RegistrationId};
use crate::integration::reporter::{BoxedReporter, FaultReporter, TracingReporter};
use crate::integration::token::{BoxedTokenSource, TokenSource, UuidTokenSource};

/// Default deadline for `get`/`request`.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

struct DomainInner {
    table: RwLock<MountTable>,
    next_id: AtomicU64,
    tokens: BoxedTokenSource,
    reporter: BoxedReporter,
    request_timeout: Option<Duration>,
    wait_timeout: Option<Duration>,
}

/// An in-process, address-routed message bus.
///
/// `Domain` is a cheap handle; clones share the same mount table.
///
/// # Thread Safety
///
/// `Domain` is `Send + Sync`. Insert, removal and lookup are serialised by
/// one lock, and every send sees a consistent snapshot of the table.
#[derive(Clone)]
pub struct Domain {
    inner: Arc<DomainInner>,
}

impl Default for Domain {
    fn default() -> Self {
        Self::new()
    }
}

impl Domain {
    /// Creates a domain with the default collaborators.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Returns a builder for configuring collaborators and deadlines.
    pub fn builder() -> DomainBuilder {
        DomainBuilder::default()
    }

    pub(crate) fn downgrade(&self) -> WeakDomain {
        WeakDomain(Arc::downgrade(&self.inner))
    }

    fn next_id(&self) -> RegistrationId {
        RegistrationId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // ------------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------------

    /// Mounts a handler, a sequence or a tree at `point`.
    ///
    /// Every leaf pattern is compiled before anything is inserted, so a
    /// malformed leaf leaves the table untouched.
    ///
    /// # Errors
    ///
    /// Returns a [`PatternError`](crate::PatternError) for an empty pattern,
    /// a tail marker before the last segment, or a duplicate parameter name.
    pub fn mount(
        &self,
        point: impl Into<Address>,
        spec: impl IntoMountSpec,
    ) -> PatternResult<Vec<RegistrationId>> {
        let point = point.into();
        let compiled = spec
            .into_mount_spec()
            .flatten(&point)
            .into_iter()
            .map(|(address, handler)| Ok((Pattern::try_from(address)?, handler)))
            .collect::<PatternResult<Vec<_>>>()?;

        let mut table = self.inner.table.write();
        let ids = compiled
            .into_iter()
            .map(|(pattern, handler)| {
                let id = self.next_id();
                debug!(%id, %pattern, "Mounted handler");
                table.insert(id, pattern, handler);
                id
            })
            .collect();
        Ok(ids)
    }

    /// Mounts a single pre-compiled registration, allocating its id first.
    pub(crate) fn mount_with(
        &self,
        pattern: Pattern,
        build: impl FnOnce(RegistrationId) -> BoxedHandler,
    ) -> RegistrationId {
        let id = self.next_id();
        let handler = build(id);
        trace!(%id, %pattern, "Mounted one-shot handler");
        self.inner.table.write().insert(id, pattern, handler);
        id
    }

    /// Removes every registration whose pattern lies under `prefix`,
    /// including tail-wildcard variants such as `prefix/**`.
    ///
    /// Returns the number of registrations removed. An empty prefix removes
    /// nothing.
    pub fn unmount(&self, prefix: impl Into<Address>) -> usize {
        let prefix = prefix.into();
        let removed = self.inner.table.write().remove_prefix(&prefix);
        debug!(%prefix, removed = removed.len(), "Unmounted");
        removed.len()
    }

    /// Removes every registration. Pending waits resolve with
    /// [`BusError::Closed`].
    pub fn clear(&self) -> usize {
        let table = std::mem::take(&mut *self.inner.table.write());
        debug!(removed = table.len(), "Cleared mount table");
        table.len()
    }

    /// Removes a single registration. Returns `false` if it was already gone.
    pub fn remove(&self, id: RegistrationId) -> bool {
        let removed = self.inner.table.write().remove(id);
        removed.is_some()
    }

    /// Total number of live registrations.
    pub fn listener_count(&self) -> usize {
        self.inner.table.read().len()
    }

    /// Number of live registrations under `prefix`.
    pub fn listeners_under(&self, prefix: impl Into<Address>) -> usize {
        self.inner.table.read().count_under(&prefix.into())
    }

    /// The mounted patterns in registration order.
    pub fn patterns(&self) -> Vec<(RegistrationId, Pattern)> {
        self.inner
            .table
            .read()
            .patterns()
            .map(|(id, pattern)| (id, pattern.clone()))
            .collect()
    }

    /// Default deadline applied by `get`/`request`.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.inner.request_timeout
    }

    /// Default deadline applied by [`Domain::wait`].
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.inner.wait_timeout
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Sends a message to every handler matching `to`.
    ///
    /// Returns `true` iff at least one handler matched, even if every matched
    /// handler failed. An empty destination is a no-op returning `false`.
    pub fn send(
        &self,
        to: impl Into<Address>,
        from: impl Into<Address>,
        body: impl Into<Value>,
        options: Options,
    ) -> bool {
        self.send_message(Message::new(to.into(), from.into(), body.into(), options))
    }

    /// Sends `body` to `to` with an empty source and no options.
    pub fn send_to(&self, to: impl Into<Address>, body: impl Into<Value>) -> bool {
        self.send(to, Address::empty(), body, Options::new())
    }

    /// Dispatches an already-built message.
    pub fn send_message(&self, message: Message) -> bool {
        if message.to.is_empty() {
            trace!("Ignoring send to empty address");
            return false;
        }
        self.dispatch(Arc::new(message))
    }

    fn dispatch(&self, message: Arc<Message>) -> bool {
        let span = span!(Level::DEBUG, "dispatch", to = %message.to, from = %message.from);
        let _enter = span.enter();

        let matches = self.inner.table.read().match_all(&message.to);
        if matches.is_empty() {
            trace!("No handler matched");
            return false;
        }

        debug!(handler_count = matches.len(), "Dispatching");
        for matched in matches {
            let ctx = Context::new(Arc::clone(&message), matched.params, self.clone());
            self.invoke(matched.id, &matched.handler, ctx);
        }
        true
    }

    fn invoke(&self, id: RegistrationId, handler: &BoxedHandler, ctx: Context) {
        let report_ctx = ctx.clone();
        let fault = match panic::catch_unwind(AssertUnwindSafe(|| handler.call(ctx))) {
            Ok(Ok(())) => return,
            Ok(Err(fault)) => fault,
            Err(payload) => HandlerFault::Panicked(panic_message(payload.as_ref())),
        };
        trace!(%id, "Handler fault");
        let reporter = &self.inner.reporter;
        let reported = panic::catch_unwind(AssertUnwindSafe(|| {
            reporter.report(&fault, &report_ctx);
        }));
        if reported.is_err() {
            warn!(%id, %fault, "Fault reporter panicked");
        }
    }

    // ------------------------------------------------------------------------
    // Tokens
    // ------------------------------------------------------------------------

    /// Allocates a unique token from the configured source.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::IdentifierUnavailable`] if the source fails.
    pub async fn uid(&self) -> BusResult<String> {
        self.inner
            .tokens
            .allocate()
            .await
            .map_err(|e| BusError::IdentifierUnavailable(e.to_string()))
    }
}

impl std::fmt::Debug for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Domain")
            .field("listener_count", &self.listener_count())
            .field("request_timeout", &self.inner.request_timeout)
            .field("wait_timeout", &self.inner.wait_timeout)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A non-owning handle to a [`Domain`].
#[derive(Clone)]
pub(crate) struct WeakDomain(Weak<DomainInner>);

impl WeakDomain {
    pub(crate) fn upgrade(&self) -> Option<Domain> {
        self.0.upgrade().map(|inner| Domain { inner })
    }
}

// ============================================================================
// DomainBuilder
// ============================================================================

/// Builder for [`Domain`].
///
/// ```rust,ignore
/// let domain = Domain::builder()
///     .token_source(UuidTokenSource::with_prefix("node1-"))
///     .request_timeout(Some(Duration::from_secs(5)))
///     .build();
/// ```
pub struct DomainBuilder {
    tokens: BoxedTokenSource,
    reporter: BoxedReporter,
    request_timeout: Option<Duration>,
    wait_timeout: Option<Duration>,
}

impl Default for DomainBuilder {
    fn default() -> Self {
        Self {
            tokens: Arc::new(UuidTokenSource::new()),
            reporter: Arc::new(TracingReporter),
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            wait_timeout: None,
        }
    }
}

impl DomainBuilder {
    /// Sets the source of reply-mailbox tokens.
    pub fn token_source(mut self, tokens: impl TokenSource + 'static) -> Self {
        self.tokens = Arc::new(tokens);
        self
    }

    /// Sets an already shared token source.
    pub fn shared_token_source(mut self, tokens: BoxedTokenSource) -> Self {
        self.tokens = tokens;
        self
    }

    /// Sets the sink for handler faults.
    pub fn reporter(mut self, reporter: impl FaultReporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Sets an already shared fault sink.
    pub fn shared_reporter(mut self, reporter: BoxedReporter) -> Self {
        self.reporter = reporter;
        self
    }

    /// Default deadline for `get`/`request`; `None` waits indefinitely.
    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    /// Default deadline for [`Domain::wait`]; `None` waits indefinitely.
    pub fn wait_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.wait_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn build(self) -> Domain {
        Domain {
            inner: Arc::new(DomainInner {
                table: RwLock::new(MountTable::new()),
                next_id: AtomicU64::new(0),
                tokens: self.tokens,
                reporter: self.reporter,
                request_timeout: self.request_timeout,
                wait_timeout: self.wait_timeout,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mount::MountSpec;
    use crate::foundation::error::PatternError;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(Context) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        (count, move |_: Context| {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_send_without_handlers() {
        let domain = Domain::new();
        assert!(!domain.send_to("nobody/home", ()));
        assert!(!domain.send_to(Address::empty(), ()));
    }

    #[test]
    fn test_send_binds_params_per_handler() {
        let domain = Domain::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s1 = Arc::clone(&seen);
        let s2 = Arc::clone(&seen);
        domain
            .mount("cupcake/:flavor", move |ctx: Context| {
                s1.lock().push(ctx.param("flavor").map(str::to_owned));
            })
            .unwrap();
        domain
            .mount("cupcake/*", move |ctx: Context| {
                s2.lock().push(ctx.param("flavor").map(str::to_owned));
            })
            .unwrap();

        assert!(domain.send_to("cupcake/chocolate", json!({ "frosting": true })));
        assert_eq!(*seen.lock(), [Some("chocolate".to_string()), None]);
    }

    #[test]
    fn test_handlers_fire_in_mount_order() {
        let domain = Domain::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let spec = MountSpec::sequence((0..3).map(|i| {
            let order = Arc::clone(&order);
            MountSpec::handler(move |_: Context| order.lock().push(i))
        }));
        assert_eq!(domain.mount("seq", spec).unwrap().len(), 3);

        domain.send_to("seq", ());
        assert_eq!(*order.lock(), [0, 1, 2]);
    }

    #[test]
    fn test_fault_isolation() {
        let faults = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&faults);
        let domain = Domain::builder()
            .reporter(move |fault: &HandlerFault, ctx: &Context| {
                sink.lock().push((fault.clone(), ctx.to().to_string()));
            })
            .build();
        let (count, handler) = counter();

        domain
            .mount("ping", |_: Context| -> Result<(), String> { panic!("boom") })
            .unwrap();
        domain
            .mount("ping", |_: Context| Err::<(), _>("refused"))
            .unwrap();
        domain.mount("ping", handler).unwrap();

        assert!(domain.send_to("ping", ()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(
            *faults.lock(),
            [
                (HandlerFault::Panicked("boom".into()), "ping".to_string()),
                (HandlerFault::Failed("refused".into()), "ping".to_string()),
            ]
        );
    }

    #[test]
    fn test_panicking_reporter_does_not_stop_fan_out() {
        struct Exploding;

        impl FaultReporter for Exploding {
            fn report(&self, _: &HandlerFault, _: &Context) {
                panic!("reporter down");
            }
        }

        let domain = Domain::builder().reporter(Exploding).build();
        let (count, handler) = counter();
        domain
            .mount("ping", |_: Context| Err::<(), _>("refused"))
            .unwrap();
        domain.mount("ping", handler).unwrap();

        assert!(domain.send_to("ping", ()));
        assert!(domain.send_to("ping", ()));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_patterns_lists_registrations_in_mount_order() {
        let domain = Domain::new();
        let first = domain.mount("a/:id", |_: Context| {}).unwrap()[0];
        let second = domain.mount("b/**", |_: Context| {}).unwrap()[0];
        let third = domain.mount("a/x", |_: Context| {}).unwrap()[0];

        let listed: Vec<_> = domain
            .patterns()
            .into_iter()
            .map(|(id, pattern)| (id, pattern.to_string()))
            .collect();
        assert_eq!(
            listed,
            [
                (first, "a/:id".to_string()),
                (second, "b/**".to_string()),
                (third, "a/x".to_string()),
            ]
        );

        assert!(domain.remove(second));
        assert_eq!(domain.unmount("a/x"), 1);
        let ids: Vec<_> = domain.patterns().into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, [first]);
        assert!(Domain::new().patterns().is_empty());
    }

    #[test]
    fn test_concurrent_mount_unmount_and_send() {
        let domain = Domain::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        std::thread::scope(|scope| {
            for worker in 0..4 {
                let domain = domain.clone();
                let delivered = Arc::clone(&delivered);
                scope.spawn(move || {
                    let point = Address::new(["churn".to_string(), worker.to_string()]);
                    for round in 0..100 {
                        let leaf = point.child(round.to_string());
                        let counter = Arc::clone(&delivered);
                        domain
                            .mount(leaf.clone(), move |_: Context| {
                                counter.fetch_add(1, Ordering::SeqCst);
                            })
                            .unwrap();
                        assert!(domain.send_to(leaf, ()));
                        if round % 10 == 9 {
                            assert_eq!(domain.unmount(point.clone()), 10);
                        }
                    }
                });
            }

            let observer = domain.clone();
            scope.spawn(move || {
                for _ in 0..200 {
                    assert!(observer.listener_count() <= 40);
                    observer.send_to("churn/0/0", ());
                    std::thread::yield_now();
                }
            });
        });

        assert!(delivered.load(Ordering::SeqCst) >= 400);
        assert_eq!(domain.listener_count(), 0);
    }

    #[test]
    fn test_mount_rejects_whole_spec_on_bad_leaf() {
        let domain = Domain::new();
        let spec = MountSpec::tree()
            .at("ok", |_: Context| {})
            .at("**/bad", |_: Context| {});
        assert!(matches!(
            domain.mount("root", spec),
            Err(PatternError::TailNotLast { .. })
        ));
        assert_eq!(domain.listener_count(), 0);
        assert_eq!(domain.mount(Address::empty(), |_: Context| {}), Err(PatternError::Empty));
    }

    #[test]
    fn test_unmount_removes_prefix_and_tail_variants() {
        let domain = Domain::new();
        let (count, handler) = counter();
        let handler = Arc::new(handler);
        for point in ["a", "a/**", "a/b", "a/:id/c"] {
            let handler = Arc::clone(&handler);
            domain.mount(point, move |ctx: Context| handler.as_ref()(ctx)).unwrap();
        }
        domain.mount("other", |_: Context| {}).unwrap();

        assert_eq!(domain.unmount("a"), 4);
        assert_eq!(domain.listeners_under("a"), 0);
        assert!(!domain.send_to("a", ()));
        assert!(!domain.send_to("a/b", ()));
        assert!(!domain.send_to("a/x/c", ()));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(domain.listener_count(), 1);
        assert_eq!(domain.unmount(Address::empty()), 0);
    }

    #[tokio::test]
    async fn test_clear_closes_pending_waits() {
        let domain = Domain::new();
        domain.mount("a", |_: Context| {}).unwrap();
        let wait = domain.wait_for("b", None).unwrap();
        assert_eq!(domain.clear(), 2);
        assert_eq!(wait.await.unwrap_err(), BusError::Closed);
    }

    #[test]
    fn test_remove_single_registration() {
        let domain = Domain::new();
        let spec = MountSpec::sequence([
            MountSpec::handler(|_: Context| {}),
            MountSpec::handler(|_: Context| {}),
        ]);
        let ids = domain.mount("x", spec).unwrap();
        assert!(domain.remove(ids[0]));
        assert!(!domain.remove(ids[0]));
        assert_eq!(domain.listeners_under("x"), 1);
    }

    #[test]
    fn test_handlers_may_reenter() {
        let domain = Domain::new();
        let (count, handler) = counter();
        domain.mount("echo/back", handler).unwrap();
        domain
            .mount("echo", |ctx: Context| {
                ctx.domain().unmount("echo");
                ctx.send(ctx.to().child("back"), ctx.to().clone(), ctx.body().clone(), Options::new());
            })
            .unwrap();

        assert!(domain.send_to("echo", ()));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(domain.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_uid_reports_unavailable() {
        struct Broken;

        #[async_trait::async_trait]
        impl TokenSource for Broken {
            async fn allocate(&self) -> crate::foundation::error::TokenResult<String> {
                Err(crate::foundation::error::TokenError::Exhausted)
            }
        }

        let domain = Domain::builder().token_source(Broken).build();
        assert!(matches!(
            domain.uid().await,
            Err(BusError::IdentifierUnavailable(_))
        ));
        assert_eq!(Domain::new().uid().await.unwrap().len(), 32);
    }
}
