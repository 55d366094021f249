//! Request/reply correlation.
//!
//! `get` sends a message whose `from` is a freshly allocated mailbox
//! `[token, "request"]` and waits there for the reply. Expected failures
//! do not reject: they resolve with a synthesized context whose
//! `options.statusCode` says what happened.
//!
//! | Outcome                        | Status                | Latency    |
//! |--------------------------------|-----------------------|------------|
//! | reply arrived                  | as sent (default 200) | reply time |
//! | nothing mounted at destination | 503 `Unreachable`     | immediate  |
//! | deadline elapsed               | 408 `Timeout`         | deadline   |
//! | mailbox removed before a reply | 503 `Unreachable`     | on removal |
//!
//! [`Response::into_result`] turns the status back into a `Result` for
//! callers that prefer `?`.

use std::time::Duration;

use serde_json::Value;
use tracing::warn;

use crate::foundation::address::Address;
use crate::foundation::context::Context;
use crate::foundation::error::{BusError, BusResult};
use crate::foundation::message::{Options, Status};
use crate::foundation::pattern::Pattern;
use crate::framework::dispatcher::Domain;

/// Second segment of every reply mailbox.
pub const REPLY_SEGMENT: &str = "request";

/// How long a request waits for its reply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Deadline {
    /// The domain's configured request timeout.
    #[default]
    Default,
    /// A specific duration.
    After(Duration),
    /// No deadline.
    Never,
}

/// Per-call settings for [`Domain::get`] and [`Domain::request`].
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    pub deadline: Deadline,
    /// Options sent with the outbound message.
    pub options: Options,
}

impl GetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits at most `timeout`; zero means no deadline.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.deadline = if timeout.is_zero() {
            Deadline::Never
        } else {
            Deadline::After(timeout)
        };
        self
    }

    pub fn no_timeout(mut self) -> Self {
        self.deadline = Deadline::Never;
        self
    }

    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

/// The `(body, options)` of a correlated reply.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub body: Value,
    pub options: Options,
    to: Address,
}

impl Response {
    fn new(ctx: Context, to: Address) -> Self {
        let (body, options) = ctx.into_response();
        Self { body, options, to }
    }

    /// Status from `options.statusCode`.
    pub fn status(&self) -> Status {
        Status::from_options(&self.options)
    }

    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }

    /// The destination the request was sent to.
    pub fn destination(&self) -> &Address {
        &self.to
    }

    pub fn into_parts(self) -> (Value, Options) {
        (self.body, self.options)
    }

    /// Maps 408 to [`BusError::Timeout`] and 503 to
    /// [`BusError::Unreachable`]; every other status is returned as a reply.
    pub fn into_result(self) -> BusResult<(Value, Options)> {
        match self.status() {
            Status::Timeout => Err(BusError::Timeout),
            Status::Unreachable => Err(BusError::Unreachable(self.to.to_string())),
            _ => Ok(self.into_parts()),
        }
    }
}

impl Domain {
    /// Sends `body` to `to` and waits for a reply on an ephemeral mailbox.
    ///
    /// Resolves with the reply's context, or with a synthesized context
    /// carrying [`Status::Unreachable`] (nothing matched `to`, or the mailbox
    /// was unmounted or cleared before a reply) or [`Status::Timeout`].
    ///
    /// The token is used verbatim, so tokens such as `:id` or `**` still
    /// name a single mailbox.
    ///
    /// # Errors
    ///
    /// [`BusError::IdentifierUnavailable`] if no token could be allocated.
    pub async fn get(
        &self,
        to: impl Into<Address>,
        body: impl Into<Value>,
        request: GetOptions,
    ) -> BusResult<Context> {
        let to = to.into();
        let body = body.into();
        let token = self.uid().await?;
        let mailbox = Address::new([token, REPLY_SEGMENT.to_string()]);
        let timeout = match request.deadline {
            Deadline::Default => self.request_timeout(),
            Deadline::After(timeout) => Some(timeout),
            Deadline::Never => None,
        };

        let wait = self.wait_on(Pattern::literal(&mailbox)?, timeout);
        if !self.send(to.clone(), mailbox.clone(), body, request.options) {
            drop(wait);
            warn!(%to, "No handler mounted, request unreachable");
            return Ok(Context::synthesized(
                self.clone(),
                mailbox,
                to,
                Status::Unreachable,
            ));
        }

        match wait.await {
            Err(BusError::Timeout) => {
                warn!(%to, ?timeout, "Request timed out");
                Ok(Context::synthesized(
                    self.clone(),
                    mailbox,
                    to,
                    Status::Timeout,
                ))
            }
            Err(BusError::Closed) => {
                warn!(%to, "Reply mailbox closed before a reply");
                Ok(Context::synthesized(
                    self.clone(),
                    mailbox,
                    to,
                    Status::Unreachable,
                ))
            }
            result => result,
        }
    }

    /// [`Domain::get`] unwrapped to the reply's body and options.
    pub async fn request(
        &self,
        to: impl Into<Address>,
        body: impl Into<Value>,
        request: GetOptions,
    ) -> BusResult<Response> {
        let to = to.into();
        let ctx = self.get(to.clone(), body, request).await?;
        Ok(Response::new(ctx, to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::error::{TokenError, TokenResult};
    use crate::integration::token::TokenSource;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Notify;
    use tokio::time::Instant;

    fn echo_domain() -> Domain {
        let domain = Domain::new();
        domain
            .mount("echo", |ctx: Context| {
                ctx.reply(ctx.body().clone());
            })
            .unwrap();
        domain
    }

    #[tokio::test]
    async fn test_reply_resolves_get() {
        let domain = echo_domain();
        let ctx = domain
            .get("echo", json!({ "hello": "world" }), GetOptions::new())
            .await
            .unwrap();
        assert_eq!(ctx.status(), Status::Ok);
        assert_eq!(ctx.body()["hello"], "world");
        assert_eq!(ctx.to().last().map(String::as_str), Some(REPLY_SEGMENT));
        assert_eq!(domain.listener_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_resolves_immediately() {
        let domain = Domain::new();
        let start = Instant::now();
        let ctx = domain
            .get("svc", (), GetOptions::new().timeout(Duration::from_millis(100)))
            .await
            .unwrap();
        assert_eq!(ctx.status(), Status::Unreachable);
        assert_eq!(ctx.from(), &Address::from("svc"));
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(domain.listener_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_handler_times_out() {
        let domain = Domain::builder()
            .request_timeout(Some(Duration::from_secs(5)))
            .build();
        domain.mount("silent", |_: Context| {}).unwrap();

        let start = Instant::now();
        let response = domain
            .request("silent", (), GetOptions::new())
            .await
            .unwrap();
        assert_eq!(response.status(), Status::Timeout);
        assert!(start.elapsed() >= Duration::from_secs(5));
        assert_eq!(response.into_result(), Err(BusError::Timeout));
        assert_eq!(domain.listener_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_reply_and_custom_status() {
        let domain = Domain::new();
        domain
            .mount("lookup/:key", |ctx: Context| {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    let key = ctx.param("key").unwrap_or_default().to_string();
                    ctx.reply_with(json!({ "missing": key }), Status::Other(404).to_options());
                });
            })
            .unwrap();

        let response = domain
            .request("lookup/cake", (), GetOptions::new())
            .await
            .unwrap();
        assert_eq!(response.status(), Status::Other(404));
        assert!(!response.is_success());
        let (body, _) = response.into_result().unwrap();
        assert_eq!(body["missing"], "cake");
    }

    #[tokio::test]
    async fn test_request_into_result_unreachable() {
        let domain = Domain::new();
        let response = domain
            .request("nowhere", (), GetOptions::new())
            .await
            .unwrap();
        assert_eq!(
            response.into_result(),
            Err(BusError::Unreachable("nowhere".into()))
        );
    }

    #[tokio::test]
    async fn test_token_failure_rejects() {
        struct Exhausted;

        #[async_trait]
        impl TokenSource for Exhausted {
            async fn allocate(&self) -> TokenResult<String> {
                Err(TokenError::Exhausted)
            }
        }

        let domain = Domain::builder().token_source(Exhausted).build();
        domain.mount("echo", |_: Context| {}).unwrap();
        let result = domain.get("echo", (), GetOptions::new()).await;
        assert!(matches!(result, Err(BusError::IdentifierUnavailable(_))));
    }

    #[tokio::test]
    async fn test_syntax_like_tokens_name_one_mailbox() {
        struct Verbatim(&'static str);

        #[async_trait]
        impl TokenSource for Verbatim {
            async fn allocate(&self) -> TokenResult<String> {
                Ok(self.0.to_string())
            }
        }

        for token in [":tok", "*", "**", "::rest"] {
            let domain = Domain::builder().token_source(Verbatim(token)).build();
            domain
                .mount("svc", |ctx: Context| {
                    ctx.domain().send_to(["intruder", REPLY_SEGMENT], "stolen");
                    ctx.reply("genuine");
                })
                .unwrap();

            let ctx = domain.get("svc", (), GetOptions::new()).await.unwrap();
            assert_eq!(ctx.body(), "genuine", "token {token}");
            assert_eq!(ctx.to(), &Address::from([token, REPLY_SEGMENT]));
            assert_eq!(domain.listener_count(), 1);
        }
    }

    #[tokio::test]
    async fn test_cleared_mailbox_resolves_unreachable() {
        let domain = Domain::new();
        let received = Arc::new(Notify::new());
        let signal = Arc::clone(&received);
        domain
            .mount("svc", move |_: Context| signal.notify_one())
            .unwrap();

        let pending = tokio::spawn({
            let domain = domain.clone();
            async move {
                domain
                    .get("svc", (), GetOptions::new().timeout(Duration::from_secs(60)))
                    .await
            }
        });
        received.notified().await;
        assert_eq!(domain.clear(), 2);

        let ctx = pending.await.unwrap().unwrap();
        assert_eq!(ctx.status(), Status::Unreachable);
        assert_eq!(ctx.from(), &Address::from("svc"));
        assert_eq!(domain.listener_count(), 0);
    }

    #[test]
    fn test_get_options_builder() {
        let options = GetOptions::new()
            .timeout(Duration::from_secs(1))
            .option("trace", true);
        assert_eq!(options.deadline, Deadline::After(Duration::from_secs(1)));
        assert_eq!(options.options["trace"], json!(true));
        assert_eq!(GetOptions::new().timeout(Duration::ZERO).deadline, Deadline::Never);
    }
}
