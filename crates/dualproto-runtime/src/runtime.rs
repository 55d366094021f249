//! Runtime wiring: configuration, logging and a configured [`Domain`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use dualproto_runtime::DualRuntime;
//!
//! // Loads dualproto.toml from the current directory, if any
//! let runtime = DualRuntime::new();
//! runtime.domain().mount("ping", |ctx: Context| ctx.reply("pong"))?;
//! runtime.run().await;
//!
//! // Explicit file and profile
//! let runtime = DualRuntime::builder()
//!     .config_file("conf/dualproto.toml")
//!     .profile("production")
//!     .build()?;
//! ```

use std::future::Future;
use std::path::Path;

use dualproto_core::{
    BoxedReporter, BoxedTokenSource, Domain, DomainBuilder, FaultReporter, TokenSource,
    UuidTokenSource,
};
use tokio::signal;
use tracing::{info, warn};

use crate::config::{ConfigLoader, DualConfig, validate_config};
use crate::error::RuntimeResult;
use crate::logging;

/// A configured bus plus the settings it was built from.
///
/// Cloning the runtime's [`Domain`] shares the same mount table, so handlers
/// can be mounted from anywhere the domain has been handed to.
pub struct DualRuntime {
    config: DualConfig,
    domain: Domain,
}

impl DualRuntime {
    /// Loads configuration from the current directory and the environment.
    ///
    /// A configuration that fails to load or validate is replaced by the
    /// defaults.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .and_then(|config| validate_config(&config).map(|()| config))
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                DualConfig::default()
            });

        match Self::from_config(config) {
            Ok(runtime) => runtime,
            Err(e) => {
                eprintln!("Warning: Failed to initialize logging ({e})");
                Self::assemble(DualConfig::default(), None, None)
            }
        }
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Validates `config`, initializes logging and builds the domain.
    pub fn from_config(config: DualConfig) -> RuntimeResult<Self> {
        validate_config(&config)?;
        logging::init_from_config(&config.logging)?;
        Ok(Self::assemble(config, None, None))
    }

    fn assemble(
        config: DualConfig,
        tokens: Option<BoxedTokenSource>,
        reporter: Option<BoxedReporter>,
    ) -> Self {
        let domain = Self::domain_builder(&config, tokens, reporter).build();

        info!(
            log_level = %config.logging.level,
            request_timeout = ?domain.request_timeout(),
            wait_timeout = ?domain.wait_timeout(),
            "Runtime initialized from configuration"
        );

        Self { config, domain }
    }

    fn domain_builder(
        config: &DualConfig,
        tokens: Option<BoxedTokenSource>,
        reporter: Option<BoxedReporter>,
    ) -> DomainBuilder {
        let mut builder = Domain::builder()
            .request_timeout(config.bus.request_timeout())
            .wait_timeout(config.bus.wait_timeout());

        builder = match (tokens, &config.bus.token_prefix) {
            (Some(tokens), _) => builder.shared_token_source(tokens),
            (None, Some(prefix)) => builder.token_source(UuidTokenSource::with_prefix(prefix)),
            (None, None) => builder,
        };
        if let Some(reporter) = reporter {
            builder = builder.shared_reporter(reporter);
        }
        builder
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    pub fn config(&self) -> &DualConfig {
        &self.config
    }

    /// Runs until Ctrl+C or SIGTERM, then shuts down.
    pub async fn run(&self) -> usize {
        self.run_until(wait_for_signal()).await
    }

    /// Runs until `shutdown` completes, then shuts down.
    pub async fn run_until<F>(&self, shutdown: F) -> usize
    where
        F: Future<Output = ()>,
    {
        info!(
            listeners = self.domain.listener_count(),
            "dualproto runtime is running"
        );
        shutdown.await;
        self.shutdown()
    }

    /// Unmounts every handler, closing pending waits. Pending `get`s
    /// resolve with a 503 status.
    ///
    /// Returns the number of registrations removed.
    pub fn shutdown(&self) -> usize {
        let removed = self.domain.clear();
        info!(removed, "Runtime stopped");
        removed
    }
}

impl Default for DualRuntime {
    fn default() -> Self {
        Self::new()
    }
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => warn!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`DualRuntime`] with custom configuration sources or
/// collaborators.
pub struct RuntimeBuilder {
    loader: ConfigLoader,
    init_logging: bool,
    tokens: Option<BoxedTokenSource>,
    reporter: Option<BoxedReporter>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new().with_current_dir(),
            init_logging: true,
            tokens: None,
            reporter: None,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.loader = self.loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.loader = self.loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.loader = self.loader.without_env();
        self
    }

    /// Merges configuration programmatically, below files and environment.
    pub fn merge(mut self, config: DualConfig) -> Self {
        self.loader = self.loader.merge(config);
        self
    }

    /// Leaves the global subscriber to the caller.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Overrides the reply-mailbox token source, ignoring `bus.token_prefix`.
    pub fn token_source(mut self, tokens: impl TokenSource + 'static) -> Self {
        self.tokens = Some(std::sync::Arc::new(tokens));
        self
    }

    pub fn reporter(mut self, reporter: impl FaultReporter + 'static) -> Self {
        self.reporter = Some(std::sync::Arc::new(reporter));
        self
    }

    pub fn build(self) -> RuntimeResult<DualRuntime> {
        let config = self.loader.load()?;
        validate_config(&config)?;
        if self.init_logging {
            logging::init_from_config(&config.logging)?;
        }
        Ok(DualRuntime::assemble(config, self.tokens, self.reporter))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
