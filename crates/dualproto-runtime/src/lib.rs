//! dualproto runtime - configuration, logging and bus wiring.
//!
//! This crate provides:
//! - Layered configuration (`dualproto.toml`, `DUAL_*` environment variables)
//! - Logging setup through `tracing-subscriber`
//! - [`DualRuntime`], a [`Domain`](dualproto_core::Domain) built from configuration
//!
//! ```ignore
//! use dualproto_core::prelude::*;
//! use dualproto_runtime::DualRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = DualRuntime::builder().profile("production").build()?;
//!
//!     runtime.domain().mount("ping", |ctx: Context| {
//!         ctx.reply("pong");
//!     })?;
//!
//!     // Unmounts everything on Ctrl+C
//!     runtime.run().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{BusConfig, ConfigError, ConfigLoader, ConfigResult, DualConfig, LoggingConfig};
pub use error::{LoggingError, RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{DualRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros and span helpers.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
