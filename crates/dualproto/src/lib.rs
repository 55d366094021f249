//! # dualproto
//!
//! An in-process, address-routed message bus.
//!
//! ## Overview
//!
//! Messages travel to hierarchical addresses such as `["user", "bob"]`.
//! Handlers are mounted against address patterns; every send reaches all
//! matching handlers, synchronously and in mount order:
//!
//! ```text
//!                ┌──────────────┐     ┌─ handler "user/:name"   (params: name)
//! send(to) ─────▶│    Domain    │────▶├─ handler "user/**"
//!                │ (mount table)│     └─ wait_for("user/bob")    (one-shot)
//!                └──────────────┘
//!                       ▲
//! get(to) ──────────────┘  mounts a reply mailbox [token, "request"] and
//!                          awaits the first message sent to it
//! ```
//!
//! - **Domain**: the mount table and dispatcher; cloning shares it
//! - **Patterns**: literals, `*`, `:name`, trailing `**` and `::name`
//! - **Waits**: one-shot registrations resolved by a match, a deadline or removal
//! - **Correlation**: `get`/`request` with `200`, `408` and `503` outcomes
//! - **Runtime**: layered configuration and logging around a domain
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dualproto::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = DualRuntime::new();
//!     let domain = runtime.domain();
//!
//!     domain.mount("cupcake/:flavor", |ctx: Context| {
//!         let flavor = ctx.param("flavor").unwrap_or("plain").to_string();
//!         ctx.reply(format!("one {flavor} cupcake"));
//!     })?;
//!
//!     let (body, _) = domain
//!         .request("cupcake/chocolate", (), GetOptions::new())
//!         .await?
//!         .into_result()?;
//!     println!("{body}");
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use dualproto_core as core;
pub use dualproto_runtime as runtime;

/// Commonly used types for building on the bus.
///
/// ```rust,ignore
/// use dualproto::prelude::*;
/// ```
pub mod prelude {
    // Runtime
    pub use dualproto_runtime::{DualConfig, DualRuntime, RuntimeBuilder};

    // Bus
    pub use dualproto_core::{
        Address, BusError, BusResult, Context, Deadline, Domain, FaultReporter, GetOptions,
        HandlerFault, IntoMountSpec, Message, MountSpec, Options, PatternError, RegistrationId,
        Response, Status, TokenSource, WaitFor,
    };

    // Logging macros
    pub use dualproto_runtime::prelude::*;
}
