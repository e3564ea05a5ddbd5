//! Runtime orchestration layer for the DataConnect tag bus platform.
//!
//! This crate provides:
//! - YAML configuration loading and validation (`config`)
//! - Logging setup built on `tracing`/`tracing-subscriber` (`logging`)
//! - The orchestrator that builds a [`runtime::TagbusRuntime`]: wires a
//!   [`tagbus_framework::PluginHost`] to either an in-process backplane or a
//!   gRPC-served/connected remote one, registers configured racks, and runs
//!   until a shutdown signal arrives.
//!
//! ```ignore
//! use tagbus_runtime::{config::load_config, runtime::TagbusRuntime};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     tagbus_runtime::logging::builder_from_level(config.container.log_level).init();
//!
//!     let runtime = TagbusRuntime::new(config).await;
//!     runtime.load_plugin("sensor-sim", MySensorPlugin::default()).await?;
//!     runtime.plug("sensor-sim", "Rack1", 1).await?;
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, ConfigLoader, ConfigResult, TagbusConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{RuntimeStats, TagbusRuntime};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{ConfigLoader, RuntimeError, RuntimeResult, TagbusConfig, TagbusRuntime};
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
