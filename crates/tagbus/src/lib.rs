//! # tagbus
//!
//! DataConnect: a tag-based publish/subscribe data bus paired with a plugin
//! lifecycle runtime that hosts plugins in named rack/slot containers and
//! wires their declared tags into the bus.
//!
//! ## Overview
//!
//! Four subsystems form the core, each in its own crate so that a plugin
//! author only depends on what it actually uses:
//!
//! - **Tag registry & in-memory backplane** (`tagbus-core`): handle
//!   allocation, path/handle/role mapping, last-value mirror, fan-out
//!   delivery.
//! - **Tag service & plugin host** (`tagbus-framework`): the plugin-facing
//!   `SetTag`/`GetTag`/`SubscribeTag` facade, rack/slot placement, lifecycle,
//!   and the auto-wire algorithm driven by `#[derive(TagPlugin)]`.
//! - **Remote backplane** (`tagbus-transport`, behind the `remote` feature):
//!   the same `TagBackplane` capability reached over gRPC, so a container can
//!   either own the canonical bus or mirror another container's.
//! - **Runtime orchestration** (`tagbus-runtime`): YAML configuration,
//!   logging setup, and `TagbusRuntime` tying the above together.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   SetTag/GetTag    ┌─────────────┐    publish/subscribe   ┌────────────┐
//! │   Plugin    │ ─────────────────▶│  TagService │ ───────────────────────▶│ TagBackplane│
//! │ (rack/slot) │◀──────────────────│             │◀─────────────────────── │ (mem | grpc)│
//! └────────────┘   SubscribeTag     └─────────────┘                        └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tagbus::prelude::*;
//!
//! #[derive(Default, TagPlugin)]
//! struct SensorSim {
//!     #[tag(producer, path = "plant/line1/temperature", auto_publish_interval_ms = 1000)]
//!     temperature: f64,
//! }
//!
//! #[async_trait::async_trait]
//! impl Plugin for SensorSim {
//!     async fn execute(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!         self.temperature += 0.1;
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = tagbus_runtime::ConfigLoader::default().load()?;
//!     let runtime = TagbusRuntime::new(config).await;
//!
//!     runtime.load_plugin("sensor-sim", SensorSim::default()).await?;
//!     runtime.plug("sensor-sim", "Rack1", 1).await?;
//!
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

// Core tag registry and backplane primitives
pub use tagbus_core::*;

// Plugin-facing service, host, rack/slot model
pub use tagbus_framework::{
    HostError, MessageService, NoBindings, Plugin, PluginContext, PluginHost, Rack,
    ServiceRegistry, Slot, SlotRef, TagBindingRole, TagBindingSpec, TagPlugin, TagService,
    TagServiceError,
};

// Runtime orchestration
pub use tagbus_runtime;

// Optional: declarative wiring macros. Shares the `TagPlugin` name with the
// trait above - the derive macro lives in a separate namespace, same as
// `serde::Serialize` the trait and `serde::Serialize` the derive macro.
#[cfg(feature = "macros")]
pub use tagbus_macros::TagPlugin;

// Optional: remote/gRPC backplane
#[cfg(feature = "remote")]
pub use tagbus_transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use tagbus::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use tagbus_runtime::{ConfigLoader, TagbusConfig, TagbusRuntime};

    // Plugin host and tag-facing types
    pub use tagbus_framework::{
        HostError, Plugin, PluginContext, PluginHost, Rack, Slot, SlotRef, TagBindingRole,
        TagBindingSpec, TagPlugin, TagService, TagServiceError,
    };

    // Tag data model
    pub use tagbus_core::{AssignedTag, Handle, Quality, TagCoerce, TagRole, TagValue};

    // Declarative wiring
    #[cfg(feature = "macros")]
    pub use tagbus_macros::TagPlugin;
}
