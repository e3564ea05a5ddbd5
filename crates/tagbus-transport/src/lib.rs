//! # tagbus-transport
//!
//! Remote backplane transport for the DataConnect tag bus, over gRPC.
//!
//! `tagbus-core::TagBackplane` is the capability both the in-memory
//! backplane and this crate's [`RemoteBackplane`] implement. A plugin host
//! built against `Arc<dyn TagBackplane>` runs unmodified against either one:
//!
//! ```rust,ignore
//! use tagbus_transport::RemoteBackplane;
//! use tagbus_framework::PluginHost;
//!
//! let backplane = RemoteBackplane::connect("http://127.0.0.1:50051").await?;
//! let host = PluginHost::new(Arc::new(backplane));
//! ```
//!
//! [`TagBusService`] is the server side: it wraps any `Arc<dyn
//! TagBackplane>` (typically an [`tagbus_core::InMemoryBackplane`] in a
//! process that owns the canonical data) and exposes it over the network.

mod convert;
pub mod error;

mod client;
mod server;

pub use client::RemoteBackplane;
pub use error::TransportError;
pub use server::TagBusService;

/// Generated protobuf types and the tonic client/server traits.
pub mod pb {
    tonic::include_proto!("tagbus");
}
