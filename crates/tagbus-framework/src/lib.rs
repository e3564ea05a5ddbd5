//! # tagbus-framework
//!
//! The plugin-facing layer of the tag bus: a `TagService` façade over the
//! registry and backplane, a `MessageService` for fire-and-forget topic
//! broadcasts, a rack/slot placement model, and the `PluginHost` that drives
//! plugin lifecycle and auto-wires declared tag bindings.
//!
//! Built on top of `tagbus-core`'s registry and backplane capability, but
//! depends only on the `TagBackplane` trait object, so a host can run
//! against either the in-memory backplane or a remote one without caring
//! which.

pub mod context;
pub mod error;
pub mod host;
pub mod message_service;
pub mod plugin;
pub mod service_registry;
pub mod tag_service;
pub mod types;

pub use context::PluginContext;
pub use error::{HostError, TagServiceError};
pub use host::PluginHost;
pub use message_service::{MessageService, PluginMessage};
pub use plugin::Plugin;
pub use service_registry::ServiceRegistry;
pub use tag_service::{Disposable, TagService};
pub use types::{
    NoBindings, PluginState, Rack, ServiceKey, Slot, SlotRef, TagBindingRole, TagBindingSpec,
    TagPlugin, host_service_key,
};

pub mod prelude {
    pub use crate::{
        HostError, MessageService, NoBindings, Plugin, PluginContext, PluginHost, Rack,
        ServiceRegistry, Slot, SlotRef, TagBindingRole, TagBindingSpec, TagPlugin, TagService,
        TagServiceError,
    };
    pub use tagbus_core::prelude::*;
}
