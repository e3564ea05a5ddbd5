//! # tagbus-core
//!
//! Core engine of the DataConnect tag bus: the tag registry and the
//! in-memory backplane.
//!
//! ## Architecture
//!
//! - **Registry** ([`TagRegistry`]): maps hierarchical tag paths to stable
//!   numeric handles and tracks each tag's declared role and owner.
//! - **Backplane** ([`InMemoryBackplane`]): holds the last published value
//!   per handle and fans out updates to subscribers with last-writer-wins
//!   semantics and per-handle ordering.
//!
//! Everything above the registry and backplane - the tag service facade,
//! the plugin host, and the remote/gRPC transport - is layered on top of
//! these two primitives in `tagbus-framework` and `tagbus-transport`.
//!
//! ## Example
//!
//! ```
//! use tagbus_core::{InMemoryBackplane, TagRegistration, TagRegistry, TagRole, TagValue};
//!
//! let registry = TagRegistry::new();
//! let backplane = InMemoryBackplane::new();
//!
//! let handles = registry.register(vec![TagRegistration {
//!     path: "plant/line1/temperature".into(),
//!     role: TagRole::Producer,
//!     owner_plugin_instance_id: "sensor-sim".into(),
//! }]);
//!
//! backplane
//!     .publish(handles[0], TagValue::Float(21.5), "sensor-sim", 0)
//!     .unwrap();
//! ```

pub mod backplane;
pub mod capability;
pub mod error;
pub mod registry;
pub mod types;

pub use backplane::{InMemoryBackplane, Subscription};
pub use capability::{TagBackplane, TagRegistrar};
pub use error::{BackplaneError, BackplaneResult, RegistryError, RegistryResult};
pub use registry::{TagRegistration, TagRegistry};
pub use types::{
    AssignedTag, Handle, Quality, TagCoerce, TagDescriptor, TagEnvelope, TagRegistrationItem,
    TagRole, TagValue,
};

/// Common imports for crates building on `tagbus-core`.
pub mod prelude {
    pub use crate::{
        AssignedTag, BackplaneError, Handle, InMemoryBackplane, Quality, RegistryError,
        Subscription, TagBackplane, TagCoerce, TagDescriptor, TagEnvelope, TagRegistrar,
        TagRegistration, TagRegistrationItem, TagRegistry, TagRole, TagValue,
    };
}
