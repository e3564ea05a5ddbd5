//! The abstract backplane capability set shared by the in-memory and remote
//! transports, so that the tag service and plugin host depend on neither
//! concretely.

use async_trait::async_trait;

use crate::backplane::{InMemoryBackplane, Subscription};
use crate::error::BackplaneResult;
use crate::registry::TagRegistry;
use crate::types::{AssignedTag, Handle, TagEnvelope, TagRegistrationItem, TagValue};

/// `{Publish, GetLastValue, Subscribe}` - the capability set a backplane
/// implementation must provide. [`InMemoryBackplane`] implements this
/// directly; `tagbus-transport`'s remote client implements it over gRPC.
#[async_trait]
pub trait TagBackplane: Send + Sync {
    async fn publish(
        &self,
        handle: Handle,
        value: TagValue,
        source: String,
        timestamp_ms: u64,
    ) -> BackplaneResult<()>;

    async fn get_last_value(&self, handle: Handle) -> BackplaneResult<Option<TagEnvelope>>;

    async fn subscribe(&self, handle: Handle) -> BackplaneResult<Subscription>;
}

/// The fourth RPC of §6's wire protocol, `RegisterTags`, kept as a separate
/// capability from [`TagBackplane`] since the distilled spec treats the
/// registry and the backplane as distinct components (§4.1 vs §4.2/§4.3).
/// [`TagRegistry`] implements this directly for an in-process host;
/// `tagbus-transport`'s `RemoteBackplane` implements it over gRPC so a
/// client-mode [`tagbus_framework`]-style host can source handle identity
/// from the server it connects to instead of allocating its own.
#[async_trait]
pub trait TagRegistrar: Send + Sync {
    async fn register_tags(
        &self,
        reference_plugin_instance_id: &str,
        items: Vec<TagRegistrationItem>,
    ) -> BackplaneResult<Vec<AssignedTag>>;
}

#[async_trait]
impl TagRegistrar for TagRegistry {
    async fn register_tags(
        &self,
        reference_plugin_instance_id: &str,
        items: Vec<TagRegistrationItem>,
    ) -> BackplaneResult<Vec<AssignedTag>> {
        Ok(TagRegistry::register_tags(self, reference_plugin_instance_id, items))
    }
}

#[async_trait]
impl TagBackplane for InMemoryBackplane {
    async fn publish(
        &self,
        handle: Handle,
        value: TagValue,
        source: String,
        timestamp_ms: u64,
    ) -> BackplaneResult<()> {
        InMemoryBackplane::publish(self, handle, value, source, timestamp_ms)
    }

    async fn get_last_value(&self, handle: Handle) -> BackplaneResult<Option<TagEnvelope>> {
        InMemoryBackplane::get_last_value(self, handle)
    }

    async fn subscribe(&self, handle: Handle) -> BackplaneResult<Subscription> {
        InMemoryBackplane::subscribe(self, handle)
    }
}
