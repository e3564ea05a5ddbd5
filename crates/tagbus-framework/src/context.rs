//! The context object injected into a plugin at `Initialize`.
//!
//! Holds only non-owning `Arc` references to host services - ownership flows
//! host -> plugin, never back, so the host <-> context <-> plugin cycle never
//! becomes a reference cycle the allocator has to reason about.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::message_service::MessageService;
use crate::service_registry::ServiceRegistry;
use crate::tag_service::TagService;
use crate::types::SlotRef;

pub struct PluginContext {
    pub instance_id: String,
    pub tag_service: Arc<TagService>,
    pub message_service: Arc<MessageService>,
    pub service_registry: Arc<ServiceRegistry>,
    current_slot: RwLock<Option<SlotRef>>,
}

impl PluginContext {
    pub fn new(
        instance_id: impl Into<String>,
        tag_service: Arc<TagService>,
        message_service: Arc<MessageService>,
        service_registry: Arc<ServiceRegistry>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            tag_service,
            message_service,
            service_registry,
            current_slot: RwLock::new(None),
        }
    }

    pub fn current_slot(&self) -> Option<SlotRef> {
        self.current_slot.read().clone()
    }

    pub(crate) fn set_current_slot(&self, slot: Option<SlotRef>) {
        *self.current_slot.write() = slot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagbus_core::TagRegistry;

    fn context() -> PluginContext {
        let registry = Arc::new(TagRegistry::new());
        let backplane = Arc::new(tagbus_core::InMemoryBackplane::new());
        PluginContext::new(
            "plugin-1",
            Arc::new(TagService::new(registry, backplane)),
            Arc::new(MessageService::new()),
            Arc::new(ServiceRegistry::new()),
        )
    }

    #[test]
    fn current_slot_starts_unset() {
        assert_eq!(context().current_slot(), None);
    }

    #[test]
    fn set_current_slot_is_visible_through_the_getter() {
        let ctx = context();
        let slot = SlotRef {
            rack: "Rack1".into(),
            slot_id: 1,
        };
        ctx.set_current_slot(Some(slot.clone()));
        assert_eq!(ctx.current_slot(), Some(slot));
    }
}
