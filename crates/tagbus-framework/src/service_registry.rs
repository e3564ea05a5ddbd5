//! Global service registry keyed by `(rack, slot_id, service_name)`.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::HostError;
use crate::types::{Rack, ServiceKey, host_service_key};

/// Keyed lookup table for inter-plugin services. Registration overwrites any
/// prior entry under the same key; host-level services (the tag service, the
/// message service, the backplane, the registries) are registered under
/// `("", 0, name)`.
#[derive(Default)]
pub struct ServiceRegistry {
    entries: RwLock<HashMap<ServiceKey, Arc<dyn Any + Send + Sync>>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_host_service(&self, name: impl Into<String>, service: Arc<dyn Any + Send + Sync>) {
        self.entries.write().insert(host_service_key(name), service);
    }

    pub fn register(
        &self,
        rack: impl Into<String>,
        slot_id: i32,
        name: impl Into<String>,
        service: Arc<dyn Any + Send + Sync>,
    ) {
        self.entries
            .write()
            .insert((rack.into(), slot_id, name.into()), service);
    }

    /// Looks up a service by raw key and downcasts it to `T`.
    pub fn get<T: Send + Sync + 'static>(
        &self,
        rack: &str,
        slot_id: i32,
        name: &str,
    ) -> Result<Arc<T>, HostError> {
        let key = (rack.to_string(), slot_id, name.to_string());
        self.entries
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| HostError::ServiceNotFound(name.to_string()))?
            .downcast::<T>()
            .map_err(|_| HostError::ServiceNotFound(name.to_string()))
    }

    pub fn get_host_service<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>, HostError> {
        self.get("", 0, name)
    }

    /// Convenience overload of [`Self::get`] for callers that only know a
    /// slot's display name rather than its id: resolves `slot_name` against
    /// `rack` via `Rack::slot_by_name`, then looks the service up by the
    /// resolved slot id.
    pub fn get_by_slot_name<T: Send + Sync + 'static>(
        &self,
        rack: &Rack,
        slot_name: &str,
        name: &str,
    ) -> Result<Arc<T>, HostError> {
        let slot = rack.slot_by_name(slot_name).ok_or_else(|| {
            HostError::ServiceNotFound(format!(
                "slot '{slot_name}' not found in rack '{}' (looking up service '{name}')",
                rack.name
            ))
        })?;
        self.get(&rack.name, slot.id, name)
    }
}
