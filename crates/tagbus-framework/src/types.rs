//! Rack/slot placement model, plugin instance bookkeeping, and the
//! reflection-free tag-binding contract implemented by `#[derive(TagPlugin)]`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tagbus_core::TagValue;

/// A reference to a placed slot, carried in a plugin's context once plugged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotRef {
    pub rack: String,
    pub slot_id: i32,
}

/// A single, exclusively-occupied placement position inside a [`Rack`].
///
/// `id` is the slot's immutable identity; `name` is a mutable display label.
/// Configuration pre-creates every slot - the host never creates one
/// implicitly on plug.
pub struct Slot {
    pub id: i32,
    name: Mutex<String>,
    occupant: Mutex<Option<String>>,
}

impl Slot {
    pub fn new(id: i32, name: impl Into<String>) -> Self {
        Self {
            id,
            name: Mutex::new(name.into()),
            occupant: Mutex::new(None),
        }
    }

    pub fn name(&self) -> String {
        self.name.lock().clone()
    }

    pub fn rename(&self, name: impl Into<String>) {
        *self.name.lock() = name.into();
    }

    pub fn occupant(&self) -> Option<String> {
        self.occupant.lock().clone()
    }

    /// Claims the slot for `instance_id`, failing if it is already occupied.
    pub fn try_occupy(&self, instance_id: &str) -> Result<(), String> {
        let mut occupant = self.occupant.lock();
        match occupant.as_ref() {
            Some(existing) => Err(existing.clone()),
            None => {
                *occupant = Some(instance_id.to_string());
                Ok(())
            }
        }
    }

    /// Clears the occupant, regardless of who currently holds it.
    pub fn vacate(&self) {
        *self.occupant.lock() = None;
    }
}

/// A named container of pre-created [`Slot`]s.
pub struct Rack {
    pub name: String,
    slots: HashMap<i32, Arc<Slot>>,
}

impl Rack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slots: HashMap::new(),
        }
    }

    pub fn with_slot(mut self, id: i32, name: impl Into<String>) -> Self {
        self.slots.insert(id, Arc::new(Slot::new(id, name)));
        self
    }

    pub fn slot(&self, id: i32) -> Option<Arc<Slot>> {
        self.slots.get(&id).cloned()
    }

    pub fn slot_by_name(&self, name: &str) -> Option<Arc<Slot>> {
        self.slots.values().find(|s| s.name() == name).cloned()
    }

    pub fn slots(&self) -> impl Iterator<Item = &Arc<Slot>> {
        self.slots.values()
    }
}

/// Lifecycle state of a plugin instance, per the host's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Created,
    Initialized,
    Started,
    Stopped,
}

/// Keys the global service registry: `(rack_name, slot_id, service_name)`.
/// Host-level services use `("", 0, name)`.
pub type ServiceKey = (String, i32, String);

pub fn host_service_key(name: impl Into<String>) -> ServiceKey {
    (String::new(), 0, name.into())
}

/// The role a `#[tag(...)]`-annotated field plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagBindingRole {
    Producer,
    Consumer,
}

/// One binding extracted from a plugin by `#[derive(TagPlugin)]`, equivalent
/// to a single attribute-carrying member in an annotation-driven host.
#[derive(Debug, Clone)]
pub struct TagBindingSpec {
    pub path: String,
    pub role: TagBindingRole,
    /// Only meaningful for `Producer` bindings: how often the host reads the
    /// field back and publishes it. `None` means the field is only written
    /// through `SetTag` calls made explicitly by plugin code.
    pub auto_publish_interval_ms: Option<u64>,
}

/// Implemented by `#[derive(TagPlugin)]`. The explicit, reflection-free
/// registration API the design notes call for: a generated listing of a
/// plugin's tag bindings plus read/write access to the bound fields, so the
/// host's auto-wire algorithm can operate identically whether the bindings
/// came from attribute scanning (as in a reflective runtime) or from this
/// compile-time expansion.
pub trait TagPlugin {
    fn tag_bindings(&self) -> Vec<TagBindingSpec>;

    /// Writes a freshly delivered value into the consumer field bound to
    /// `path`. Returns `false` if no consumer field is bound to that path.
    fn write_consumer_field(&mut self, path: &str, value: &TagValue) -> bool;

    /// Reads the current value of the producer field bound to `path`.
    fn read_producer_field(&self, path: &str) -> Option<TagValue>;
}

/// A plugin with no tag bindings of its own (e.g. a pure service provider).
/// Lets such plugins skip `#[derive(TagPlugin)]`.
pub struct NoBindings;

impl TagPlugin for NoBindings {
    fn tag_bindings(&self) -> Vec<TagBindingSpec> {
        Vec::new()
    }

    fn write_consumer_field(&mut self, _path: &str, _value: &TagValue) -> bool {
        false
    }

    fn read_producer_field(&self, _path: &str) -> Option<TagValue> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_occupy_fails_for_a_second_claimant() {
        let slot = Slot::new(1, "Slot1");
        assert!(slot.try_occupy("plugin-a").is_ok());

        let err = slot.try_occupy("plugin-b").unwrap_err();
        assert_eq!(err, "plugin-a");
        assert_eq!(slot.occupant(), Some("plugin-a".to_string()));
    }

    #[test]
    fn vacate_allows_re_occupation() {
        let slot = Slot::new(1, "Slot1");
        slot.try_occupy("plugin-a").unwrap();
        slot.vacate();

        assert_eq!(slot.occupant(), None);
        assert!(slot.try_occupy("plugin-b").is_ok());
    }

    #[test]
    fn rack_looks_up_slots_by_id_and_name() {
        let rack = Rack::new("Rack1").with_slot(1, "TemperatureSensor");

        assert!(rack.slot(1).is_some());
        assert!(rack.slot(2).is_none());
        assert!(rack.slot_by_name("TemperatureSensor").is_some());
        assert!(rack.slot_by_name("missing").is_none());
    }

    #[test]
    fn no_bindings_plugin_has_no_tag_bindings() {
        let mut plugin = NoBindings;
        assert!(plugin.tag_bindings().is_empty());
        assert!(!plugin.write_consumer_field("anything", &TagValue::Bool(true)));
        assert!(plugin.read_producer_field("anything").is_none());
    }
}
