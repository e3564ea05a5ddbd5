//! Plugin host: rack/slot placement, lifecycle, the global service
//! registry, and the auto-wire algorithm that turns a plugin's declared tag
//! bindings into live subscriptions and periodic publishes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock as SyncRwLock;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use tagbus_core::{
    AssignedTag, InMemoryBackplane, TagBackplane, TagRegistrar, TagRegistrationItem, TagRegistry,
    TagRole,
};

use crate::context::PluginContext;
use crate::error::HostError;
use crate::message_service::MessageService;
use crate::plugin::Plugin;
use crate::service_registry::ServiceRegistry;
use crate::tag_service::{Disposable, TagService};
use crate::types::{PluginState, Rack, ServiceKey, SlotRef, TagBindingRole};

const STOP_JOIN_DEADLINE: Duration = Duration::from_secs(5);

struct PluginRecord {
    instance_id: String,
    plugin: Arc<AsyncMutex<dyn Plugin>>,
    context: Arc<PluginContext>,
    state: SyncRwLock<PluginState>,
    current_slot: SyncRwLock<Option<SlotRef>>,
    auto_wirings: AsyncMutex<Vec<Disposable>>,
    periodic_tasks: AsyncMutex<Vec<JoinHandle<()>>>,
    run_loop_cancel: CancellationToken,
    run_loop: AsyncMutex<Option<JoinHandle<()>>>,
}

/// Central owner of racks, plugin instances, and the global service
/// registry. Drives the lifecycle contract in §4.5: Instantiate (by the
/// caller) -> `Initialize` -> auto-wire -> `Start` -> optional `Plug` ->
/// `Unplug`/`Stop` on shutdown.
pub struct PluginHost {
    registry: Arc<TagRegistry>,
    registrar: Arc<dyn TagRegistrar>,
    backplane: Arc<dyn TagBackplane>,
    pub tag_service: Arc<TagService>,
    pub message_service: Arc<MessageService>,
    pub service_registry: Arc<ServiceRegistry>,
    racks: SyncRwLock<HashMap<String, Arc<Rack>>>,
    plugins: SyncRwLock<HashMap<String, Arc<PluginRecord>>>,
}

impl PluginHost {
    /// Builds a host wired to the given backplane (in-memory or remote -
    /// the host depends only on the `TagBackplane` capability set).
    /// `RegisterTags` is served by this host's own local registry; use
    /// [`Self::with_remote_registrar`] when handle identity should instead
    /// be sourced from a remote backplane's server.
    pub fn new(backplane: Arc<dyn TagBackplane>) -> Self {
        let registry = Arc::new(TagRegistry::new());
        let registrar: Arc<dyn TagRegistrar> = registry.clone();
        Self::build(registry, registrar, backplane)
    }

    /// Builds a host whose `RegisterTags` calls are forwarded to `registrar`
    /// instead of allocated by a fresh local registry - the client-mode
    /// counterpart to [`Self::new`]. Handle lookups still read from this
    /// host's own in-process `TagRegistry`, kept in sync via
    /// `TagRegistry::import_assigned` every time `registrar` answers a
    /// `RegisterTags` call (see [`Self::register_tags`]), so a remote
    /// backplane's server remains the single source of handle identity.
    pub fn with_remote_registrar(
        backplane: Arc<dyn TagBackplane>,
        registrar: Arc<dyn TagRegistrar>,
    ) -> Self {
        let registry = Arc::new(TagRegistry::new());
        Self::build(registry, registrar, backplane)
    }

    fn build(
        registry: Arc<TagRegistry>,
        registrar: Arc<dyn TagRegistrar>,
        backplane: Arc<dyn TagBackplane>,
    ) -> Self {
        let tag_service = Arc::new(TagService::new(registry.clone(), backplane.clone()));
        let message_service = Arc::new(MessageService::new());
        let service_registry = Arc::new(ServiceRegistry::new());

        service_registry.register_host_service("tagbus.tag_registry", registry.clone());
        service_registry.register_host_service("tagbus.tag_service", tag_service.clone());
        service_registry.register_host_service("tagbus.message_service", message_service.clone());
        service_registry.register_host_service("tagbus.backplane", backplane.clone());

        Self {
            registry,
            registrar,
            backplane,
            tag_service,
            message_service,
            service_registry,
            racks: SyncRwLock::new(HashMap::new()),
            plugins: SyncRwLock::new(HashMap::new()),
        }
    }

    /// Convenience constructor wiring an in-process [`InMemoryBackplane`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryBackplane::new()))
    }

    pub fn tag_registry(&self) -> &Arc<TagRegistry> {
        &self.registry
    }

    /// Forwards a `RegisterTags` batch to this host's registrar - the local
    /// registry by default, or a remote backplane's server when built via
    /// [`Self::with_remote_registrar`] - then mirrors the assigned
    /// identities into the local registry so subsequent path/handle lookups
    /// (`TagService::set_tag`, `get_tag`, `subscribe_tag`) see them
    /// regardless of which registrar produced them.
    pub async fn register_tags(
        &self,
        reference_plugin_instance_id: &str,
        items: Vec<TagRegistrationItem>,
    ) -> Result<Vec<AssignedTag>, HostError> {
        let assigned = self
            .registrar
            .register_tags(reference_plugin_instance_id, items)
            .await
            .map_err(|err| HostError::RegistrationFailed(err.to_string()))?;
        self.registry.import_assigned(&assigned);
        Ok(assigned)
    }

    /// Returns the backplane this host was built against, so callers can
    /// expose it through another transport (e.g. a gRPC server) without the
    /// host needing to know about that transport.
    pub fn backplane(&self) -> Arc<dyn TagBackplane> {
        self.backplane.clone()
    }

    pub fn add_rack(&self, rack: Rack) {
        self.racks.write().insert(rack.name.clone(), Arc::new(rack));
    }

    pub fn rack(&self, name: &str) -> Option<Arc<Rack>> {
        self.racks.read().get(name).cloned()
    }

    pub fn register_service(&self, key: ServiceKey, service: Arc<dyn std::any::Any + Send + Sync>) {
        self.service_registry.register(key.0, key.1, key.2, service);
    }

    /// Instantiates a plugin record: constructs the context, calls
    /// `Initialize`, auto-wires its declared tag bindings, then calls
    /// `Start` and spawns the run loop.
    pub async fn load_plugin(
        &self,
        instance_id: impl Into<String>,
        plugin: impl Plugin + 'static,
    ) -> Result<(), HostError> {
        let instance_id = instance_id.into();
        let context = Arc::new(PluginContext::new(
            instance_id.clone(),
            self.tag_service.clone(),
            self.message_service.clone(),
            self.service_registry.clone(),
        ));

        let plugin: Arc<AsyncMutex<dyn Plugin>> = Arc::new(AsyncMutex::new(plugin));

        {
            let mut guard = plugin.lock().await;
            guard
                .initialize(context.clone())
                .await
                .map_err(|err| HostError::LoadFailure(instance_id.clone(), err.to_string()))?;
        }

        let auto_wirings = self.auto_wire(&instance_id, &plugin).await?;

        let run_interval_ms = {
            let guard = plugin.lock().await;
            guard.run_interval_ms()
        };

        {
            let mut guard = plugin.lock().await;
            guard
                .start()
                .await
                .map_err(|err| HostError::LoadFailure(instance_id.clone(), err.to_string()))?;
        }

        let run_loop_cancel = CancellationToken::new();
        let run_loop = {
            let plugin = plugin.clone();
            let cancel = run_loop_cancel.clone();
            let instance_id = instance_id.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(Duration::from_millis(run_interval_ms.max(1)));
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = ticker.tick() => {
                            let mut guard = plugin.lock().await;
                            if let Err(err) = guard.execute().await {
                                error!(plugin = %instance_id, %err, "Execute raised an error; loop continues");
                            }
                        }
                    }
                }
            })
        };

        let record = Arc::new(PluginRecord {
            instance_id: instance_id.clone(),
            plugin,
            context,
            state: SyncRwLock::new(PluginState::Started),
            current_slot: SyncRwLock::new(None),
            auto_wirings: AsyncMutex::new(auto_wirings.0),
            periodic_tasks: AsyncMutex::new(auto_wirings.1),
            run_loop_cancel,
            run_loop: AsyncMutex::new(Some(run_loop)),
        });

        self.plugins.write().insert(instance_id.clone(), record);
        info!(plugin = %instance_id, "plugin started");
        Ok(())
    }

    /// Scans the plugin's declared tag bindings, registers them with the tag
    /// registry in one batch, establishes consumer subscriptions, and starts
    /// a periodic publish task for every producer binding with a positive
    /// interval.
    async fn auto_wire(
        &self,
        instance_id: &str,
        plugin: &Arc<AsyncMutex<dyn Plugin>>,
    ) -> Result<(Vec<Disposable>, Vec<JoinHandle<()>>), HostError> {
        let bindings = {
            let guard = plugin.lock().await;
            guard.tag_bindings()
        };

        let items: Vec<TagRegistrationItem> = bindings
            .iter()
            .map(|b| TagRegistrationItem {
                path: b.path.clone(),
                role: match b.role {
                    TagBindingRole::Producer => TagRole::Producer,
                    TagBindingRole::Consumer => TagRole::Consumer,
                },
                source_override: None,
            })
            .collect();

        let assigned = self.register_tags(instance_id, items).await?;
        self.tag_service.on_tags_registered(&assigned).await;

        let mut disposables = Vec::new();
        let mut tasks = Vec::new();

        for binding in &bindings {
            match binding.role {
                TagBindingRole::Consumer => {
                    let (tx, mut rx) = tokio::sync::mpsc::channel::<tagbus_core::TagValue>(64);
                    let path = binding.path.clone();
                    let plugin_for_writer = plugin.clone();
                    tokio::spawn(async move {
                        while let Some(value) = rx.recv().await {
                            let mut guard = plugin_for_writer.lock().await;
                            guard.write_consumer_field(&path, &value);
                        }
                    });

                    let sub = self
                        .tag_service
                        .subscribe_tag(&binding.path, move |value| {
                            if tx.try_send(value).is_err() {
                                warn!("consumer field writer lagging; dropping update");
                            }
                        })
                        .await;
                    disposables.push(sub);
                }
                TagBindingRole::Producer => {
                    if let Some(interval_ms) = binding.auto_publish_interval_ms {
                        let plugin = plugin.clone();
                        let tag_service = self.tag_service.clone();
                        let path = binding.path.clone();
                        let instance_id = instance_id.to_string();
                        let task = tokio::spawn(async move {
                            let mut ticker =
                                tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
                            loop {
                                ticker.tick().await;
                                let value = {
                                    let guard = plugin.lock().await;
                                    guard.read_producer_field(&path)
                                };
                                if let Some(value) = value
                                    && let Err(err) = tag_service.set_tag(&path, &instance_id, value)
                                {
                                    warn!(%err, path, "auto-publish failed");
                                }
                            }
                        });
                        tasks.push(task);
                    }
                }
            }
        }

        Ok((disposables, tasks))
    }

    /// Places `instance_id` into `rack/slot_id`. Fails with `RackNotFound`,
    /// `SlotNotFound`, or `SlotOccupied` without mutating any state.
    pub async fn plug(&self, instance_id: &str, rack: &str, slot_id: i32) -> Result<(), HostError> {
        let record = self.plugin_record(instance_id)?;
        let rack_arc = self
            .rack(rack)
            .ok_or_else(|| HostError::RackNotFound(rack.to_string()))?;
        let slot = rack_arc
            .slot(slot_id)
            .ok_or_else(|| HostError::SlotNotFound {
                rack: rack.to_string(),
                slot: slot_id,
            })?;

        slot.try_occupy(instance_id)
            .map_err(|occupant| HostError::SlotOccupied {
                rack: rack.to_string(),
                slot: slot_id,
                occupant,
            })?;

        let slot_ref = SlotRef {
            rack: rack.to_string(),
            slot_id,
        };
        *record.current_slot.write() = Some(slot_ref.clone());
        record.context.set_current_slot(Some(slot_ref.clone()));

        let mut guard = record.plugin.lock().await;
        guard.on_plugged(slot_ref).await;
        Ok(())
    }

    /// Clears `instance_id`'s slot binding, if any. A no-op if it is not
    /// currently plugged.
    pub async fn unplug(&self, instance_id: &str) -> Result<(), HostError> {
        let record = self.plugin_record(instance_id)?;
        let slot_ref = record.current_slot.write().take();
        let Some(slot_ref) = slot_ref else {
            return Ok(());
        };

        {
            let mut guard = record.plugin.lock().await;
            guard.on_unplugged().await;
        }

        if let Some(rack) = self.rack(&slot_ref.rack)
            && let Some(slot) = rack.slot(slot_ref.slot_id)
        {
            slot.vacate();
        }
        record.context.set_current_slot(None);
        Ok(())
    }

    /// Unplugs (if plugged), disposes every auto-wire subscription and
    /// periodic task, cancels the run loop, and calls `Stop`. Waits up to
    /// five seconds for the run loop to join, logging a warning on timeout
    /// but proceeding regardless.
    pub async fn stop_plugin(&self, instance_id: &str) -> Result<(), HostError> {
        self.unplug(instance_id).await?;
        let record = self.plugin_record(instance_id)?;

        record.auto_wirings.lock().await.clear();
        for task in record.periodic_tasks.lock().await.drain(..) {
            task.abort();
        }

        record.run_loop_cancel.cancel();
        if let Some(run_loop) = record.run_loop.lock().await.take()
            && tokio::time::timeout(STOP_JOIN_DEADLINE, run_loop).await.is_err()
        {
            warn!(plugin = %instance_id, "run loop did not stop within the 5s deadline; proceeding");
        }

        {
            let mut guard = record.plugin.lock().await;
            guard.stop().await;
        }
        *record.state.write() = PluginState::Stopped;
        info!(plugin = %instance_id, "plugin stopped");
        Ok(())
    }

    /// Unplugs and stops every loaded plugin. Returns only after every
    /// plugin's `Stop` has been attempted, regardless of individual failures.
    pub async fn shutdown(&self) {
        let ids: Vec<String> = self.plugins.read().keys().cloned().collect();
        for id in ids {
            if let Err(err) = self.stop_plugin(&id).await {
                error!(plugin = %id, %err, "error stopping plugin during shutdown");
            }
        }
    }

    pub fn plugin_state(&self, instance_id: &str) -> Option<PluginState> {
        self.plugins
            .read()
            .get(instance_id)
            .map(|r| *r.state.read())
    }

    pub fn current_slot(&self, instance_id: &str) -> Option<SlotRef> {
        self.plugins
            .read()
            .get(instance_id)
            .and_then(|r| r.current_slot.read().clone())
    }

    fn plugin_record(&self, instance_id: &str) -> Result<Arc<PluginRecord>, HostError> {
        self.plugins
            .read()
            .get(instance_id)
            .cloned()
            .ok_or_else(|| HostError::UnknownInstance(instance_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tagbus_core::TagValue;

    use crate::plugin::Plugin;
    use crate::types::{TagBindingSpec, TagPlugin};

    /// A producer-only fixture: publishes a fixed temperature on a timer.
    #[derive(Default)]
    struct SensorSim {
        temperature: f64,
    }

    impl TagPlugin for SensorSim {
        fn tag_bindings(&self) -> Vec<TagBindingSpec> {
            vec![TagBindingSpec {
                path: "plant/line1/temperature".into(),
                role: TagBindingRole::Producer,
                auto_publish_interval_ms: Some(5),
            }]
        }

        fn write_consumer_field(&mut self, _path: &str, _value: &TagValue) -> bool {
            false
        }

        fn read_producer_field(&self, path: &str) -> Option<TagValue> {
            (path == "plant/line1/temperature").then_some(TagValue::Float(self.temperature))
        }
    }

    #[async_trait]
    impl Plugin for SensorSim {
        fn name(&self) -> &str {
            "sensor-sim"
        }

        fn run_interval_ms(&self) -> u64 {
            1000
        }
    }

    /// A consumer-only fixture: mirrors the last value it was handed.
    #[derive(Default)]
    struct AlarmWatcher {
        last_seen: Option<TagValue>,
    }

    impl TagPlugin for AlarmWatcher {
        fn tag_bindings(&self) -> Vec<TagBindingSpec> {
            vec![TagBindingSpec {
                path: "plant/line1/temperature".into(),
                role: TagBindingRole::Consumer,
                auto_publish_interval_ms: None,
            }]
        }

        fn write_consumer_field(&mut self, path: &str, value: &TagValue) -> bool {
            if path == "plant/line1/temperature" {
                self.last_seen = Some(value.clone());
                true
            } else {
                false
            }
        }

        fn read_producer_field(&self, _path: &str) -> Option<TagValue> {
            None
        }
    }

    #[async_trait]
    impl Plugin for AlarmWatcher {
        fn name(&self) -> &str {
            "alarm-watcher"
        }
    }

    fn rack_with_slot() -> Rack {
        Rack::new("Rack1").with_slot(1, "Slot1")
    }

    #[tokio::test]
    async fn plug_fails_against_an_unknown_rack() {
        let host = PluginHost::in_memory();
        host.load_plugin("sensor-sim", SensorSim::default())
            .await
            .unwrap();

        let err = host.plug("sensor-sim", "NoSuchRack", 1).await.unwrap_err();
        assert!(matches!(err, HostError::RackNotFound(name) if name == "NoSuchRack"));
    }

    #[tokio::test]
    async fn plug_fails_against_an_occupied_slot() {
        let host = PluginHost::in_memory();
        host.add_rack(rack_with_slot());
        host.load_plugin("sensor-sim", SensorSim::default())
            .await
            .unwrap();
        host.load_plugin("sensor-sim-2", SensorSim::default())
            .await
            .unwrap();

        host.plug("sensor-sim", "Rack1", 1).await.unwrap();
        let err = host.plug("sensor-sim-2", "Rack1", 1).await.unwrap_err();
        assert!(matches!(err, HostError::SlotOccupied { occupant, .. } if occupant == "sensor-sim"));
    }

    #[tokio::test]
    async fn unplug_vacates_the_slot_for_reuse() {
        let host = PluginHost::in_memory();
        host.add_rack(rack_with_slot());
        host.load_plugin("sensor-sim", SensorSim::default())
            .await
            .unwrap();
        host.load_plugin("sensor-sim-2", SensorSim::default())
            .await
            .unwrap();

        host.plug("sensor-sim", "Rack1", 1).await.unwrap();
        host.unplug("sensor-sim").await.unwrap();
        assert_eq!(host.current_slot("sensor-sim"), None);

        host.plug("sensor-sim-2", "Rack1", 1).await.unwrap();
        assert!(host.current_slot("sensor-sim-2").is_some());
    }

    #[tokio::test]
    async fn auto_wire_delivers_producer_values_to_a_consumer() {
        let host = PluginHost::in_memory();
        host.load_plugin(
            "sensor-sim",
            SensorSim {
                temperature: 42.0,
            },
        )
        .await
        .unwrap();
        host.load_plugin("alarm-watcher", AlarmWatcher::default())
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let last: f64 = host.tag_service.get_tag("plant/line1/temperature").await;
        assert_eq!(last, 42.0);
    }

    #[tokio::test]
    async fn stop_plugin_cancels_the_run_loop_and_marks_stopped() {
        let host = PluginHost::in_memory();
        host.load_plugin("sensor-sim", SensorSim::default())
            .await
            .unwrap();

        host.stop_plugin("sensor-sim").await.unwrap();
        assert_eq!(host.plugin_state("sensor-sim"), Some(PluginState::Stopped));
    }

    #[tokio::test]
    async fn shutdown_stops_every_loaded_plugin() {
        let host = PluginHost::in_memory();
        host.load_plugin("sensor-sim", SensorSim::default())
            .await
            .unwrap();
        host.load_plugin("alarm-watcher", AlarmWatcher::default())
            .await
            .unwrap();

        host.shutdown().await;
        assert_eq!(host.plugin_state("sensor-sim"), Some(PluginState::Stopped));
        assert_eq!(
            host.plugin_state("alarm-watcher"),
            Some(PluginState::Stopped)
        );
    }

    #[tokio::test]
    async fn unknown_instance_operations_return_unknown_instance() {
        let host = PluginHost::in_memory();
        let err = host.plug("ghost", "Rack1", 1).await.unwrap_err();
        assert!(matches!(err, HostError::UnknownInstance(id) if id == "ghost"));
    }
}
