//! Runtime orchestration: builds the backplane named by `messaging`, wires
//! up a [`PluginHost`], registers configured racks, optionally serves the
//! gRPC remote backplane, and runs until a shutdown signal arrives.

use std::net::SocketAddr;
use std::sync::Arc;

use tagbus_core::{TagBackplane, TagRegistrar};
use tagbus_framework::{Plugin, PluginHost, Rack};
use tagbus_transport::TagBusService;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{RackConfig, TagbusConfig, TransportKind};
use crate::error::{RuntimeError, RuntimeResult};

/// Statistics about a running [`TagbusRuntime`].
#[derive(Debug, Clone)]
pub struct RuntimeStats {
    pub container_name: String,
    pub rack_count: usize,
    pub remote_serving: bool,
}

impl std::fmt::Display for RuntimeStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "container '{}': {} rack(s), remote serving: {}",
            self.container_name, self.rack_count, self.remote_serving
        )
    }
}

/// The main DataConnect runtime that owns a [`PluginHost`] and, when
/// `messaging.transport` is `grpc`, a gRPC server task exposing the host's
/// in-memory backplane to other processes (§6 - "the remote server is a
/// network facade in front of an in-memory backplane instance").
pub struct TagbusRuntime {
    config: TagbusConfig,
    host: Arc<PluginHost>,
    remote_server: Option<JoinHandle<()>>,
}

impl TagbusRuntime {
    /// Builds a runtime from `config`. When `messaging.transport` is
    /// `InMemory`, the host's backplane never leaves the process. When it is
    /// `Grpc`, the host still runs against its own [`InMemoryBackplane`] -
    /// only `start_serving` (called from [`Self::run`]) binds the network
    /// listener, so construction itself cannot fail on a bind error.
    ///
    /// The local registrar cannot realistically fail `RegisterTags`, so
    /// default-tag registration errors are logged rather than propagated,
    /// keeping this an infallible constructor.
    pub async fn new(config: TagbusConfig) -> Self {
        let host = Arc::new(PluginHost::in_memory());
        for rack in &config.racks {
            host.add_rack(Self::build_rack(rack));
        }
        if let Err(err) = Self::register_default_tags(&host, &config).await {
            error!(%err, "failed to register default tags");
        }
        Self {
            config,
            host,
            remote_server: None,
        }
    }

    /// Builds a runtime whose host's backplane is a [`tagbus_transport::RemoteBackplane`]
    /// connected to another container's `messaging` endpoint, rather than an
    /// in-process `InMemoryBackplane`. This is the client-side counterpart to
    /// [`Self::new`]'s server mode: a plugin container with no racks/tags of
    /// its own mirroring of another container's bus.
    pub async fn connect_remote(config: TagbusConfig) -> RuntimeResult<Self> {
        let (host_str, port) = config.messaging.effective_address();
        let endpoint = format!("http://{host_str}:{port}");
        let backplane = Arc::new(
            tagbus_transport::RemoteBackplane::connect(endpoint.clone())
                .await
                .map_err(|err| RuntimeError::ConnectFailure {
                    addr: endpoint,
                    source: err,
                })?,
        );
        let registrar: Arc<dyn TagRegistrar> = backplane.clone();
        let tag_backplane: Arc<dyn TagBackplane> = backplane;

        let host = Arc::new(PluginHost::with_remote_registrar(tag_backplane, registrar));
        for rack in &config.racks {
            host.add_rack(Self::build_rack(rack));
        }
        Self::register_default_tags(&host, &config).await?;
        Ok(Self {
            config,
            host,
            remote_server: None,
        })
    }

    /// Pre-registers `tags.defaultTags` under a synthetic `"system"` owner,
    /// so paths the configuration names are resolvable (and subscribable)
    /// before any plugin claims them as producer or consumer. A no-op when
    /// `tags.enabled` is false. Goes through [`PluginHost::register_tags`]
    /// rather than the local registry directly, so a remote-backed host's
    /// default tags are registered with the server too.
    async fn register_default_tags(host: &PluginHost, config: &TagbusConfig) -> RuntimeResult<()> {
        if !config.tags.enabled || config.tags.default_tags.is_empty() {
            return Ok(());
        }
        let items = config
            .tags
            .default_tags
            .iter()
            .map(|tag| tagbus_core::TagRegistrationItem {
                path: tag.path.clone(),
                role: tag.role,
                source_override: None,
            })
            .collect();
        host.register_tags("system", items).await?;
        Ok(())
    }

    fn build_rack(config: &RackConfig) -> Rack {
        let mut rack = Rack::new(config.name.clone());
        for slot in &config.slots {
            let name = slot.name.clone().unwrap_or_else(|| slot.id.to_string());
            rack = rack.with_slot(slot.id, name);
        }
        rack
    }

    pub fn host(&self) -> &Arc<PluginHost> {
        &self.host
    }

    pub fn config(&self) -> &TagbusConfig {
        &self.config
    }

    /// Loads a plugin into the host. See [`PluginHost::load_plugin`].
    pub async fn load_plugin(
        &self,
        instance_id: impl Into<String>,
        plugin: impl Plugin + 'static,
    ) -> RuntimeResult<()> {
        self.host.load_plugin(instance_id, plugin).await?;
        Ok(())
    }

    /// Places a loaded plugin into a rack/slot. See [`PluginHost::plug`].
    pub async fn plug(&self, instance_id: &str, rack: &str, slot_id: i32) -> RuntimeResult<()> {
        self.host.plug(instance_id, rack, slot_id).await?;
        Ok(())
    }

    /// If `messaging.enabled` and `messaging.transport` is `Grpc`, binds the
    /// gRPC listener and spawns the serve loop. A bind failure is detected
    /// eagerly (before spawning) so it surfaces as `RuntimeError::BindFailure`
    /// rather than a silently-dead background task.
    async fn start_serving(&mut self) -> RuntimeResult<()> {
        if !self.config.messaging.enabled || self.config.messaging.transport != TransportKind::Grpc
        {
            return Ok(());
        }

        let (host_str, port) = self.config.messaging.effective_address();
        let bind_target = format!("{host_str}:{port}");
        let addr: SocketAddr = bind_target.parse().map_err(|err: std::net::AddrParseError| {
            RuntimeError::BindFailure {
                addr: bind_target.clone(),
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, err),
            }
        })?;

        let listener =
            tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|err| RuntimeError::BindFailure {
                    addr: addr.to_string(),
                    source: err,
                })?;
        let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);

        let registry = self.host.tag_registry().clone();
        let backplane: Arc<dyn TagBackplane> = self.host.backplane();
        info!(%addr, "serving remote backplane");

        let handle = tokio::spawn(async move {
            if let Err(err) = TagBusService::serve_incoming(registry, backplane, incoming).await {
                error!(%err, "remote backplane server exited with an error");
            }
        });
        self.remote_server = Some(handle);
        Ok(())
    }

    /// Runs until Ctrl+C or SIGTERM, then shuts every plugin down.
    pub async fn run(mut self) -> RuntimeResult<()> {
        self.start_serving().await?;
        info!("tagbus runtime is now running; press Ctrl+C to stop");
        Self::wait_for_shutdown().await;
        self.shutdown().await;
        Ok(())
    }

    /// Runs until `shutdown` resolves, then shuts every plugin down. Useful
    /// for tests and embedders that want their own termination signal.
    pub async fn run_until<F>(mut self, shutdown: F) -> RuntimeResult<()>
    where
        F: std::future::Future<Output = ()>,
    {
        self.start_serving().await?;
        shutdown.await;
        self.shutdown().await;
        Ok(())
    }

    async fn wait_for_shutdown() {
        #[cfg(unix)]
        {
            let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(sigterm) => sigterm,
                Err(err) => {
                    warn!(%err, "failed to register SIGTERM handler; watching Ctrl+C only");
                    let _ = signal::ctrl_c().await;
                    return;
                }
            };

            tokio::select! {
                _ = signal::ctrl_c() => info!("received Ctrl+C, shutting down"),
                _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
            }
        }

        #[cfg(not(unix))]
        {
            if signal::ctrl_c().await.is_ok() {
                info!("received Ctrl+C, shutting down");
            }
        }
    }

    /// Stops every loaded plugin and, if running, the gRPC server task.
    pub async fn shutdown(&mut self) {
        self.host.shutdown().await;
        if let Some(handle) = self.remote_server.take() {
            handle.abort();
        }
        info!("tagbus runtime stopped");
    }

    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            container_name: self.config.container.name.clone(),
            rack_count: self.config.racks.len(),
            remote_serving: self.remote_server.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RackConfig, SlotConfig};

    #[tokio::test]
    async fn racks_from_config_are_registered_on_the_host() {
        let mut config = TagbusConfig::default();
        config.racks.push(RackConfig {
            name: "Rack1".into(),
            slot_count: None,
            slots: vec![SlotConfig {
                id: 1,
                name: Some("SensorSlot".into()),
                parameters: Default::default(),
            }],
        });

        let runtime = TagbusRuntime::new(config).await;
        let rack = runtime.host().rack("Rack1").expect("rack registered");
        assert!(rack.slot(1).is_some());
    }

    #[tokio::test]
    async fn run_until_returns_once_the_shutdown_future_resolves() {
        let runtime = TagbusRuntime::new(TagbusConfig::default()).await;
        runtime.run_until(async {}).await.unwrap();
    }

    #[test]
    fn stats_reports_remote_serving_false_before_run() {
        let runtime = TagbusRuntime::new(TagbusConfig::default()).await;
        assert!(!runtime.stats().remote_serving);
    }

    #[tokio::test]
    async fn grpc_messaging_binds_and_reports_remote_serving() {
        let mut config = TagbusConfig::default();
        config.messaging.enabled = true;
        config.messaging.transport = TransportKind::Grpc;
        config.messaging.host = "127.0.0.1".into();
        config.messaging.port = 0; // let the OS pick a free port

        let mut runtime = TagbusRuntime::new(config).await;
        runtime.start_serving().await.unwrap();
        assert!(runtime.stats().remote_serving);
        runtime.shutdown().await;
    }

    #[tokio::test]
    async fn in_memory_messaging_never_binds_a_listener() {
        let config = TagbusConfig::default(); // messaging disabled by default
        let mut runtime = TagbusRuntime::new(config).await;
        runtime.start_serving().await.unwrap();
        assert!(!runtime.stats().remote_serving);
    }

    #[tokio::test]
    async fn bind_failure_surfaces_as_runtime_error() {
        let blocker = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = blocker.local_addr().unwrap().port();

        let mut config = TagbusConfig::default();
        config.messaging.enabled = true;
        config.messaging.transport = TransportKind::Grpc;
        config.messaging.host = "127.0.0.1".into();
        config.messaging.port = port;

        let mut runtime = TagbusRuntime::new(config).await;
        let err = runtime.start_serving().await.unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(matches!(err, RuntimeError::BindFailure { .. }));
    }
}
