//! Configuration schema for the DataConnect runtime.
//!
//! Mirrors the five top-level sections of the configuration document:
//! `container`, `plugins`, `racks`, `tags`, `messaging`.
//!
//! # Example Configuration (YAML)
//!
//! ```yaml
//! container:
//!   name: plant-floor-1
//!   version: "1.0.0"
//!   scanIntervalMs: 1000
//!   maxConcurrentCycles: 4
//!   logLevel: info
//!
//! racks:
//!   - name: Rack1
//!     slots:
//!       - { id: 1, name: SensorSlot }
//!       - { id: 2, name: LogicSlot }
//!
//! plugins:
//!   - name: sensor-sim
//!     path: sensor_sim.so
//!     enabled: true
//!     priority: 0
//!     configuration:
//!       rack: Rack1
//!       slotId: 1
//!
//! tags:
//!   enabled: true
//!   persistToFile: false
//!   persistencePath: null
//!   defaultTags: []
//!
//! messaging:
//!   enabled: false
//!   transport: inmemory
//!   host: 0.0.0.0
//!   port: 50051
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration document for a DataConnect container process.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TagbusConfig {
    pub container: ContainerConfig,
    pub plugins: Vec<PluginConfig>,
    pub racks: Vec<RackConfig>,
    pub tags: TagsConfig,
    pub messaging: MessagingConfig,
}

// =============================================================================
// container
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContainerConfig {
    pub name: String,
    pub version: String,
    pub scan_interval_ms: u64,
    pub max_concurrent_cycles: u32,
    pub log_level: LogLevel,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            name: "tagbus".to_string(),
            version: "0.1.0".to_string(),
            scan_interval_ms: default_scan_interval(),
            max_concurrent_cycles: default_max_concurrent_cycles(),
            log_level: LogLevel::default(),
        }
    }
}

fn default_scan_interval() -> u64 {
    1000
}

fn default_max_concurrent_cycles() -> u32 {
    4
}

/// Log level, read from `container.logLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// plugins
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    pub name: String,
    pub path: String,
    pub enabled: bool,
    pub priority: i32,
    pub configuration: PluginPlacement,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            path: String::new(),
            enabled: true,
            priority: 0,
            configuration: PluginPlacement::default(),
        }
    }
}

/// The slot-placement portion of a plugin's `configuration` block. Extra
/// adapter/plugin-specific keys are preserved in `extra` rather than
/// rejected, since plugin configuration schemas are not known to the host.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PluginPlacement {
    pub rack: Option<String>,
    pub slot_id: Option<i32>,
    pub slot_name: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

// =============================================================================
// racks
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RackConfig {
    pub name: String,
    #[serde(rename = "slotCount")]
    pub slot_count: Option<u32>,
    #[serde(default)]
    pub slots: Vec<SlotConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SlotConfig {
    pub id: i32,
    pub name: Option<String>,
    #[serde(default)]
    pub parameters: HashMap<String, serde_json::Value>,
}

// =============================================================================
// tags
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TagsConfig {
    pub enabled: bool,
    /// Accepted for schema completeness; persistence across restarts is a
    /// non-goal (§1), so a `true` value here is not honored by the runtime.
    pub persist_to_file: bool,
    pub persistence_path: Option<String>,
    pub default_tags: Vec<DefaultTagConfig>,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            persist_to_file: false,
            persistence_path: None,
            default_tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultTagConfig {
    pub path: String,
    pub role: tagbus_core::TagRole,
}

// =============================================================================
// messaging
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessagingConfig {
    pub enabled: bool,
    pub transport: TransportKind,
    pub host: String,
    pub port: u16,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            transport: TransportKind::InMemory,
            host: "127.0.0.1".to_string(),
            port: 50051,
        }
    }
}

impl MessagingConfig {
    /// Resolves the bind/connect address, env wins over the config file per
    /// §6: `TAGBUS_HOST`/`TAGBUS_PORT` override `host`/`port` when set.
    pub fn effective_address(&self) -> (String, u16) {
        let host = std::env::var("TAGBUS_HOST").unwrap_or_else(|_| self.host.clone());
        let port = std::env::var("TAGBUS_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(self.port);
        (host, port)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    InMemory,
    Grpc,
}
