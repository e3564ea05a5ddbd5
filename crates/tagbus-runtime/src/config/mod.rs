//! Configuration module for the DataConnect runtime.
//!
//! Provides YAML-based configuration loading and validation for the
//! container, its racks/slots, plugin placements, default tags, and the
//! messaging (gRPC) transport.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, load_config, load_config_from_file};
pub use schema::{
    ContainerConfig, DefaultTagConfig, LogLevel, MessagingConfig, PluginConfig, PluginPlacement,
    RackConfig, SlotConfig, TagbusConfig, TagsConfig, TransportKind,
};
pub use validation::validate_config;
