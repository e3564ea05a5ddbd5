//! Configuration validation utilities.
//!
//! Only structural shape is validated here - non-negative counts, unique
//! names/ids within a document. Cross-section references (a plugin's
//! `configuration.rack`/`slotId` resolving to a real rack/slot) are *not*
//! validated at parse time: racks are registered with the host before
//! plugins attempt to plug, so a dangling reference only ever surfaces as
//! a `RackNotFound`/`SlotNotFound` plug-time error (§6).

use std::collections::HashSet;

use super::error::{ConfigError, ConfigResult};
use super::schema::{RackConfig, TagbusConfig};

/// Validates the entire configuration document.
pub fn validate_config(config: &TagbusConfig) -> ConfigResult<()> {
    validate_racks(&config.racks)?;
    validate_plugins(config)?;
    validate_messaging(config)?;
    Ok(())
}

fn validate_racks(racks: &[RackConfig]) -> ConfigResult<()> {
    let mut seen_racks = HashSet::new();
    for rack in racks {
        if rack.name.trim().is_empty() {
            return Err(ConfigError::missing_field("racks[].name"));
        }
        if !seen_racks.insert(&rack.name) {
            return Err(ConfigError::DuplicateRackName(rack.name.clone()));
        }

        let mut seen_slots = HashSet::new();
        for slot in &rack.slots {
            if !seen_slots.insert(slot.id) {
                return Err(ConfigError::DuplicateSlotId {
                    rack: rack.name.clone(),
                    slot: slot.id,
                });
            }
        }
    }
    Ok(())
}

fn validate_plugins(config: &TagbusConfig) -> ConfigResult<()> {
    let mut seen_names = HashSet::new();
    for plugin in &config.plugins {
        if plugin.name.trim().is_empty() {
            return Err(ConfigError::missing_field("plugins[].name"));
        }
        if !seen_names.insert(&plugin.name) {
            return Err(ConfigError::DuplicatePluginName(plugin.name.clone()));
        }
        if let Some(slot_id) = plugin.configuration.slot_id
            && slot_id < 0
        {
            return Err(ConfigError::validation(format!(
                "plugin '{}' has a negative slotId",
                plugin.name
            )));
        }
    }
    Ok(())
}

fn validate_messaging(config: &TagbusConfig) -> ConfigResult<()> {
    if config.messaging.enabled && config.messaging.port == 0 {
        return Err(ConfigError::InvalidPort(0));
    }
    Ok(())
}
