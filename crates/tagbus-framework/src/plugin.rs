//! The plugin trait hosted plugins implement.
//!
//! Rust has no runtime reflection, so the annotation-driven wiring the design
//! notes describe is split in two: `#[derive(TagPlugin)]` (in `tagbus-macros`)
//! generates the explicit binding listing, and this trait carries the
//! lifecycle hooks the host drives in order.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::PluginContext;
use crate::error::HostError;
use crate::types::{SlotRef, TagPlugin};

/// A hosted plugin instance.
///
/// Every method has a no-op default so a plugin only needs to override the
/// hooks it cares about. Combine with `#[derive(TagPlugin)]` to declare tag
/// bindings, or implement [`TagPlugin`] manually (or not at all, via
/// [`crate::types::NoBindings`]-style empty impls) for a pure service
/// provider with nothing to wire.
#[async_trait]
pub trait Plugin: TagPlugin + Send {
    /// Display name. Distinct from the host-assigned `instance_id`.
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        "0.1.0"
    }

    /// How often the host's run loop calls [`Plugin::execute`], once started.
    fn run_interval_ms(&self) -> u64 {
        1000
    }

    /// Called once, immediately after construction. The plugin must not
    /// assume tag handles are allocated yet - that happens in the auto-wire
    /// step that follows.
    async fn initialize(&mut self, _ctx: Arc<PluginContext>) -> Result<(), HostError> {
        Ok(())
    }

    /// Called once after auto-wiring completes. The host always spins its
    /// own background loop calling [`Plugin::execute`] afterward; plugins
    /// that need a different schedule spawn their own tasks here and leave
    /// `execute` a no-op.
    async fn start(&mut self) -> Result<(), HostError> {
        Ok(())
    }

    /// Invoked every `run_interval_ms` while the plugin is started. Errors
    /// are logged and never stop the loop.
    async fn execute(&mut self) -> Result<(), HostError> {
        Ok(())
    }

    /// Called after the host successfully places this plugin into a slot.
    async fn on_plugged(&mut self, _slot: SlotRef) {}

    /// Called before the host clears this plugin's slot binding.
    async fn on_unplugged(&mut self) {}

    /// Called once at shutdown, after auto-wire disposables have been torn
    /// down and the run loop cancelled.
    async fn stop(&mut self) {}
}
