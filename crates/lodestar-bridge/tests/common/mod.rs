//! Common fixtures for bridge integration tests.

#![allow(dead_code)]

use lodestar_bridge::{Bridge, BridgeConfig, InProcessHub, PluginSet};
use lodestar_protocol::Envelope;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A host and its mounted plugins, all wired through one hub.
pub struct Scene {
    pub hub: InProcessHub,
    pub registry: Arc<PluginSet>,
    pub host: Bridge,
    pub plugins: Vec<Bridge>,
}

impl Scene {
    pub fn new(plugin_ids: &[&str]) -> Self {
        Self::with_config(plugin_ids, BridgeConfig::default())
    }

    pub fn with_config(plugin_ids: &[&str], config: BridgeConfig) -> Self {
        let hub = InProcessHub::new();
        let registry: Arc<PluginSet> = Arc::new(plugin_ids.iter().copied().collect());
        let host = Bridge::host(Arc::new(hub.host_channel()), registry.clone(), config.clone());
        let plugins = plugin_ids
            .iter()
            .map(|id| Bridge::plugin(Arc::new(hub.plugin_channel(*id)), config.clone()))
            .collect();
        Self {
            hub,
            registry,
            host,
            plugins,
        }
    }

    pub fn plugin(&self, index: usize) -> &Bridge {
        &self.plugins[index]
    }
}

/// Listener that counts invocations.
pub fn counter() -> (Arc<AtomicUsize>, impl Fn(&Envelope) + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    (count, move |_: &Envelope| {
        c.fetch_add(1, Ordering::SeqCst);
    })
}

pub fn count(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
