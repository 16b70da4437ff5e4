//! Plugin readiness handshake
//!
//! Each plugin announces itself with `PLUGIN_READY` once its listeners are in
//! place. The host tracks announcements against the registry and broadcasts
//! `ALL_PLUGINS_READY` a single time when every registered plugin is ready.

use crate::bridge::{Bridge, WeakBridge};
use crate::bus::Subscription;
use crate::error::{BridgeError, Result};
use crate::registry::PluginRegistry;
use crate::router::Mode;
use lodestar_protocol::{AllPluginsReady, Envelope, PluginId, PluginReady, PluginReadyEvent};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Announce that `plugin` has finished wiring its listeners.
pub fn announce_ready(bridge: &Bridge, plugin: &PluginId) -> Result<()> {
    debug!(plugin = %plugin, "announcing ready");
    bridge.emit_event::<PluginReadyEvent>(&PluginReady {
        plugin_id: plugin.clone(),
    })
}

#[derive(Default)]
struct ReadyState {
    ready: BTreeSet<PluginId>,
    broadcast: bool,
}

struct Shared {
    state: Mutex<ReadyState>,
    registry: Arc<dyn PluginRegistry>,
    bridge: WeakBridge,
}

impl Shared {
    /// Broadcast if every registered plugin is ready and nobody was told yet.
    fn evaluate(&self) -> bool {
        let plugins = self.registry.plugins();
        {
            let mut state = self.state.lock();
            if state.broadcast || plugins.is_empty() {
                return false;
            }
            if !plugins.iter().all(|p| state.ready.contains(p)) {
                return false;
            }
            state.broadcast = true;
        }

        let Some(bridge) = self.bridge.upgrade() else {
            return false;
        };
        match bridge.emit_event::<AllPluginsReady>(&()) {
            Ok(()) => {
                info!(plugins = plugins.len(), "all plugins ready");
                true
            }
            Err(e) => {
                warn!(error = %e, "failed to broadcast readiness");
                self.state.lock().broadcast = false;
                false
            }
        }
    }
}

/// Host-side tracker for `PLUGIN_READY` announcements.
///
/// Stops listening when dropped.
pub struct ReadinessTracker {
    shared: Arc<Shared>,
    subscription: Subscription<Envelope>,
}

impl ReadinessTracker {
    pub fn attach(bridge: &Bridge, registry: Arc<dyn PluginRegistry>) -> Result<Self> {
        if bridge.mode() != Mode::Host {
            return Err(BridgeError::WrongMode {
                operation: "readiness tracking",
                mode: bridge.mode(),
            });
        }

        let shared = Arc::new(Shared {
            state: Mutex::new(ReadyState::default()),
            registry,
            bridge: bridge.downgrade(),
        });

        let listener = Arc::downgrade(&shared);
        let subscription = bridge.subscribe::<PluginReadyEvent, _>(move |ready: PluginReady| {
            let Some(shared) = listener.upgrade() else {
                return;
            };
            let fresh = shared.state.lock().ready.insert(ready.plugin_id.clone());
            debug!(plugin = %ready.plugin_id, fresh, "plugin ready");
            shared.evaluate();
        });

        Ok(Self {
            shared,
            subscription,
        })
    }

    /// Re-evaluate after the registry changed. Returns true if this call
    /// sent the broadcast.
    pub fn check(&self) -> bool {
        self.shared.evaluate()
    }

    pub fn is_ready(&self, plugin: &PluginId) -> bool {
        self.shared.state.lock().ready.contains(plugin)
    }

    pub fn ready_count(&self) -> usize {
        self.shared.state.lock().ready.len()
    }

    pub fn has_broadcast(&self) -> bool {
        self.shared.state.lock().broadcast
    }

    /// Drop a plugin's ready flag, e.g. after it was unmounted and reloaded.
    pub fn forget(&self, plugin: &PluginId) -> bool {
        self.shared.state.lock().ready.remove(plugin)
    }

    /// Clear all flags and allow another broadcast.
    pub fn reset(&self) {
        let mut state = self.shared.state.lock();
        state.ready.clear();
        state.broadcast = false;
    }
}

impl Drop for ReadinessTracker {
    fn drop(&mut self) {
        self.subscription.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;
    use crate::hub::InProcessHub;
    use crate::registry::PluginSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn host(plugins: &[&str]) -> (Bridge, Arc<PluginSet>, Arc<AtomicUsize>) {
        let hub = InProcessHub::new();
        let registry: Arc<PluginSet> = Arc::new(plugins.iter().copied().collect());
        let bridge = Bridge::host(
            Arc::new(hub.host_channel()),
            registry.clone(),
            BridgeConfig::default(),
        );
        let broadcasts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&broadcasts);
        bridge.subscribe::<AllPluginsReady, _>(move |()| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (bridge, registry, broadcasts)
    }

    #[test]
    fn test_broadcasts_once_all_registered_are_ready() {
        let (bridge, registry, broadcasts) = host(&["dice", "fog"]);
        let tracker = ReadinessTracker::attach(&bridge, registry).unwrap();

        announce_ready(&bridge, &"dice".into()).unwrap();
        assert_eq!(broadcasts.load(Ordering::SeqCst), 0);
        announce_ready(&bridge, &"fog".into()).unwrap();
        assert_eq!(broadcasts.load(Ordering::SeqCst), 1);

        announce_ready(&bridge, &"fog".into()).unwrap();
        assert_eq!(broadcasts.load(Ordering::SeqCst), 1);
        assert!(tracker.has_broadcast());
        assert_eq!(tracker.ready_count(), 2);
    }

    #[test]
    fn test_check_after_unmount() {
        let (bridge, registry, broadcasts) = host(&["dice", "stuck"]);
        let tracker = ReadinessTracker::attach(&bridge, registry.clone()).unwrap();

        announce_ready(&bridge, &"dice".into()).unwrap();
        assert!(!tracker.check());

        registry.unmount(&"stuck".into());
        assert!(tracker.check());
        assert_eq!(broadcasts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_registry_never_broadcasts() {
        let (bridge, registry, broadcasts) = host(&[]);
        let tracker = ReadinessTracker::attach(&bridge, registry).unwrap();
        assert!(!tracker.check());
        assert_eq!(broadcasts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reset_rearms_broadcast() {
        let (bridge, registry, broadcasts) = host(&["dice"]);
        let tracker = ReadinessTracker::attach(&bridge, registry).unwrap();

        announce_ready(&bridge, &"dice".into()).unwrap();
        tracker.reset();
        assert!(!tracker.is_ready(&"dice".into()));
        announce_ready(&bridge, &"dice".into()).unwrap();
        assert_eq!(broadcasts.load(Ordering::SeqCst), 2);

        assert!(tracker.forget(&"dice".into()));
        assert!(!tracker.forget(&"dice".into()));
    }

    #[test]
    fn test_drop_stops_tracking() {
        let (bridge, registry, broadcasts) = host(&["dice"]);
        drop(ReadinessTracker::attach(&bridge, registry).unwrap());
        announce_ready(&bridge, &"dice".into()).unwrap();
        assert_eq!(broadcasts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_plugin_mode_rejected() {
        let hub = InProcessHub::new();
        let plugin = Bridge::plugin(Arc::new(hub.plugin_channel("dice")), BridgeConfig::default());
        let err = ReadinessTracker::attach(&plugin, Arc::new(PluginSet::new())).err().unwrap();
        assert!(matches!(err, BridgeError::WrongMode { mode: Mode::Plugin, .. }));
    }
}
