//! The set of plugin contexts a host fans out to.
//!
//! Membership is owned by whoever mounts plugin surfaces; the bridge only
//! reads it at fan-out time.

use lodestar_protocol::PluginId;
use parking_lot::RwLock;

/// Source of the plugin contexts currently available for fan-out.
pub trait PluginRegistry: Send + Sync {
    /// Currently mounted plugins, in a stable order.
    fn plugins(&self) -> Vec<PluginId>;
}

/// Mutable registry ordered by mount time.
///
/// # Example
///
/// ```
/// use lodestar_bridge::{PluginRegistry, PluginSet};
///
/// let plugins = PluginSet::new();
/// plugins.mount("initiative");
/// plugins.mount("dice");
/// assert_eq!(plugins.plugins().len(), 2);
///
/// plugins.unmount(&"initiative".into());
/// assert!(!plugins.contains(&"initiative".into()));
/// ```
#[derive(Debug, Default)]
pub struct PluginSet {
    mounted: RwLock<Vec<PluginId>>,
}

impl PluginSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. Returns false if it was already mounted.
    pub fn mount(&self, id: impl Into<PluginId>) -> bool {
        let id = id.into();
        let mut mounted = self.mounted.write();
        if mounted.contains(&id) {
            return false;
        }
        mounted.push(id);
        true
    }

    /// Remove a plugin. Returns false if it was not mounted.
    pub fn unmount(&self, id: &PluginId) -> bool {
        let mut mounted = self.mounted.write();
        let before = mounted.len();
        mounted.retain(|m| m != id);
        mounted.len() < before
    }

    pub fn contains(&self, id: &PluginId) -> bool {
        self.mounted.read().contains(id)
    }

    pub fn len(&self) -> usize {
        self.mounted.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounted.read().is_empty()
    }
}

impl<I: Into<PluginId>> FromIterator<I> for PluginSet {
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        let set = PluginSet::new();
        for id in iter {
            set.mount(id);
        }
        set
    }
}

impl PluginRegistry for PluginSet {
    fn plugins(&self) -> Vec<PluginId> {
        self.mounted.read().clone()
    }
}
