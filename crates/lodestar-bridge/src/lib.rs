//! Message bridge between a host context and sandboxed plugin contexts
//!
//! Both sides speak the same protocol over a [`Channel`]:
//!
//! - **Events** are fire-and-forget. The host dispatches them locally and fans
//!   them out to every registered plugin; a plugin sends them to its parent.
//! - **Requests** carry a fresh correlation id and resolve when the matching
//!   `"{command}/RESPONSE_{id}"` event arrives, or fail after a timeout.
//!
//! The [`facade`] module wraps the typed catalog from [`lodestar_protocol`]
//! into small per-area APIs.

mod bridge;
mod bus;
mod channel;
mod config;
mod error;
pub mod facade;
mod hub;
mod pending;
mod readiness;
mod registry;
mod router;

pub use bridge::{Bridge, WeakBridge};
pub use bus::{EventBus, Listener, ListenerId, Subscription};
pub use channel::{Channel, ChannelError, InboundFn, ReceiverId, Target};
pub use config::{BridgeConfig, ConfigError, DEFAULT_REQUEST_TIMEOUT_MS, ENV_REQUEST_TIMEOUT_MS};
pub use error::{BridgeError, Result};
pub use facade::{CameraApi, GridApi, ToolApi};
pub use hub::{Endpoint, HubChannel, InProcessHub};
pub use readiness::{announce_ready, ReadinessTracker};
pub use registry::{PluginRegistry, PluginSet};
pub use router::Mode;

// Re-export so callers need only one dependency
pub use lodestar_protocol as protocol;
