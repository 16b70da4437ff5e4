//! Raw cross-context transport.
//!
//! A [`Channel`] moves JSON values between contexts and knows nothing about
//! envelopes, correlation or modes. Anything that can deliver a message to a
//! parent or to a specific plugin can back a bridge: an in-process hub, a
//! socket, a cross-window message port.

use lodestar_protocol::PluginId;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Callback invoked for every raw inbound message.
pub type InboundFn = Arc<dyn Fn(Value) + Send + Sync>;

/// Destination of an outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// The single context that embeds this plugin
    Parent,
    /// One mounted plugin context
    Plugin(PluginId),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Parent => f.write_str("parent"),
            Target::Plugin(id) => write!(f, "plugin:{id}"),
        }
    }
}

/// Registration handle returned by [`Channel::on_receive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiverId(u64);

impl ReceiverId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    /// This end of the channel cannot address the target
    #[error("cannot route message to {target}")]
    Unroutable { target: Target },

    /// The underlying transport is gone
    #[error("channel closed")]
    Closed,
}

/// Minimal transport interface.
///
/// Delivery is best-effort: `send` succeeding means the message was handed to
/// the transport, not that anyone received it.
pub trait Channel: Send + Sync {
    /// Hand a message to the transport for delivery to `target`.
    fn send(&self, message: Value, target: &Target) -> Result<(), ChannelError>;

    /// Install the global inbound listener.
    fn on_receive(&self, callback: InboundFn) -> ReceiverId;

    /// Remove an inbound listener. Unknown ids are ignored.
    fn remove_receiver(&self, id: ReceiverId);
}
