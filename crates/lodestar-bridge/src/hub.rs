//! In-process transport connecting one host and any number of plugins.
//!
//! Messages are delivered synchronously on the sender's stack to every
//! receiver registered on the destination endpoint when `send` is called.
//! Sending to an endpoint nobody listens on succeeds and delivers nothing,
//! the same way posting to an unloaded frame does.

use crate::channel::{Channel, ChannelError, InboundFn, ReceiverId, Target};
use lodestar_protocol::PluginId;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// One side of the hub.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Host,
    Plugin(PluginId),
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Host => f.write_str("host"),
            Endpoint::Plugin(id) => write!(f, "plugin:{id}"),
        }
    }
}

#[derive(Default)]
struct HubState {
    receivers: HashMap<Endpoint, Vec<(ReceiverId, InboundFn)>>,
    delivered: HashMap<Endpoint, usize>,
    next_id: u64,
}

/// Shared switchboard. Clones refer to the same hub.
#[derive(Clone, Default)]
pub struct InProcessHub {
    state: Arc<Mutex<HubState>>,
}

impl InProcessHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel for the host side.
    pub fn host_channel(&self) -> HubChannel {
        HubChannel {
            hub: self.clone(),
            endpoint: Endpoint::Host,
        }
    }

    /// Channel for the plugin mounted as `id`.
    pub fn plugin_channel(&self, id: impl Into<PluginId>) -> HubChannel {
        HubChannel {
            hub: self.clone(),
            endpoint: Endpoint::Plugin(id.into()),
        }
    }

    /// Number of inbound listeners installed on an endpoint
    pub fn receiver_count(&self, endpoint: &Endpoint) -> usize {
        self.state
            .lock()
            .receivers
            .get(endpoint)
            .map_or(0, Vec::len)
    }

    /// Number of messages that reached at least one receiver on an endpoint
    pub fn delivered_to(&self, endpoint: &Endpoint) -> usize {
        self.state.lock().delivered.get(endpoint).copied().unwrap_or(0)
    }

    fn deliver(&self, destination: Endpoint, message: Value) {
        let receivers: Vec<InboundFn> = {
            let mut state = self.state.lock();
            let receivers: Vec<InboundFn> = state
                .receivers
                .get(&destination)
                .map(|list| list.iter().map(|(_, f)| Arc::clone(f)).collect())
                .unwrap_or_default();
            if !receivers.is_empty() {
                *state.delivered.entry(destination.clone()).or_default() += 1;
            }
            receivers
        };

        if receivers.is_empty() {
            trace!(%destination, "no receiver on endpoint, message dropped");
        }
        for receiver in receivers {
            receiver(message.clone());
        }
    }
}

impl fmt::Debug for InProcessHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InProcessHub")
            .field("endpoints", &state.receivers.len())
            .finish()
    }
}

/// A [`Channel`] bound to one hub endpoint.
#[derive(Debug, Clone)]
pub struct HubChannel {
    hub: InProcessHub,
    endpoint: Endpoint,
}

impl HubChannel {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl Channel for HubChannel {
    fn send(&self, message: Value, target: &Target) -> Result<(), ChannelError> {
        let destination = match (&self.endpoint, target) {
            (Endpoint::Plugin(_), Target::Parent) => Endpoint::Host,
            (Endpoint::Host, Target::Plugin(id)) => Endpoint::Plugin(id.clone()),
            _ => {
                return Err(ChannelError::Unroutable {
                    target: target.clone(),
                })
            }
        };
        self.hub.deliver(destination, message);
        Ok(())
    }

    fn on_receive(&self, callback: InboundFn) -> ReceiverId {
        let mut state = self.hub.state.lock();
        state.next_id += 1;
        let id = ReceiverId::new(state.next_id);
        state
            .receivers
            .entry(self.endpoint.clone())
            .or_default()
            .push((id, callback));
        id
    }

    fn remove_receiver(&self, id: ReceiverId) {
        let mut state = self.hub.state.lock();
        if let Some(list) = state.receivers.get_mut(&self.endpoint) {
            list.retain(|(rid, _)| *rid != id);
            if list.is_empty() {
                state.receivers.remove(&self.endpoint);
            }
        }
    }
}
