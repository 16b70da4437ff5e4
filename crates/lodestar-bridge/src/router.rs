//! Routing policy per operating mode.
//!
//! | | Host | Plugin |
//! |---|---|---|
//! | outbound request | local bus, then fan-out once answered | parent |
//! | outbound event | local bus, then fan-out | parent |
//! | inbound message | local bus | local bus |
//!
//! The mode is fixed when the bridge is built.

use crate::bus::EventBus;
use crate::channel::{Channel, Target};
use crate::error::Result;
use crate::registry::PluginRegistry;
use lodestar_protocol::Envelope;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Which side of the bridge this context is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Owns canonical state and fans out to plugins
    Host,
    /// Sandboxed context that talks only to its parent
    Plugin,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Host => "host",
            Mode::Plugin => "plugin",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "host" => Ok(Mode::Host),
            "plugin" => Ok(Mode::Plugin),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

pub(crate) struct Router {
    mode: Mode,
    channel: Arc<dyn Channel>,
    registry: Option<Arc<dyn PluginRegistry>>,
}

impl Router {
    pub(crate) fn host(channel: Arc<dyn Channel>, registry: Arc<dyn PluginRegistry>) -> Self {
        Self {
            mode: Mode::Host,
            channel,
            registry: Some(registry),
        }
    }

    pub(crate) fn plugin(channel: Arc<dyn Channel>) -> Self {
        Self {
            mode: Mode::Plugin,
            channel,
            registry: None,
        }
    }

    pub(crate) fn mode(&self) -> Mode {
        self.mode
    }

    pub(crate) fn channel(&self) -> &Arc<dyn Channel> {
        &self.channel
    }

    /// First leg of a request: local handlers in host mode, the parent otherwise.
    pub(crate) fn route_request(&self, envelope: &Envelope, bus: &EventBus<Envelope>) -> Result<()> {
        match self.mode {
            Mode::Host => {
                let handled = bus.emit_local(&envelope.event, envelope);
                if handled == 0 {
                    debug!(command = %envelope.event, "no local handler for request");
                }
                Ok(())
            }
            Mode::Plugin => self.send_to_parent(envelope),
        }
    }

    /// Called once a host request has its answer.
    pub(crate) fn complete_request(&self, command: &str, payload: Value) {
        if self.mode == Mode::Host {
            self.fan_out(&Envelope::event(command, payload));
        }
    }

    pub(crate) fn route_event(&self, envelope: &Envelope, bus: &EventBus<Envelope>) -> Result<()> {
        match self.mode {
            Mode::Host => {
                bus.emit_local(&envelope.event, envelope);
                self.fan_out(envelope);
                Ok(())
            }
            Mode::Plugin => self.send_to_parent(envelope),
        }
    }

    /// Dispatch a raw inbound message. Non-envelopes are dropped.
    pub(crate) fn route_inbound(&self, message: &Value, bus: &EventBus<Envelope>) {
        let Some(envelope) = Envelope::from_wire(message) else {
            trace!(mode = %self.mode, "discarding non-protocol message");
            return;
        };
        let invoked = bus.emit_local(&envelope.event, &envelope);
        trace!(
            mode = %self.mode,
            event = %envelope.event,
            response = envelope.is_response(),
            invoked,
            "inbound envelope dispatched"
        );
    }

    /// Send to every registered plugin. Returns how many sends succeeded.
    pub(crate) fn fan_out(&self, envelope: &Envelope) -> usize {
        let Some(registry) = &self.registry else {
            return 0;
        };
        let plugins = registry.plugins();
        if plugins.is_empty() {
            return 0;
        }

        let wire = envelope.to_wire();
        let mut delivered = 0;
        for plugin in plugins {
            let target = Target::Plugin(plugin);
            match self.channel.send(wire.clone(), &target) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(event = %envelope.event, %target, error = %e, "fan-out delivery failed"),
            }
        }
        debug!(event = %envelope.event, delivered, "fanned out");
        delivered
    }

    fn send_to_parent(&self, envelope: &Envelope) -> Result<()> {
        self.channel.send(envelope.to_wire(), &Target::Parent)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelError, InboundFn, ReceiverId};
    use crate::registry::PluginSet;
    use parking_lot::Mutex;
    use serde_json::json;

    /// Records sends; fails for plugins named "broken".
    #[derive(Default)]
    struct RecordingChannel {
        sent: Mutex<Vec<(Value, Target)>>,
    }

    impl Channel for RecordingChannel {
        fn send(&self, message: Value, target: &Target) -> std::result::Result<(), ChannelError> {
            if matches!(target, Target::Plugin(id) if id.as_str() == "broken") {
                return Err(ChannelError::Closed);
            }
            self.sent.lock().push((message, target.clone()));
            Ok(())
        }

        fn on_receive(&self, _callback: InboundFn) -> ReceiverId {
            ReceiverId::new(0)
        }

        fn remove_receiver(&self, _id: ReceiverId) {}
    }

    fn counting_bus(name: &str) -> (EventBus<Envelope>, Arc<Mutex<usize>>) {
        let bus = EventBus::new();
        let count = Arc::new(Mutex::new(0));
        let c = Arc::clone(&count);
        bus.on(name, move |_| *c.lock() += 1);
        (bus, count)
    }

    #[test]
    fn test_mode_parse_and_display() {
        assert_eq!("HOST".parse::<Mode>().unwrap(), Mode::Host);
        assert_eq!("plugin".parse::<Mode>().unwrap(), Mode::Plugin);
        assert!("iframe".parse::<Mode>().is_err());
        assert_eq!(Mode::Host.to_string(), "host");
        assert_eq!(serde_json::to_value(Mode::Plugin).unwrap(), json!("plugin"));
    }

    #[test]
    fn test_plugin_request_goes_to_parent_only() {
        let channel = Arc::new(RecordingChannel::default());
        let router = Router::plugin(channel.clone());
        let (bus, local) = counting_bus("GET_GRID_TYPE");

        let envelope = Envelope::request("GET_GRID_TYPE", Value::Null, "1");
        router.route_request(&envelope, &bus).unwrap();
        router.complete_request("GET_GRID_TYPE", json!("SQUARE"));

        let sent = channel.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, Target::Parent);
        assert_eq!(sent[0].0["uuid"], "1");
        assert_eq!(*local.lock(), 0);
    }

    #[test]
    fn test_host_event_dispatches_locally_then_fans_out() {
        let channel = Arc::new(RecordingChannel::default());
        let registry: Arc<PluginSet> = Arc::new(["a", "b"].into_iter().collect());
        let router = Router::host(channel.clone(), registry);
        let (bus, local) = counting_bus("TOOL_CHANGED");

        router
            .route_event(&Envelope::event("TOOL_CHANGED", json!("measure")), &bus)
            .unwrap();

        assert_eq!(*local.lock(), 1);
        let targets: Vec<_> = channel.sent.lock().iter().map(|(_, t)| t.clone()).collect();
        assert_eq!(
            targets,
            vec![Target::Plugin("a".into()), Target::Plugin("b".into())]
        );
    }

    #[test]
    fn test_host_request_fans_out_only_after_completion() {
        let channel = Arc::new(RecordingChannel::default());
        let registry: Arc<PluginSet> = Arc::new(["a"].into_iter().collect());
        let router = Router::host(channel.clone(), registry);
        let bus = EventBus::new();

        router
            .route_request(&Envelope::request("GET_CAMERA", Value::Null, "9"), &bus)
            .unwrap();
        assert!(channel.sent.lock().is_empty());

        router.complete_request("GET_CAMERA", Value::Null);
        let sent = channel.sent.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].0.get("uuid").is_none());
    }

    #[test]
    fn test_fan_out_with_empty_registry_is_noop() {
        let channel = Arc::new(RecordingChannel::default());
        let router = Router::host(channel.clone(), Arc::new(PluginSet::new()));
        assert_eq!(router.fan_out(&Envelope::event("X", Value::Null)), 0);
        assert!(channel.sent.lock().is_empty());
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_fan_out_continues_past_failed_delivery() {
        let channel = Arc::new(RecordingChannel::default());
        let registry: Arc<PluginSet> = Arc::new(["broken", "ok"].into_iter().collect());
        let router = Router::host(channel.clone(), registry);
        assert_eq!(router.fan_out(&Envelope::event("X", Value::Null)), 1);
        assert_eq!(channel.sent.lock()[0].1, Target::Plugin("ok".into()));
        assert!(logs_contain("fan-out delivery failed"));
    }

    #[test]
    fn test_inbound_noise_is_discarded() {
        let router = Router::plugin(Arc::new(RecordingChannel::default()));
        let (bus, local) = counting_bus("X");
        router.route_inbound(&json!({ "type": "webpackOk" }), &bus);
        router.route_inbound(&json!({ "event": "X" }), &bus);
        assert_eq!(*local.lock(), 1);
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_inbound_trace_marks_responses() {
        let router = Router::plugin(Arc::new(RecordingChannel::default()));
        let (bus, local) = counting_bus("GET_GRID_TYPE/RESPONSE_7");
        router.route_inbound(&json!({ "event": "GET_GRID_TYPE/RESPONSE_7", "payload": "SQUARE" }), &bus);
        assert_eq!(*local.lock(), 1);
        assert!(logs_contain("response=true"));
    }
}
