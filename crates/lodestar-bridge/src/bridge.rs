//! Correlated request/response over an unreliable channel.
//!
//! A [`Bridge`] is one protocol instance: a local event bus, a channel
//! receiver and a table of pending requests, routed according to its
//! [`Mode`]. Every request gets a fresh correlation id and waits on a
//! one-shot listener for `"{command}/RESPONSE_{id}"`, raced against the
//! configured timeout.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lodestar_bridge::{Bridge, BridgeConfig, InProcessHub, PluginSet};
//! use lodestar_protocol::{GetGridType, GridType};
//!
//! # async fn demo() -> lodestar_bridge::Result<()> {
//! let hub = InProcessHub::new();
//! let plugins = Arc::new(PluginSet::new());
//! plugins.mount("dice");
//!
//! let host = Bridge::host(Arc::new(hub.host_channel()), plugins, BridgeConfig::default());
//! host.answer::<GetGridType, _>(|()| GridType::Square);
//!
//! let plugin = Bridge::plugin(Arc::new(hub.plugin_channel("dice")), BridgeConfig::default());
//! assert_eq!(plugin.request::<GetGridType>(&()).await?, GridType::Square);
//! # Ok(())
//! # }
//! ```

use crate::bus::{EventBus, ListenerId, Subscription};
use crate::channel::{Channel, ReceiverId};
use crate::config::{BridgeConfig, DEFAULT_REQUEST_TIMEOUT_MS};
use crate::error::{BridgeError, Result};
use crate::pending::PendingRequests;
use crate::registry::PluginRegistry;
use crate::router::{Mode, Router};
use lodestar_protocol::{response_event_name, Command, CommandKind, Envelope, Event};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

struct BridgeInner {
    router: Router,
    bus: EventBus<Envelope>,
    pending: PendingRequests,
    /// One installed handler per catalog command
    handlers: Mutex<HashMap<CommandKind, Subscription<Envelope>>>,
    receiver: Mutex<Option<ReceiverId>>,
    timeout: Duration,
    destroyed: AtomicBool,
}

impl Drop for BridgeInner {
    fn drop(&mut self) {
        if let Some(id) = self.receiver.get_mut().take() {
            self.router.channel().remove_receiver(id);
        }
    }
}

/// Handle to one protocol instance. Clones share the instance.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

/// Non-owning handle, for listeners that must not keep the bridge alive.
#[derive(Clone)]
pub struct WeakBridge {
    inner: Weak<BridgeInner>,
}

impl WeakBridge {
    pub fn upgrade(&self) -> Option<Bridge> {
        self.inner.upgrade().map(|inner| Bridge { inner })
    }
}

impl Bridge {
    /// Build a host-mode bridge that fans out to the plugins in `registry`.
    pub fn host(
        channel: Arc<dyn Channel>,
        registry: Arc<dyn PluginRegistry>,
        config: BridgeConfig,
    ) -> Self {
        Self::build(Router::host(channel, registry), config)
    }

    /// Build a plugin-mode bridge that talks only to its parent.
    pub fn plugin(channel: Arc<dyn Channel>, config: BridgeConfig) -> Self {
        Self::build(Router::plugin(channel), config)
    }

    fn build(router: Router, config: BridgeConfig) -> Self {
        let config = match config.validate() {
            Ok(()) => config,
            Err(e) => {
                warn!(error = %e, fallback_ms = DEFAULT_REQUEST_TIMEOUT_MS, "invalid bridge config");
                BridgeConfig::default()
            }
        };
        let inner = Arc::new(BridgeInner {
            router,
            bus: EventBus::new(),
            pending: PendingRequests::default(),
            handlers: Mutex::new(HashMap::new()),
            receiver: Mutex::new(None),
            timeout: config.request_timeout(),
            destroyed: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&inner);
        let receiver = inner.router.channel().on_receive(Arc::new(move |message: Value| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.destroyed.load(Ordering::SeqCst) {
                return;
            }
            inner.router.route_inbound(&message, &inner.bus);
        }));
        *inner.receiver.lock() = Some(receiver);

        debug!(mode = %inner.router.mode(), timeout_ms = inner.timeout.as_millis() as u64, "bridge created");
        Self { inner }
    }

    pub fn mode(&self) -> Mode {
        self.inner.router.mode()
    }

    pub fn downgrade(&self) -> WeakBridge {
        WeakBridge {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    /// Listeners registered on the local bus, across all names
    pub fn listener_count(&self) -> usize {
        self.inner.bus.total_listeners()
    }

    /// How long a request waits for its response
    pub fn request_timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Requests still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    fn ensure_live(&self, what: &str) -> Result<()> {
        if self.is_destroyed() {
            return Err(BridgeError::Destroyed(what.to_string()));
        }
        Ok(())
    }

    // =========================================================================
    // Passive observation
    // =========================================================================

    pub fn on<F>(&self, name: impl Into<String>, listener: F) -> Subscription<Envelope>
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.inner.bus.on(name, listener)
    }

    pub fn once<F>(&self, name: impl Into<String>, listener: F) -> Subscription<Envelope>
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        self.inner.bus.once(name, listener)
    }

    pub fn off(&self, name: &str, id: ListenerId) -> bool {
        self.inner.bus.off(name, id)
    }

    /// Typed listener for a catalog event.
    ///
    /// Payloads that do not decode as `E::Payload` are logged and skipped.
    pub fn subscribe<E, F>(&self, listener: F) -> Subscription<Envelope>
    where
        E: Event,
        F: Fn(E::Payload) + Send + Sync + 'static,
    {
        self.inner.bus.on(E::KIND.as_str(), move |envelope: &Envelope| {
            match serde_json::from_value::<E::Payload>(envelope.payload.clone()) {
                Ok(payload) => listener(payload),
                Err(e) => warn!(event = %E::KIND, error = %e, "dropping undecodable event payload"),
            }
        })
    }

    // =========================================================================
    // Active calls
    // =========================================================================

    /// Fire-and-forget.
    pub fn emit(&self, name: impl Into<String>, payload: Value) -> Result<()> {
        let envelope = Envelope::event(name, payload);
        self.ensure_live(&envelope.event)?;
        trace!(mode = %self.mode(), event = %envelope.event, "emit");
        self.inner.router.route_event(&envelope, &self.inner.bus)
    }

    pub fn emit_event<E: Event>(&self, payload: &E::Payload) -> Result<()> {
        self.emit(E::KIND.as_str(), serde_json::to_value(payload)?)
    }

    /// Send a request and wait for the correlated response.
    pub async fn request_raw(&self, command: &str, payload: Value) -> Result<Value> {
        self.ensure_live(command)?;

        let (correlation_id, response_event, rx) = loop {
            let correlation_id = Uuid::new_v4().to_string();
            let response_event = response_event_name(command, &correlation_id);
            if let Some(rx) = self.inner.pending.insert(&response_event, &correlation_id, command) {
                break (correlation_id, response_event, rx);
            }
        };

        let pending = self.inner.pending.clone();
        let listener = self.inner.bus.once(response_event.clone(), move |envelope: &Envelope| {
            pending.resolve(&envelope.event, envelope.payload.clone());
        });

        // Runs on every exit, including the caller dropping this future.
        let _cleanup = scopeguard::guard(
            (self.inner.pending.clone(), listener, response_event),
            |(pending, listener, response_event)| {
                pending.remove(&response_event);
                listener.unsubscribe();
            },
        );

        debug!(mode = %self.mode(), command, %correlation_id, "request");
        let envelope = Envelope::request(command, payload, correlation_id);
        self.inner.router.route_request(&envelope, &self.inner.bus)?;

        match tokio::time::timeout(self.inner.timeout, rx).await {
            Ok(Ok(response)) => {
                self.inner.router.complete_request(command, envelope.payload);
                Ok(response)
            }
            Ok(Err(_)) => Err(BridgeError::Destroyed(command.to_string())),
            Err(_) => {
                debug!(command, "request timed out");
                Err(BridgeError::Timeout {
                    command: command.to_string(),
                    timeout_ms: self.inner.timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Typed request for a catalog command.
    pub async fn request<C: Command>(&self, payload: &C::Payload) -> Result<C::Response> {
        let command = C::KIND.as_str();
        let response = self
            .request_raw(command, serde_json::to_value(payload)?)
            .await?;
        serde_json::from_value(response).map_err(|source| BridgeError::InvalidResponse {
            command: command.to_string(),
            source,
        })
    }

    // =========================================================================
    // Answering
    // =========================================================================

    /// Answer a request received through a raw [`on`](Self::on) listener.
    ///
    /// Envelopes without a correlation id are not requests; replying to one
    /// is a no-op.
    pub fn reply(&self, request: &Envelope, response: Value) -> Result<()> {
        match request.response_event() {
            Some(response_event) => self.emit(response_event, response),
            None => {
                trace!(event = %request.event, "reply to non-request ignored");
                Ok(())
            }
        }
    }

    /// Install a synchronous handler for `C`, replacing any previous one.
    pub fn answer<C, F>(&self, handler: F)
    where
        C: Command,
        F: Fn(C::Payload) -> C::Response + Send + Sync + 'static,
    {
        let weak = self.downgrade();
        self.install_handler(C::KIND, move |envelope: &Envelope| {
            let Some(payload) = decode_request::<C>(envelope) else {
                return;
            };
            let Some(bridge) = weak.upgrade() else {
                return;
            };
            let response = handler(payload);
            bridge.send_reply(C::KIND, envelope, &response);
        });
    }

    /// Install an async handler for `C`, replacing any previous one.
    ///
    /// Each request runs on its own task. A handler error produces no reply,
    /// so the caller observes a timeout.
    pub fn handle<C, F, Fut>(&self, handler: F)
    where
        C: Command,
        F: Fn(C::Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<C::Response>> + Send + 'static,
    {
        let weak = self.downgrade();
        self.install_handler(C::KIND, move |envelope: &Envelope| {
            let Some(payload) = decode_request::<C>(envelope) else {
                return;
            };
            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                warn!(command = %C::KIND, "async handler invoked outside a tokio runtime");
                return;
            };
            let work = handler(payload);
            let weak = weak.clone();
            let request = envelope.clone();
            runtime.spawn(async move {
                match work.await {
                    Ok(response) => {
                        if let Some(bridge) = weak.upgrade() {
                            bridge.send_reply(C::KIND, &request, &response);
                        }
                    }
                    Err(e) => warn!(command = %C::KIND, error = %e, "handler failed, no reply sent"),
                }
            });
        });
    }

    /// Remove the handler for a command. Returns false if none was installed.
    pub fn remove_handler(&self, kind: CommandKind) -> bool {
        let previous = self.inner.handlers.lock().remove(&kind);
        previous.is_some_and(|sub| sub.unsubscribe())
    }

    pub fn has_handler(&self, kind: CommandKind) -> bool {
        self.inner.handlers.lock().contains_key(&kind)
    }

    fn install_handler<F>(&self, kind: CommandKind, listener: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        let subscription = self.inner.bus.on(kind.as_str(), listener);
        let previous = self.inner.handlers.lock().insert(kind, subscription);
        if let Some(previous) = previous {
            debug!(command = %kind, "replacing handler");
            previous.unsubscribe();
        }
    }

    fn send_reply<R: Serialize>(&self, kind: CommandKind, request: &Envelope, response: &R) {
        let result = serde_json::to_value(response)
            .map_err(BridgeError::from)
            .and_then(|value| self.reply(request, value));
        if let Err(e) = result {
            warn!(command = %kind, error = %e, "failed to send reply");
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Tear the instance down.
    ///
    /// Removes the inbound receiver, clears every bus listener and handler,
    /// and drops all pending requests; their callers fail with
    /// [`BridgeError::Destroyed`]. Calling it again is a no-op.
    pub fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(id) = self.inner.receiver.lock().take() {
            self.inner.router.channel().remove_receiver(id);
        }
        self.inner.handlers.lock().clear();
        self.inner.bus.clear();
        let abandoned = self.inner.pending.drain();
        info!(mode = %self.mode(), abandoned, "bridge destroyed");
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("mode", &self.mode())
            .field("timeout", &self.inner.timeout)
            .field("listeners", &self.listener_count())
            .field("pending", &self.pending_count())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

fn decode_request<C: Command>(envelope: &Envelope) -> Option<C::Payload> {
    if envelope.correlation_id.is_none() {
        trace!(command = %C::KIND, "ignoring uncorrelated command envelope");
        return None;
    }
    decode_payload::<C::Payload>(C::KIND.as_str(), &envelope.payload)
}

fn decode_payload<T: DeserializeOwned>(name: &str, payload: &Value) -> Option<T> {
    match serde_json::from_value(payload.clone()) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(command = name, error = %e, "undecodable request payload, no reply sent");
            None
        }
    }
}
