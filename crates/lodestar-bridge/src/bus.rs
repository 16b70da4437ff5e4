//! In-process publish/subscribe keyed by event name.
//!
//! The bus is the foundation the rest of the bridge builds on: inbound
//! envelopes, request handlers and one-shot response listeners are all plain
//! bus listeners.
//!
//! ## Semantics
//!
//! - Listeners for a name run in registration order, synchronously, each
//!   receiving the same argument.
//! - `emit_local` works on a snapshot: listeners registered while an emit is
//!   in flight are not invoked by that emit.
//! - `once` listeners are removed before their first invocation and never run
//!   twice, even when the same event is re-emitted from inside a listener.
//! - `off` removes exactly one listener; unknown ids are a no-op.
//!
//! No lock is held while a listener runs, so listeners may freely call back
//! into the bus.
//!
//! ## Usage
//!
//! ```rust
//! use lodestar_bridge::EventBus;
//!
//! let bus: EventBus<u32> = EventBus::new();
//! let sub = bus.on("tick", |n| println!("tick {n}"));
//! assert_eq!(bus.emit_local("tick", &1), 1);
//! sub.unsubscribe();
//! assert_eq!(bus.emit_local("tick", &2), 0);
//! ```

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Listener function type
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Identifies one registration on a bus.
///
/// Ids are never reused within a bus, so removing by id removes exactly the
/// registration it was returned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl ListenerId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

struct Entry<T> {
    id: ListenerId,
    listener: Listener<T>,
    /// Set for `once` registrations; flipped by whichever emit claims it first.
    fired: Option<Arc<AtomicBool>>,
}

impl<T> Clone for Entry<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            listener: Arc::clone(&self.listener),
            fired: self.fired.clone(),
        }
    }
}

struct BusState<T> {
    listeners: HashMap<String, Vec<Entry<T>>>,
    next_id: u64,
}

impl<T> BusState<T> {
    fn remove(&mut self, name: &str, id: ListenerId) -> bool {
        let Some(entries) = self.listeners.get_mut(name) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        let removed = entries.len() < before;
        if entries.is_empty() {
            self.listeners.remove(name);
        }
        removed
    }
}

/// Event bus handle. Clones share the same listener table.
pub struct EventBus<T> {
    state: Arc<Mutex<BusState<T>>>,
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T: 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> EventBus<T> {
    /// Create a new empty event bus
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                listeners: HashMap::new(),
                next_id: 1,
            })),
        }
    }

    /// Register a listener for `name`.
    pub fn on<F>(&self, name: impl Into<String>, listener: F) -> Subscription<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.register(name.into(), Arc::new(listener), false)
    }

    /// Register a listener that is removed after its first invocation.
    pub fn once<F>(&self, name: impl Into<String>, listener: F) -> Subscription<T>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.register(name.into(), Arc::new(listener), true)
    }

    fn register(&self, name: String, listener: Listener<T>, once: bool) -> Subscription<T> {
        let id = {
            let mut state = self.state.lock();
            let id = ListenerId(state.next_id);
            state.next_id += 1;
            state.listeners.entry(name.clone()).or_default().push(Entry {
                id,
                listener,
                fired: once.then(|| Arc::new(AtomicBool::new(false))),
            });
            id
        };

        Subscription {
            name,
            id,
            state: Arc::downgrade(&self.state),
        }
    }

    /// Remove one listener. Returns false if it was not registered.
    pub fn off(&self, name: &str, id: ListenerId) -> bool {
        self.state.lock().remove(name, id)
    }

    /// Invoke every listener currently registered for `name`.
    ///
    /// Returns the number of listeners invoked.
    pub fn emit_local(&self, name: &str, args: &T) -> usize {
        let snapshot: Vec<Entry<T>> = match self.state.lock().listeners.get(name) {
            Some(entries) => entries.clone(),
            None => return 0,
        };

        let mut invoked = 0;
        for entry in snapshot {
            if let Some(fired) = &entry.fired {
                if fired.swap(true, Ordering::SeqCst) {
                    continue;
                }
                self.off(name, entry.id);
            }
            (entry.listener)(args);
            invoked += 1;
        }
        invoked
    }

    /// Count listeners registered for one name
    pub fn listener_count(&self, name: &str) -> usize {
        self.state
            .lock()
            .listeners
            .get(name)
            .map_or(0, |entries| entries.len())
    }

    /// Count listeners across all names
    pub fn total_listeners(&self) -> usize {
        self.state.lock().listeners.values().map(Vec::len).sum()
    }

    /// Remove every listener for every name.
    pub fn clear(&self) {
        self.state.lock().listeners.clear();
    }
}

impl<T> fmt::Debug for EventBus<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        let mut names: Vec<_> = state.listeners.keys().cloned().collect();
        names.sort();
        f.debug_struct("EventBus")
            .field("listener_count", &state.listeners.values().map(Vec::len).sum::<usize>())
            .field("names", &names)
            .finish()
    }
}

/// Handle returned by [`EventBus::on`] and [`EventBus::once`].
///
/// Dropping it leaves the listener registered; call
/// [`unsubscribe`](Self::unsubscribe) to remove it.
pub struct Subscription<T> {
    name: String,
    id: ListenerId,
    state: Weak<Mutex<BusState<T>>>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remove the listener. Returns false if it was already gone (fired
    /// `once`, removed via `off`, bus cleared or dropped).
    pub fn unsubscribe(&self) -> bool {
        match self.state.upgrade() {
            Some(state) => state.lock().remove(&self.name, self.id),
            None => false,
        }
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}
