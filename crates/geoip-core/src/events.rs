//! Server events and the subscriber list that delivers them.
//!
//! The server owns one [`EventBus`]. Subscribers are notified synchronously,
//! in registration order, on the task that emitted the event. There is no
//! buffering and no delivery guarantee beyond that call.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::{GeoRecord, IncomingRequest};

/// Emitted once per listener when its socket is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListeningEvent {
    /// Whether this is the TLS listener.
    pub uses_tls: bool,
    /// Bound port.
    pub port: u16,
    /// Bound socket address.
    pub addr: SocketAddr,
}

/// Emitted once per successful, authenticated lookup.
#[derive(Debug, Clone)]
pub struct LookupEvent {
    /// The address that was looked up.
    pub ip: String,
    /// The record returned to the client.
    pub geo: GeoRecord,
    /// The request that triggered the lookup.
    pub request: Arc<IncomingRequest>,
}

/// Any event published on the [`EventBus`].
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A listener became active.
    Listening(ListeningEvent),
    /// A lookup succeeded.
    Lookup(LookupEvent),
}

impl ServerEvent {
    /// Event name (`"listening"` or `"lookup"`).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Listening(_) => "listening",
            Self::Lookup(_) => "lookup",
        }
    }
}

/// Receiver of server events.
///
/// Implemented for every `Fn(&ServerEvent) + Send + Sync` closure.
pub trait EventSubscriber: Send + Sync {
    /// Handle one event. Must not block for long: it runs inline with the
    /// request that produced the event.
    fn on_event(&self, event: &ServerEvent);
}

impl<F> EventSubscriber for F
where
    F: Fn(&ServerEvent) + Send + Sync,
{
    fn on_event(&self, event: &ServerEvent) {
        self(event);
    }
}

/// Thread-safe list of subscribers.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    /// Create a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Safe to call while events are being emitted;
    /// the new subscriber sees events emitted after this call returns.
    pub fn subscribe(&self, subscriber: impl EventSubscriber + 'static) {
        self.subscribers.write().push(Arc::new(subscriber));
    }

    /// Deliver an event to every subscriber.
    pub fn emit(&self, event: &ServerEvent) {
        // Snapshot so subscribers run without holding the lock.
        let subscribers = self.subscribers.read().clone();
        tracing::trace!(
            event = event.name(),
            subscribers = subscribers.len(),
            "emitting server event"
        );
        for subscriber in &subscribers {
            subscriber.on_event(event);
        }
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
