//! Event bus for session and tunnel lifecycle events
//!
//! Events are published after the fact for observers (audit trails,
//! dashboards). Nothing published here can influence an outcome; vetoes go
//! through [`ListenerNotifier`](crate::listener::ListenerNotifier) instead.
//!
//! # Example
//!
//! ```rust
//! use gatehouse_sessions::bus::{EventBus, GatewayEvent, SessionEvent};
//! use uuid::Uuid;
//!
//! # tokio_test::block_on(async {
//! let bus = EventBus::new();
//! let mut subscriber = bus.subscribe();
//!
//! bus.publish(GatewayEvent::Session(SessionEvent::Created {
//!     session_id: Uuid::new_v4(),
//!     username: "alice".to_string(),
//! }));
//!
//! let event = subscriber.recv().await.unwrap();
//! assert!(matches!(event, GatewayEvent::Session(SessionEvent::Created { .. })));
//! # });
//! ```

pub mod events;

pub use events::{SessionEvent, TunnelEvent};

use tokio::sync::broadcast;

/// Channel capacity for broadcast events
const CHANNEL_CAPACITY: usize = 1024;

/// Unified event type for all bus events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    Session(SessionEvent),
    Tunnel(TunnelEvent),
}

/// Broadcast channel shared by every gateway component
///
/// Clones share the same underlying channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<GatewayEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers
    ///
    /// Never blocks. When a subscriber lags, its oldest events are dropped.
    pub fn publish(&self, event: GatewayEvent) {
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
