//! Sessions for gatehouse
//!
//! A [`Session`] holds an authenticated user, the contexts every provider
//! contributed, and the tunnels opened through it. The [`SessionStore`] maps
//! tokens to sessions and expires idle ones out of band; destroying a session
//! always closes its tunnels first.

pub mod bus;
pub mod listener;
pub mod service;
pub mod session;
pub mod store;
pub mod tunnel;

pub use bus::{EventBus, GatewayEvent, SessionEvent, TunnelEvent};
pub use listener::{Listener, ListenerEvent, ListenerNotifier};
pub use service::AuthenticationService;
pub use session::Session;
pub use store::SessionStore;
pub use tunnel::{CloseOutcome, CloseReason, ManagedTunnel, TunnelDetails};
