//! Ordered listener notification with veto support
//!
//! Listeners see authentication and tunnel events synchronously, in
//! registration order. On success and connect paths a listener can cancel
//! the operation by answering `false` or by failing; the first such answer
//! stops dispatch. Failure and teardown events are advisory: answers are
//! ignored and a failing listener does not keep the others from running.

use std::sync::Arc;

use gatehouse_common::{GatewayError, Result};
use tracing::{debug, error, info, warn};

use crate::tunnel::{CloseReason, TunnelDetails};

/// Something a listener is told about
#[derive(Debug, Clone)]
pub enum ListenerEvent {
    AuthenticationSuccess {
        username: String,
        provider: String,
    },
    AuthenticationFailure {
        username: Option<String>,
        error: GatewayError,
    },
    TunnelConnect(TunnelDetails),
    TunnelClose {
        tunnel: TunnelDetails,
        reason: CloseReason,
    },
}

impl ListenerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AuthenticationSuccess { .. } => "authentication_success",
            Self::AuthenticationFailure { .. } => "authentication_failure",
            Self::TunnelConnect(_) => "tunnel_connect",
            Self::TunnelClose { .. } => "tunnel_close",
        }
    }

    /// Whether a listener may cancel the operation behind this event
    pub fn is_vetoable(&self) -> bool {
        match self {
            Self::AuthenticationSuccess { .. } | Self::TunnelConnect(_) => true,
            Self::AuthenticationFailure { .. } => false,
            Self::TunnelClose { reason, .. } => reason.is_vetoable(),
        }
    }
}

/// Receiver of gateway events
pub trait Listener: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Handle `event`
    ///
    /// Returning `Ok(false)` vetoes a vetoable event. The answer is ignored
    /// for advisory events.
    fn handle(&self, event: &ListenerEvent) -> Result<bool>;
}

/// Dispatches events to an ordered list of listeners
#[derive(Clone, Default)]
pub struct ListenerNotifier {
    listeners: Vec<Arc<dyn Listener>>,
}

impl ListenerNotifier {
    pub fn new(listeners: Vec<Arc<dyn Listener>>) -> Self {
        Self { listeners }
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Dispatch `event` according to its kind
    ///
    /// Returns whether the operation may proceed; always `true` for
    /// advisory events.
    pub fn notify(&self, event: &ListenerEvent) -> bool {
        if event.is_vetoable() {
            self.notify_vetoable(event)
        } else {
            self.notify_advisory(event);
            true
        }
    }

    /// Dispatch until a listener refuses or fails
    pub fn notify_vetoable(&self, event: &ListenerEvent) -> bool {
        for listener in &self.listeners {
            match listener.handle(event) {
                Ok(true) => {
                    debug!(
                        listener = listener.name(),
                        event = event.name(),
                        "Listener accepted event"
                    );
                }
                Ok(false) => {
                    info!(
                        listener = listener.name(),
                        event = event.name(),
                        "Listener vetoed event"
                    );
                    return false;
                }
                Err(e) => {
                    warn!(
                        listener = listener.name(),
                        event = event.name(),
                        error = %e,
                        "Listener failed; treating as veto"
                    );
                    return false;
                }
            }
        }
        true
    }

    /// Dispatch to every listener, logging failures
    pub fn notify_advisory(&self, event: &ListenerEvent) {
        for listener in &self.listeners {
            if let Err(e) = listener.handle(event) {
                error!(
                    listener = listener.name(),
                    event = event.name(),
                    error = %e,
                    "Listener failed"
                );
            }
        }
    }
}

impl std::fmt::Debug for ListenerNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerNotifier")
            .field(
                "listeners",
                &self.listeners.iter().map(|l| l.name().to_string()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use uuid::Uuid;

    /// Listener recording what it saw and answering a fixed verdict
    struct Recording {
        name: String,
        verdict: Result<bool>,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Recording {
        fn new(
            name: &str,
            verdict: Result<bool>,
            seen: &Arc<Mutex<Vec<String>>>,
        ) -> Arc<dyn Listener> {
            Arc::new(Self {
                name: name.to_string(),
                verdict,
                seen: seen.clone(),
            })
        }
    }

    impl Listener for Recording {
        fn name(&self) -> &str {
            &self.name
        }

        fn handle(&self, _event: &ListenerEvent) -> Result<bool> {
            self.seen.lock().unwrap().push(self.name.clone());
            self.verdict.clone()
        }
    }

    fn connect_event() -> ListenerEvent {
        ListenerEvent::TunnelConnect(TunnelDetails {
            tunnel_id: Uuid::new_v4(),
            connection_identifier: "1".to_string(),
            connection_name: "db".to_string(),
            username: "alice".to_string(),
        })
    }

    fn failure_event() -> ListenerEvent {
        ListenerEvent::AuthenticationFailure {
            username: Some("alice".to_string()),
            error: GatewayError::permission_denied("Invalid login"),
        }
    }

    #[test]
    fn test_all_accept() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let notifier = ListenerNotifier::new(vec![
            Recording::new("a", Ok(true), &seen),
            Recording::new("b", Ok(true), &seen),
        ]);
        assert!(notifier.notify(&connect_event()));
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_veto_stops_dispatch() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let notifier = ListenerNotifier::new(vec![
            Recording::new("a", Ok(false), &seen),
            Recording::new("b", Ok(true), &seen),
        ]);
        assert!(!notifier.notify(&connect_event()));
        assert_eq!(*seen.lock().unwrap(), vec!["a"]);
    }

    #[test]
    fn test_error_on_vetoable_path_is_a_veto() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let notifier = ListenerNotifier::new(vec![
            Recording::new("a", Ok(true), &seen),
            Recording::new("b", Err(GatewayError::internal("boom")), &seen),
            Recording::new("c", Ok(true), &seen),
        ]);
        assert!(!notifier.notify(&connect_event()));
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_advisory_dispatch_reaches_everyone() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let notifier = ListenerNotifier::new(vec![
            Recording::new("a", Err(GatewayError::internal("boom")), &seen),
            Recording::new("b", Ok(false), &seen),
            Recording::new("c", Ok(true), &seen),
        ]);
        assert!(notifier.notify(&failure_event()));
        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_teardown_close_is_advisory() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let notifier = ListenerNotifier::new(vec![Recording::new("a", Ok(false), &seen)]);
        let tunnel = match connect_event() {
            ListenerEvent::TunnelConnect(details) => details,
            _ => unreachable!(),
        };

        let caller = ListenerEvent::TunnelClose {
            tunnel: tunnel.clone(),
            reason: CloseReason::Caller,
        };
        let teardown = ListenerEvent::TunnelClose {
            tunnel,
            reason: CloseReason::Teardown,
        };
        assert!(!notifier.notify(&caller));
        assert!(notifier.notify(&teardown));
    }

    #[test]
    fn test_empty_notifier_proceeds() {
        let notifier = ListenerNotifier::default();
        assert!(notifier.is_empty());
        assert!(notifier.notify(&connect_event()));
    }
}
