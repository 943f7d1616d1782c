//! Connectivity signal abstractions
//!
//! A [`ConnectivityMonitor`] reports whether the device can currently reach
//! the document store and emits an edge event on every transition.
//! [`ManualConnectivity`] is an in-process monitor driven by explicit calls;
//! it backs tests, the simulation, and hosts that forward an external signal.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

/// Edge event from the connectivity signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

/// Process-wide connectivity view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityState {
    /// Real connectivity signal
    pub is_online: bool,
    /// Operator override, independent of the real signal
    pub manual_offline_mode: bool,
}

impl ConnectivityState {
    pub fn new(is_online: bool) -> Self {
        Self {
            is_online,
            manual_offline_mode: false,
        }
    }

    /// Effective offline flag
    pub fn is_offline(&self) -> bool {
        !self.is_online || self.manual_offline_mode
    }
}

/// Source of online/offline transitions
pub trait ConnectivityMonitor: Send + Sync {
    /// Current state of the real signal
    fn is_online(&self) -> bool;

    /// Receive every subsequent transition
    fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent>;
}

/// Connectivity signal driven by explicit calls
pub struct ManualConnectivity {
    online: AtomicBool,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl ManualConnectivity {
    /// Create a signal with the given initial state
    pub fn new(online: bool) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            online: AtomicBool::new(online),
            events,
        }
    }

    /// Report that connectivity came back; no event if already online
    pub fn set_online(&self) {
        self.transition(true);
    }

    /// Report that connectivity was lost; no event if already offline
    pub fn set_offline(&self) {
        self.transition(false);
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn transition(&self, online: bool) {
        if self.online.swap(online, Ordering::SeqCst) == online {
            return;
        }
        let event = if online {
            ConnectivityEvent::Online
        } else {
            ConnectivityEvent::Offline
        };
        debug!(?event, "Connectivity transition");
        // No receivers is fine: nobody is listening yet
        let _ = self.events.send(event);
    }
}

impl Default for ManualConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityMonitor for ManualConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }
}

impl<T: ConnectivityMonitor + ?Sized> ConnectivityMonitor for std::sync::Arc<T> {
    fn is_online(&self) -> bool {
        (**self).is_online()
    }

    fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        (**self).subscribe()
    }
}
