//! Cross-instance session signaling.
//!
//! Logout in one application instance must be reflected in every other
//! instance sharing the credential store. Instead of leaning on incidental
//! storage side effects, the signal is an explicit broadcast channel:
//! coordinators publish on logout and on committed credential changes, and
//! every coordinator listens and re-initializes on signals that did not
//! originate with itself. The channel also serves same-instance listeners
//! (dependent caches) that want to react to a local logout.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// Broadcast capacity. Signals are tiny and listeners act on the latest
/// state anyway, so a small buffer is plenty; laggards re-read the store.
const BUS_CAPACITY: usize = 16;

/// What changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// A coordinator completed a logout and cleared the store.
    LoggedOut,
    /// A coordinator committed new credentials (login or refresh).
    CredentialsChanged,
}

/// A session change notification.
#[derive(Debug, Clone)]
pub struct SessionSignal {
    /// Origin id of the emitting coordinator. Listeners skip their own.
    pub origin: u64,
    pub kind: SignalKind,
    pub at: DateTime<Utc>,
}

/// Shared signal channel between coordinators and interested listeners.
#[derive(Clone)]
pub struct SessionBus {
    tx: broadcast::Sender<SessionSignal>,
}

impl SessionBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionSignal> {
        self.tx.subscribe()
    }

    /// Publish a signal. A send error only means nobody is listening.
    pub fn publish(&self, signal: SessionSignal) {
        let _ = self.tx.send(signal);
    }
}

impl Default for SessionBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signals_reach_all_subscribers() {
        let bus = SessionBus::new();
        let mut rx_a = bus.subscribe();
        let mut rx_b = bus.subscribe();

        bus.publish(SessionSignal {
            origin: 7,
            kind: SignalKind::LoggedOut,
            at: Utc::now(),
        });

        let got_a = rx_a.recv().await.unwrap();
        let got_b = rx_b.recv().await.unwrap();
        assert_eq!(got_a.kind, SignalKind::LoggedOut);
        assert_eq!(got_b.origin, 7);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let bus = SessionBus::new();
        bus.publish(SessionSignal {
            origin: 1,
            kind: SignalKind::CredentialsChanged,
            at: Utc::now(),
        });
    }
}
