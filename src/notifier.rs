//! Change notification fan-out
//!
//! Every successful write or delete through the `KeyStore` is published here.
//! Subscribers each get their own unbounded channel, so a slow consumer never
//! loses events and events from one publisher arrive in publish order.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};
use tokio::sync::mpsc;
use tracing::trace;

use crate::storage::TierKind;

/// A write (`new_value` is `Some`) or delete (`None`) seen on one tier.
///
/// `key` is the namespaced key as stored in the tier. `origin` is `None`
/// when the event came from a tier this process does not recognize.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub key: String,
    pub new_value: Option<String>,
    pub origin: Option<TierKind>,
}

impl ChangeEvent {
    pub fn new(key: impl Into<String>, new_value: Option<String>, origin: TierKind) -> Self {
        Self {
            key: key.into(),
            new_value,
            origin: Some(origin),
        }
    }

    /// Build an event from a transport that names its tier as text.
    pub fn from_raw(key: impl Into<String>, new_value: Option<String>, origin: &str) -> Self {
        Self {
            key: key.into(),
            new_value,
            origin: origin.parse().ok(),
        }
    }

    pub fn is_delete(&self) -> bool {
        self.new_value.is_none()
    }
}

pub type ChangeReceiver = mpsc::UnboundedReceiver<ChangeEvent>;

#[derive(Default)]
pub struct ChangeNotifier {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ChangeEvent>>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> ChangeReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Deliver to every live subscriber; dropped receivers are pruned.
    pub fn publish(&self, key: &str, new_value: Option<&str>, origin: TierKind) {
        let event = ChangeEvent::new(key, new_value.map(str::to_string), origin);
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
        trace!("Published change on '{}' to {} subscriber(s)", key, subscribers.len());
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
