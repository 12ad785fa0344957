//! Display events and the bus that fans them out to observers.
//!
//! Each subscriber owns an mpsc receiver; publishing clones the event into
//! every live sender. Subscribers that dropped their receiver are pruned
//! on the next publish.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use scopeview_algorithms::HistogramResult;
use scopeview_core::{Coords, DisplaySettings};

use crate::sync::lock;

/// How a missing image was replaced during a render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Substitution {
    /// The channel's last successfully drawn image.
    LastKnown,
    /// A zero-filled image shaped like another channel's image.
    Placeholder,
}

/// Notifications published by a display.
#[derive(Debug, Clone)]
pub enum DisplayEvent {
    /// New statistics for a channel.
    ///
    /// `display_bins` holds the bins as they should be plotted, log-scaled
    /// when the settings ask for it; one vector per component.
    HistogramsUpdated {
        channel: usize,
        histograms: Arc<Vec<HistogramResult>>,
        display_bins: Arc<Vec<Vec<u64>>>,
    },

    /// A new settings snapshot was installed.
    DisplaySettingsChanged(Arc<DisplaySettings>),

    /// A frame was handed to the render sink.
    DrawComplete { coords: Coords, pass: u64 },

    /// An image was missing and something else was drawn in its place.
    ImageSubstituted {
        requested: Coords,
        substitution: Substitution,
    },
}

/// Identifier returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receiving end of a subscription.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    rx: Receiver<DisplayEvent>,
}

impl Subscription {
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next event, if one is queued.
    #[must_use]
    pub fn try_recv(&self) -> Option<DisplayEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Next event, waiting up to `timeout`.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<DisplayEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// All events queued right now.
    pub fn drain(&self) -> Vec<DisplayEvent> {
        self.rx.try_iter().collect()
    }
}

/// Fan-out of display events.
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<(SubscriptionId, Sender<DisplayEvent>)>>,
    next_id: AtomicU64,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new observer.
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = channel();
        lock(&self.subscribers).push((id, tx));
        Subscription { id, rx }
    }

    /// Removes an observer. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = lock(&self.subscribers);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Sends `event` to every observer.
    pub fn publish(&self, event: &DisplayEvent) {
        lock(&self.subscribers).retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    /// Number of registered observers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }
}
