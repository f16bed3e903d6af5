//! Live fan-out of decoded readings.
//!
//! Every subscriber owns a bounded queue. [`BroadcastHub::publish`] never
//! waits: a subscriber whose queue is full or whose receiver is gone is
//! evicted on the spot, and the rest still get the reading. Readings are
//! enqueued in publish order, so per-sensor order is preserved for every
//! subscriber that stays connected.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::types::DecodedReading;

/// Identifies one live subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Why delivery to a subscriber failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryFailure {
    /// The subscriber did not drain its queue in time.
    #[error("subscriber queue is full")]
    QueueFull,
    /// The subscriber's receiving side is gone.
    #[error("subscriber disconnected")]
    Disconnected,
}

/// Receiving side handed to a subscriber.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: mpsc::Receiver<Arc<DecodedReading>>,
}

impl Subscription {
    /// This subscriber's id, for [`BroadcastHub::unsubscribe`].
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Wait for the next reading. `None` once the hub has dropped this
    /// subscriber and the queue is drained.
    pub async fn recv(&mut self) -> Option<Arc<DecodedReading>> {
        self.receiver.recv().await
    }

    /// Take a queued reading without waiting.
    pub fn try_recv(&mut self) -> Option<Arc<DecodedReading>> {
        self.receiver.try_recv().ok()
    }
}

/// Result of one publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers that received the reading.
    pub delivered: usize,
    /// Subscribers removed because delivery failed.
    pub evicted: Vec<SubscriberId>,
}

/// Owns the set of live subscribers.
#[derive(Debug)]
pub struct BroadcastHub {
    buffer: usize,
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<Arc<DecodedReading>>>>,
}

impl BroadcastHub {
    /// Create a hub giving each subscriber a queue of `buffer` readings.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            buffer: buffer.max(1),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Register a new subscriber. It receives readings published from now on.
    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let id = SubscriberId::new();
        self.subscribers.lock().insert(id, sender);
        tracing::debug!(subscriber_id = %id, "Subscriber connected");
        Subscription { id, receiver }
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.lock().remove(&id).is_some();
        if removed {
            tracing::debug!(subscriber_id = %id, "Subscriber disconnected");
        }
        removed
    }

    /// Deliver `reading` to every current subscriber without waiting.
    pub fn publish(&self, reading: Arc<DecodedReading>) -> PublishReport {
        let mut report = PublishReport::default();
        let mut subscribers = self.subscribers.lock();

        subscribers.retain(|id, sender| match deliver(sender, &reading) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(failure) => {
                tracing::warn!(subscriber_id = %id, %failure, "Evicting subscriber");
                report.evicted.push(*id);
                false
            }
        });

        report
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

fn deliver(
    sender: &mpsc::Sender<Arc<DecodedReading>>,
    reading: &Arc<DecodedReading>,
) -> Result<(), DeliveryFailure> {
    sender
        .try_send(Arc::clone(reading))
        .map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryFailure::QueueFull,
            mpsc::error::TrySendError::Closed(_) => DeliveryFailure::Disconnected,
        })
}
