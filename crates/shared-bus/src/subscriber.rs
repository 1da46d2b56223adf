//! # Subscriptions
//!
//! A listener's view of the bus: one broadcast receiver plus the filter it
//! applies on receive.

use crate::events::{EventFilter, FederationEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

/// Receiving end handed out by [`crate::InMemoryEventBus::subscribe`].
pub struct Subscription {
    receiver: broadcast::Receiver<FederationEvent>,
    filter: EventFilter,
    lagged: u64,
}

impl Subscription {
    pub(crate) fn new(receiver: broadcast::Receiver<FederationEvent>, filter: EventFilter) -> Self {
        Self {
            receiver,
            filter,
            lagged: 0,
        }
    }

    /// Next event passing the filter, or `None` once every publisher is gone.
    ///
    /// Falling more than the bus capacity behind skips the oldest events and
    /// adds them to [`Self::lagged`].
    pub async fn recv(&mut self) -> Option<FederationEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    self.lagged += skipped;
                    warn!(skipped, "Federation listener fell behind, events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    #[must_use]
    pub fn lagged(&self) -> u64 {
        self.lagged
    }
}
