//! Subscription handle

use livequery_core::{QueryDescriptor, RequestId, SubscriptionEvent};
use tokio::sync::broadcast;

/// Handle to an active subscription.
///
/// Events arrive on a broadcast stream that stays open across reconnects.
/// The stream closes permanently when the subscription is removed: by
/// `unsubscribe`, by a non-recoverable server error, or by client close.
/// Receiving `Err(Closed)` is the removal notification; no further event
/// is sent after it.
#[derive(Debug)]
pub struct Subscription {
    request_id: RequestId,
    query: QueryDescriptor,
    events: broadcast::Receiver<SubscriptionEvent>,
}

impl Subscription {
    pub(crate) fn new(
        request_id: RequestId,
        query: QueryDescriptor,
        events: broadcast::Receiver<SubscriptionEvent>,
    ) -> Self {
        Self {
            request_id,
            query,
            events,
        }
    }

    /// Id correlating this subscription with server events
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    /// The query this subscription watches
    #[must_use]
    pub fn query(&self) -> &QueryDescriptor {
        &self.query
    }

    /// Receive the next event.
    ///
    /// Slow consumers can observe `Err(Lagged)` when the buffer wraps;
    /// `Err(Closed)` means the subscription is gone.
    pub async fn next_event(
        &mut self,
    ) -> Result<SubscriptionEvent, broadcast::error::RecvError> {
        self.events.recv().await
    }

    /// An additional listener stream, starting at the current position
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<SubscriptionEvent> {
        self.events.resubscribe()
    }
}

impl Clone for Subscription {
    fn clone(&self) -> Self {
        Self {
            request_id: self.request_id,
            query: self.query.clone(),
            events: self.events.resubscribe(),
        }
    }
}
