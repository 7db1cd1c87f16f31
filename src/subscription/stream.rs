use super::hub::{SubscriptionHandle, SubscriptionSlot};
use crate::models::{CommandId, ResponseKind};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

/// Receives cancellation of subscriptions dropped before they finished
pub(crate) trait SubscriptionOwner: Send + Sync {
    fn release(&self, handle: SubscriptionHandle);
}

/// Finite stream of response changes for one command.
///
/// Yields the current kind first, then transitions as they are recorded, and
/// ends right after exactly one terminal kind. A subscription on an unknown id
/// yields a single `Invalid`. Cancelling it through `unsubscribe` ends the
/// stream without a terminal value. Dropping it cancels it.
pub struct ResponseSubscription {
    slot: Arc<SubscriptionSlot>,
    owner: Weak<dyn SubscriptionOwner>,
}

impl ResponseSubscription {
    pub(crate) fn new(slot: Arc<SubscriptionSlot>, owner: Weak<dyn SubscriptionOwner>) -> Self {
        Self { slot, owner }
    }

    pub fn handle(&self) -> SubscriptionHandle {
        self.slot.handle()
    }

    pub fn command_id(&self) -> CommandId {
        self.slot.handle().command_id
    }

    /// Non-terminal updates discarded because this consumer fell behind
    pub fn dropped_updates(&self) -> u64 {
        self.slot.dropped_updates()
    }

    /// Await the next response change
    pub async fn recv(&mut self) -> Option<ResponseKind> {
        self.next().await
    }
}

impl Stream for ResponseSubscription {
    type Item = ResponseKind;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.slot.poll_next(cx)
    }
}

impl Drop for ResponseSubscription {
    fn drop(&mut self) {
        if self.slot.is_done() {
            return;
        }
        if let Some(owner) = self.owner.upgrade() {
            owner.release(self.slot.handle());
        }
    }
}

impl std::fmt::Debug for ResponseSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseSubscription")
            .field("handle", &self.slot.handle())
            .field("dropped_updates", &self.slot.dropped_updates())
            .finish()
    }
}
