//! # Subscription Hub
//!
//! Per-command fan-out of response changes to independent observers.
//!
//! Every subscription owns a bounded queue of non-terminal updates and a
//! separate terminal slot. Publishing never blocks: when a queue is full the
//! oldest queued non-terminal update is dropped. The terminal slot is written
//! at most once and is never subject to the drop policy, so each subscription
//! yields exactly one terminal value, after everything queued before it.

use crate::models::{CommandId, ResponseKind};
use dashmap::DashMap;
use futures::task::AtomicWaker;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tracing::debug;

/// Identifies one live subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionHandle {
    pub command_id: CommandId,
    pub subscription_id: u64,
}

impl fmt::Display for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.command_id, self.subscription_id)
    }
}

#[derive(Debug, Default)]
struct SlotState {
    pending: VecDeque<ResponseKind>,
    terminal: Option<ResponseKind>,
    /// Terminal value handed to the consumer
    finished: bool,
    /// Cancelled by unsubscribe
    closed: bool,
    dropped: u64,
}

/// Delivery buffer for a single subscription
#[derive(Debug)]
pub(crate) struct SubscriptionSlot {
    handle: SubscriptionHandle,
    capacity: usize,
    state: Mutex<SlotState>,
    waker: AtomicWaker,
}

impl SubscriptionSlot {
    fn new(handle: SubscriptionHandle, capacity: usize) -> Self {
        Self {
            handle,
            capacity: capacity.max(1),
            state: Mutex::new(SlotState::default()),
            waker: AtomicWaker::new(),
        }
    }

    pub(crate) fn handle(&self) -> SubscriptionHandle {
        self.handle
    }

    /// Queue an update; returns false if the slot no longer accepts updates
    fn push(&self, kind: ResponseKind) -> bool {
        {
            let mut state = self.state.lock();
            if state.finished || state.closed || state.terminal.is_some() {
                return false;
            }

            if kind.ends_stream() {
                state.terminal = Some(kind);
            } else {
                if state.pending.len() >= self.capacity {
                    if let Some(stale) = state.pending.pop_front() {
                        state.dropped += 1;
                        debug!(
                            subscription = %self.handle,
                            dropped_kind = stale.kind_name(),
                            "Subscriber buffer full, dropping oldest non-terminal update"
                        );
                    }
                }
                state.pending.push_back(kind);
            }
        }
        self.waker.wake();
        true
    }

    fn close(&self) -> bool {
        let was_live = {
            let mut state = self.state.lock();
            let was_live = !state.finished && !state.closed;
            state.closed = true;
            state.pending.clear();
            state.terminal = None;
            was_live
        };
        self.waker.wake();
        was_live
    }

    pub(crate) fn poll_next(&self, cx: &mut Context<'_>) -> Poll<Option<ResponseKind>> {
        // Register before inspecting state so a concurrent push cannot be missed
        self.waker.register(cx.waker());

        let mut state = self.state.lock();
        if state.closed || state.finished {
            return Poll::Ready(None);
        }
        if let Some(kind) = state.pending.pop_front() {
            return Poll::Ready(Some(kind));
        }
        if let Some(kind) = state.terminal.take() {
            state.finished = true;
            return Poll::Ready(Some(kind));
        }
        Poll::Pending
    }

    pub(crate) fn is_done(&self) -> bool {
        let state = self.state.lock();
        state.finished || state.closed
    }

    pub(crate) fn dropped_updates(&self) -> u64 {
        self.state.lock().dropped
    }
}

/// Fan-out registry keyed by command
#[derive(Debug)]
pub struct SubscriptionHub {
    subscriptions: DashMap<CommandId, Vec<Arc<SubscriptionSlot>>>,
    next_subscription_id: AtomicU64,
    buffer_capacity: usize,
}

impl SubscriptionHub {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            subscriptions: DashMap::new(),
            next_subscription_id: AtomicU64::new(1),
            buffer_capacity: buffer_capacity.max(1),
        }
    }

    /// Open a subscription seeded with the command's current kind.
    ///
    /// A terminal (or `Invalid`) seed completes the subscription on the spot,
    /// so it is never registered for later publishes.
    pub(crate) fn register(&self, command_id: CommandId, current: ResponseKind) -> Arc<SubscriptionSlot> {
        let handle = SubscriptionHandle {
            command_id,
            subscription_id: self.next_subscription_id.fetch_add(1, Ordering::Relaxed),
        };
        let slot = Arc::new(SubscriptionSlot::new(handle, self.buffer_capacity));
        let finished = current.ends_stream();
        slot.push(current);

        if !finished {
            self.subscriptions
                .entry(command_id)
                .or_default()
                .push(Arc::clone(&slot));
        }
        slot
    }

    /// Deliver a change to every open subscription for `command_id`.
    ///
    /// A terminal kind completes and unregisters all of them. Returns the
    /// number of subscriptions that accepted the update.
    pub(crate) fn publish(&self, command_id: &CommandId, kind: &ResponseKind) -> usize {
        if kind.ends_stream() {
            let Some((_, slots)) = self.subscriptions.remove(command_id) else {
                return 0;
            };
            slots.iter().filter(|slot| slot.push(kind.clone())).count()
        } else {
            self.subscriptions
                .get(command_id)
                .map(|slots| slots.iter().filter(|slot| slot.push(kind.clone())).count())
                .unwrap_or(0)
        }
    }

    /// Cancel one subscription; returns true if it was still waiting
    pub(crate) fn remove(&self, handle: &SubscriptionHandle) -> bool {
        let mut removed = None;
        if let Some(mut slots) = self.subscriptions.get_mut(&handle.command_id) {
            if let Some(pos) = slots.iter().position(|s| s.handle == *handle) {
                removed = Some(slots.swap_remove(pos));
            }
        }
        self.subscriptions
            .remove_if(&handle.command_id, |_, slots| slots.is_empty());

        removed.map(|slot| slot.close()).unwrap_or(false)
    }

    /// Live subscriptions still waiting on `command_id`
    pub fn subscriber_count(&self, command_id: &CommandId) -> usize {
        self.subscriptions
            .get(command_id)
            .map(|slots| slots.len())
            .unwrap_or(0)
    }

    pub fn total_subscriptions(&self) -> usize {
        self.subscriptions.iter().map(|entry| entry.value().len()).sum()
    }
}
