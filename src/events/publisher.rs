use crate::constants::events;
use crate::models::{CommandId, ResponseKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

/// Lifecycle event publisher for response transitions
#[derive(Debug, Clone)]
pub struct ResponseEventPublisher {
    sender: broadcast::Sender<ResponseEvent>,
}

/// Event describing one stored change for a command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseEvent {
    pub name: &'static str,
    pub command_id: CommandId,
    /// Previous stored kind; `None` when the record was just created
    pub from: Option<ResponseKind>,
    pub to: ResponseKind,
    pub published_at: DateTime<Utc>,
}

impl ResponseEventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub(crate) fn tracked(&self, command_id: CommandId, to: &ResponseKind) {
        self.send(events::COMMAND_TRACKED, command_id, None, to.clone());
    }

    pub(crate) fn transitioned(&self, command_id: CommandId, from: &ResponseKind, to: &ResponseKind) {
        self.send(
            events::COMMAND_TRANSITIONED,
            command_id,
            Some(from.clone()),
            to.clone(),
        );
    }

    pub(crate) fn evicted(&self, command_id: CommandId, last: &ResponseKind) {
        self.send(
            events::COMMAND_EVICTED,
            command_id,
            Some(last.clone()),
            ResponseKind::Invalid,
        );
    }

    fn send(
        &self,
        name: &'static str,
        command_id: CommandId,
        from: Option<ResponseKind>,
        to: ResponseKind,
    ) {
        let event = ResponseEvent {
            name,
            command_id,
            from,
            to,
            published_at: Utc::now(),
        };

        // No receivers is fine; events are published whether or not anyone listens
        let _ = self.sender.send(event);
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<ResponseEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active listeners
    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ResponseEventPublisher {
    fn default() -> Self {
        Self::new(crate::constants::defaults::EVENT_CHANNEL_CAPACITY)
    }
}
