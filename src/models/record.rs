use super::{CommandId, ResponseKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stored response state for one command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub id: CommandId,
    pub response: ResponseKind,
    /// Aggregation children, fixed at creation
    pub children: Vec<CommandId>,
    /// Aggregation parent waiting on this command, if any
    pub parent: Option<CommandId>,
    /// Distinguishes this identity from an evicted record with the same id
    pub epoch: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub terminal_at: Option<DateTime<Utc>>,
}

impl CommandRecord {
    pub fn new(id: CommandId, response: ResponseKind, children: Vec<CommandId>, epoch: u64) -> Self {
        let now = Utc::now();
        let terminal_at = response.is_terminal().then_some(now);
        Self {
            id,
            response,
            children,
            parent: None,
            epoch,
            created_at: now,
            updated_at: now,
            terminal_at,
        }
    }

    pub fn is_parent(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn is_terminal(&self) -> bool {
        self.response.is_terminal()
    }

    /// Replace the stored response, stamping timestamps
    pub(crate) fn transition_to(&mut self, response: ResponseKind) {
        let now = Utc::now();
        if response.is_terminal() && self.terminal_at.is_none() {
            self.terminal_at = Some(now);
        }
        self.response = response;
        self.updated_at = now;
    }
}
