//! # Error Types
//!
//! Failures that indicate a caller bug or store corruption. Unknown ids and
//! elapsed deadlines are ordinary data (`ResponseKind::Invalid`,
//! `QueryFinalOutcome::Timeout`) and never show up here.

use crate::config::ConfigurationError;
use crate::models::CommandId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CommandResponseError {
    #[error("Command {id} is already tracked")]
    AlreadyExists { id: CommandId },

    #[error("Invalid operation on command {id}: {reason}")]
    InvalidOperation { id: CommandId, reason: String },

    #[error("Aggregation invariant violated for parent {parent} and child {child}: {reason}")]
    AggregationInvariant {
        parent: CommandId,
        child: CommandId,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

impl CommandResponseError {
    pub(crate) fn invalid_operation(id: CommandId, reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            id,
            reason: reason.into(),
        }
    }

    pub(crate) fn aggregation_invariant(
        parent: CommandId,
        child: CommandId,
        reason: impl Into<String>,
    ) -> Self {
        Self::AggregationInvariant {
            parent,
            child,
            reason: reason.into(),
        }
    }

    /// Invariant violations signal data corruption rather than caller error
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AggregationInvariant { .. })
    }
}

pub type Result<T> = std::result::Result<T, CommandResponseError>;
