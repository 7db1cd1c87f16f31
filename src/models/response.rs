use serde::{Deserialize, Serialize};
use std::fmt;

/// Result payload carried by a `Completed` response
pub type CommandResult = serde_json::Value;

/// Response state of a tracked command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ResponseKind {
    /// No record exists for the identifier; returned, never stored
    Invalid,
    /// Command registered, executor has not taken ownership yet
    Accepted,
    /// Executor owns the command and is working on it
    Started,
    /// Command finished successfully
    Completed(CommandResult),
    /// Command failed with a message
    Error(String),
    /// Command was cancelled before finishing
    Cancelled,
    /// Command rejected because a prerequisite lock is held elsewhere
    Locked,
}

impl ResponseKind {
    /// Check if this is a terminal response (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed(_) | Self::Error(_) | Self::Cancelled | Self::Locked
        )
    }

    /// Terminal responses plus `Invalid`; either one ends a subscription stream
    pub fn ends_stream(&self) -> bool {
        self.is_terminal() || matches!(self, Self::Invalid)
    }

    /// Short name used in logs and lifecycle events
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Invalid => "invalid",
            Self::Accepted => "accepted",
            Self::Started => "started",
            Self::Completed(_) => "completed",
            Self::Error(_) => "error",
            Self::Cancelled => "cancelled",
            Self::Locked => "locked",
        }
    }

    /// Result payload if this is a `Completed` response
    pub fn result(&self) -> Option<&CommandResult> {
        match self {
            Self::Completed(result) => Some(result),
            _ => None,
        }
    }

    /// Error message if this is an `Error` response
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(msg) => Some(msg),
            _ => None,
        }
    }
}

impl fmt::Display for ResponseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed(result) => write!(f, "completed({result})"),
            Self::Error(msg) => write!(f, "error({msg})"),
            other => write!(f, "{}", other.kind_name()),
        }
    }
}
