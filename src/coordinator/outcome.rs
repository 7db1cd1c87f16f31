use crate::models::ResponseKind;
use serde::Serialize;

/// Result of waiting for a command's terminal response
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFinalOutcome {
    /// Terminal response, or `Invalid` for an untracked id
    Response(ResponseKind),
    /// The deadline elapsed first; stored state is untouched
    Timeout,
    /// The caller cancelled the wait or its subscription was unsubscribed
    Cancelled,
}

impl QueryFinalOutcome {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    pub fn response(&self) -> Option<&ResponseKind> {
        match self {
            Self::Response(kind) => Some(kind),
            _ => None,
        }
    }
}

/// Result of waiting on several commands at once
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFinalAllOutcome {
    /// Every command completed
    Success(Vec<QueryFinalOutcome>),
    /// At least one command ended negatively, was unknown, or did not finish in time
    Failure(Vec<QueryFinalOutcome>),
}

impl QueryFinalAllOutcome {
    pub(crate) fn from_outcomes(outcomes: Vec<QueryFinalOutcome>) -> Self {
        let all_completed = outcomes
            .iter()
            .all(|outcome| outcome.response().and_then(ResponseKind::result).is_some());
        if all_completed {
            Self::Success(outcomes)
        } else {
            Self::Failure(outcomes)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Per-command outcomes in request order
    pub fn outcomes(&self) -> &[QueryFinalOutcome] {
        match self {
            Self::Success(outcomes) | Self::Failure(outcomes) => outcomes,
        }
    }
}

/// Point-in-time counters for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ManagerStats {
    pub tracked_commands: usize,
    pub terminal_commands: usize,
    pub live_subscriptions: usize,
}
