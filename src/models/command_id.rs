//! # Command Identifiers
//!
//! `CommandId` is the unit of lookup for every response-manager operation. The
//! manager never mints identifiers itself; submitters obtain them from a
//! [`CommandIdGenerator`] (or any other deployment-wide unique source) and hand
//! them in as opaque values.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Immutable, globally unique command identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandId(Uuid);

impl CommandId {
    /// Wrap an externally supplied identifier
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Underlying UUID value
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for CommandId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CommandId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| format!("Invalid command id '{s}': {e}"))
    }
}

/// Source of deployment-wide unique command identifiers
pub trait CommandIdGenerator: Send + Sync {
    /// Mint a new identifier; never returns the same value twice
    fn next_id(&self) -> CommandId;
}

/// Random v4 UUID generator
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidCommandIdGenerator;

impl CommandIdGenerator for UuidCommandIdGenerator {
    fn next_id(&self) -> CommandId {
        CommandId(Uuid::new_v4())
    }
}

/// Node-prefixed monotonic generator.
///
/// The high 64 bits carry the node identity and the low 64 bits a per-process
/// counter, so two nodes with distinct `node_id` values never collide.
#[derive(Debug)]
pub struct NodeSequenceIdGenerator {
    node_id: u64,
    sequence: AtomicU64,
}

impl NodeSequenceIdGenerator {
    pub fn new(node_id: u64) -> Self {
        Self {
            node_id,
            sequence: AtomicU64::new(1),
        }
    }

    pub fn node_id(&self) -> u64 {
        self.node_id
    }
}

impl CommandIdGenerator for NodeSequenceIdGenerator {
    fn next_id(&self) -> CommandId {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let bits = (u128::from(self.node_id) << 64) | u128::from(seq);
        CommandId(Uuid::from_u128(bits))
    }
}
