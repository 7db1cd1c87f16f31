//! # Models
//!
//! Value types shared by the store, the subscription hub and the coordinator.

pub mod command_id;
pub mod record;
pub mod response;

pub use command_id::{CommandId, CommandIdGenerator, NodeSequenceIdGenerator, UuidCommandIdGenerator};
pub use record::CommandRecord;
pub use response::{CommandResult, ResponseKind};
