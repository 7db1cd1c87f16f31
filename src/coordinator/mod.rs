//! # Completion Coordinator
//!
//! [`CommandResponseManager`] is the public operation surface: `submit_track`,
//! `update`, `query`, `subscribe`, `query_final` and `unsubscribe`, built on
//! the response store and the subscription hub.
//!
//! ## Serialization
//!
//! Every mutation (submission, update, aggregation cascade, subscription
//! registration, eviction) runs inside one short synchronous critical section,
//! so updates for the same command never race and a new subscriber observes
//! either the state before a publish or the publish itself, never neither.
//! `query` reads the store directly and does not wait on that section.
//!
//! ## Key Components
//!
//! - [`manager`] - public surface, update path and aggregation cascade
//! - [`retention`] - retention window and eviction of terminal records
//! - [`outcome`] - `query_final` and `query_final_all` results, monitoring counters

pub mod manager;
pub mod outcome;
pub mod retention;

pub use manager::CommandResponseManager;
pub use outcome::{ManagerStats, QueryFinalAllOutcome, QueryFinalOutcome};
