#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Command Response Manager
//!
//! Completion tracking for commands that components submit to other
//! components and that finish asynchronously, possibly in several steps and
//! possibly by delegating to child commands.
//!
//! ## Overview
//!
//! A commander needs three things from a submitted command: fire-and-forget
//! submission, a non-blocking snapshot of its status, and a bounded wait for
//! its terminal outcome. Any number of observers may watch the same command.
//! Executors report progress through [`CommandResponseManager::update`]; the
//! manager records it, fans it out to subscribers, and recomputes any
//! aggregation parent waiting on the command.
//!
//! ## Module Organization
//!
//! - [`models`] - `CommandId`, `ResponseKind`, `CommandRecord`, id generators
//! - [`store`] - authoritative response state per command
//! - [`subscription`] - bounded per-subscriber fan-out and the response stream
//! - [`aggregation`] - parent response derived from child responses
//! - [`coordinator`] - public operation surface, retention and eviction
//! - [`events`] - lifecycle event broadcast
//! - [`config`] - layered configuration
//! - [`error`] - structured error handling
//! - [`logging`] - optional subscriber setup for hosts
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use command_response_manager::{
//!     CommandIdGenerator, CommandResponseManager, QueryFinalOutcome, ResponseKind,
//!     UuidCommandIdGenerator,
//! };
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let crm = CommandResponseManager::default();
//! let id = UuidCommandIdGenerator.next_id();
//!
//! crm.submit_track(id, vec![])?;
//! crm.update(id, ResponseKind::Started)?;
//!
//! let executor = crm.clone();
//! tokio::spawn(async move {
//!     let _ = executor.update(id, ResponseKind::Completed(serde_json::json!(42)));
//! });
//!
//! match crm.query_final(id, Duration::from_secs(5)).await {
//!     QueryFinalOutcome::Response(kind) => println!("finished: {kind}"),
//!     QueryFinalOutcome::Timeout => println!("still running"),
//!     QueryFinalOutcome::Cancelled => println!("gave up"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregation;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod store;
pub mod subscription;

pub use aggregation::Aggregator;
pub use config::{CommandResponseConfig, ConfigLoader, ConfigurationError};
pub use coordinator::{
    CommandResponseManager, ManagerStats, QueryFinalAllOutcome, QueryFinalOutcome,
};
pub use error::{CommandResponseError, Result};
pub use events::{ResponseEvent, ResponseEventPublisher};
pub use models::{
    CommandId, CommandIdGenerator, CommandRecord, CommandResult, NodeSequenceIdGenerator,
    ResponseKind, UuidCommandIdGenerator,
};
pub use subscription::{ResponseSubscription, SubscriptionHandle};
