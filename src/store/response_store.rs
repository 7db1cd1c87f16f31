//! # Response Store
//!
//! Authoritative response state per `CommandId`.
//!
//! Reads go straight to the sharded map and never wait on the coordinator's
//! write gate. Mutating methods are crate-private: the coordinator calls them
//! while holding its gate, publishes the resulting change to subscribers and
//! drives aggregation from the returned [`UpsertOutcome`].

use crate::error::{CommandResponseError, Result};
use crate::models::{CommandId, CommandRecord, ResponseKind};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Who is asking for a state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOrigin {
    /// An executor or other collaborator outside the core
    External,
    /// The aggregator recomputing a parent from its children
    Aggregator,
}

/// Result of a successful `upsert`
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    /// First write for this id
    Inserted,
    /// Stored kind changed from `previous`
    Changed { previous: ResponseKind },
    /// Same kind re-applied; nothing stored changed
    Unchanged,
}

#[derive(Debug, Default)]
pub struct ResponseStore {
    records: DashMap<CommandId, CommandRecord>,
    next_epoch: AtomicU64,
}

impl ResponseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest recorded kind, or `Invalid` if the id is unknown
    pub fn query(&self, id: &CommandId) -> ResponseKind {
        self.records
            .get(id)
            .map(|record| record.response.clone())
            .unwrap_or(ResponseKind::Invalid)
    }

    /// Snapshot of the full record
    pub fn get(&self, id: &CommandId) -> Option<CommandRecord> {
        self.records.get(id).map(|record| record.clone())
    }

    pub fn contains(&self, id: &CommandId) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn terminal_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_terminal()).count()
    }

    fn mint_epoch(&self) -> u64 {
        self.next_epoch.fetch_add(1, Ordering::Relaxed)
    }

    /// Create a brand-new record; fails if the id is already tracked
    pub(crate) fn insert_new(
        &self,
        id: CommandId,
        kind: ResponseKind,
        children: Vec<CommandId>,
    ) -> Result<()> {
        match self.records.entry(id) {
            Entry::Occupied(_) => Err(CommandResponseError::AlreadyExists { id }),
            Entry::Vacant(slot) => {
                let epoch = self.mint_epoch();
                slot.insert(CommandRecord::new(id, kind, children, epoch));
                Ok(())
            }
        }
    }

    /// Insert or transition a record.
    ///
    /// Fails with `InvalidOperation` when the record is already terminal with a
    /// different kind, when an external caller targets a parent, when
    /// `children` conflicts with the children fixed at creation, or when the
    /// transition would move backwards.
    pub(crate) fn upsert(
        &self,
        id: CommandId,
        kind: ResponseKind,
        children: Option<&[CommandId]>,
        origin: UpdateOrigin,
    ) -> Result<UpsertOutcome> {
        if matches!(kind, ResponseKind::Invalid) {
            return Err(CommandResponseError::invalid_operation(
                id,
                "invalid is an absence state and cannot be stored",
            ));
        }

        match self.records.entry(id) {
            Entry::Vacant(slot) => {
                let children = children.map(<[CommandId]>::to_vec).unwrap_or_default();
                if !children.is_empty() && origin == UpdateOrigin::External {
                    return Err(CommandResponseError::invalid_operation(
                        id,
                        "aggregation parents must be registered with submit_track",
                    ));
                }
                let epoch = self.mint_epoch();
                slot.insert(CommandRecord::new(id, kind, children, epoch));
                Ok(UpsertOutcome::Inserted)
            }
            Entry::Occupied(mut slot) => {
                let record = slot.get_mut();

                if let Some(children) = children {
                    if record.children.as_slice() != children {
                        return Err(CommandResponseError::invalid_operation(
                            id,
                            "children are fixed at creation and cannot be changed",
                        ));
                    }
                }

                if record.is_parent() && origin == UpdateOrigin::External {
                    return Err(CommandResponseError::invalid_operation(
                        id,
                        "response of a command with children is derived from its children",
                    ));
                }

                if record.response == kind {
                    return Ok(UpsertOutcome::Unchanged);
                }

                if record.is_terminal() {
                    return Err(CommandResponseError::invalid_operation(
                        id,
                        format!(
                            "already terminal with {}, refusing {}",
                            record.response.kind_name(),
                            kind.kind_name()
                        ),
                    ));
                }

                if matches!(
                    (&record.response, &kind),
                    (ResponseKind::Started, ResponseKind::Accepted)
                ) {
                    return Err(CommandResponseError::invalid_operation(
                        id,
                        "cannot move from started back to accepted",
                    ));
                }

                let previous = record.response.clone();
                record.transition_to(kind);
                Ok(UpsertOutcome::Changed { previous })
            }
        }
    }

    /// Link `child` to its aggregation parent
    pub(crate) fn attach_parent(&self, child: CommandId, parent: CommandId) -> Result<()> {
        let mut record = self.records.get_mut(&child).ok_or_else(|| {
            CommandResponseError::aggregation_invariant(parent, child, "child record is missing")
        })?;

        match record.parent {
            Some(existing) if existing != parent => Err(CommandResponseError::invalid_operation(
                child,
                format!("already aggregated by parent {existing}"),
            )),
            _ => {
                record.parent = Some(parent);
                Ok(())
            }
        }
    }

    /// Drop the parent link if it still points at `parent`
    pub(crate) fn detach_parent(&self, child: &CommandId, parent: &CommandId) {
        if let Some(mut record) = self.records.get_mut(child) {
            if record.parent.as_ref() == Some(parent) {
                record.parent = None;
            }
        }
    }

    /// Evict a record; the coordinator confirms no interest remains first
    pub(crate) fn remove(&self, id: &CommandId) -> Option<CommandRecord> {
        self.records.remove(id).map(|(_, record)| record)
    }
}
