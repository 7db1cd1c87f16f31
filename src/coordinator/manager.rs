use super::outcome::{ManagerStats, QueryFinalAllOutcome, QueryFinalOutcome};
use crate::aggregation::Aggregator;
use crate::config::{CommandResponseConfig, ConfigLoader};
use crate::error::{CommandResponseError, Result};
use crate::events::{ResponseEvent, ResponseEventPublisher};
use crate::models::{CommandId, CommandRecord, ResponseKind};
use crate::store::{ResponseStore, UpdateOrigin, UpsertOutcome};
use crate::subscription::stream::SubscriptionOwner;
use crate::subscription::{ResponseSubscription, SubscriptionHandle, SubscriptionHub};
use futures::future::join_all;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Completion-tracking surface for commanders and executors.
///
/// Cheap to clone; all clones share one store, one hub and one write gate.
#[derive(Clone)]
pub struct CommandResponseManager {
    inner: Arc<ManagerInner>,
}

pub(crate) struct ManagerInner {
    pub(crate) config: CommandResponseConfig,
    pub(crate) store: ResponseStore,
    pub(crate) hub: SubscriptionHub,
    pub(crate) events: ResponseEventPublisher,
    /// Serializes every mutation; never held across an await
    pub(crate) write_gate: Mutex<()>,
    pub(crate) self_ref: Weak<ManagerInner>,
}

impl CommandResponseManager {
    /// Create a manager from an explicit configuration
    pub fn new(config: CommandResponseConfig) -> Result<Self> {
        config.validate()?;

        info!(
            subscription_buffer_capacity = config.subscription_buffer_capacity,
            retention_window_ms = config.retention_window_ms,
            "🏗️ CRM: Creating command response manager"
        );

        Ok(Self::build(config))
    }

    fn build(config: CommandResponseConfig) -> Self {
        let inner = Arc::new_cyclic(|self_ref| ManagerInner {
            store: ResponseStore::new(),
            hub: SubscriptionHub::new(config.subscription_buffer_capacity),
            events: ResponseEventPublisher::new(config.event_channel_capacity),
            write_gate: Mutex::new(()),
            self_ref: self_ref.clone(),
            config,
        });
        Self { inner }
    }

    /// Create a manager from layered configuration sources
    pub fn from_environment() -> Result<Self> {
        Self::new(ConfigLoader::load()?)
    }

    pub fn config(&self) -> &CommandResponseConfig {
        &self.inner.config
    }

    /// Register a new command as `Accepted`, optionally as the aggregation
    /// parent of `children`.
    ///
    /// Children that are not tracked yet are registered as `Accepted` too. A
    /// child may belong to one parent only.
    #[instrument(skip(self, children), fields(command_id = %id, children = children.len()))]
    pub fn submit_track(&self, id: CommandId, children: Vec<CommandId>) -> Result<()> {
        let _gate = self.inner.write_gate.lock();
        let store = &self.inner.store;

        if store.contains(&id) {
            warn!(command_id = %id, "CRM: Rejecting duplicate submit_track");
            return Err(CommandResponseError::AlreadyExists { id });
        }
        self.inner.validate_children(id, &children)?;

        for child in &children {
            if let Some(existing) = store.get(child).and_then(|record| record.parent) {
                warn!(command_id = %id, child = %child, "CRM: Child already aggregated elsewhere");
                return Err(CommandResponseError::invalid_operation(
                    *child,
                    format!("already aggregated by parent {existing}"),
                ));
            }
        }

        store.insert_new(id, ResponseKind::Accepted, children.clone())?;
        self.inner.events.tracked(id, &ResponseKind::Accepted);

        let mut progressed = false;
        for child in &children {
            if store.contains(child) {
                progressed |= store.query(child) != ResponseKind::Accepted;
            } else {
                store.insert_new(*child, ResponseKind::Accepted, Vec::new())?;
                self.inner.events.tracked(*child, &ResponseKind::Accepted);
            }
            store.attach_parent(*child, id)?;
        }

        info!(
            command_id = %id,
            children = children.len(),
            "📋 CRM: Tracking command"
        );

        if !progressed {
            return Ok(());
        }
        let mut settled = Vec::new();
        let result = self.inner.aggregate(id, children[0], &mut settled);
        self.inner.settle(&settled);
        result
    }

    /// Record a new response for `id`, inserting the record on first write.
    ///
    /// Re-applying the current terminal kind is a no-op. Any other change to a
    /// terminal record, and any direct update of an aggregation parent, fails
    /// with `InvalidOperation`.
    #[instrument(skip(self, kind), fields(command_id = %id, kind = kind.kind_name()))]
    pub fn update(&self, id: CommandId, kind: ResponseKind) -> Result<()> {
        let _gate = self.inner.write_gate.lock();
        let mut settled = Vec::new();
        let result = self.inner.apply(id, kind, UpdateOrigin::External, &mut settled);
        self.inner.settle(&settled);
        result
    }

    /// Current response snapshot; `Invalid` for unknown ids. Never blocks on writers.
    pub fn query(&self, id: &CommandId) -> ResponseKind {
        self.inner.store.query(id)
    }

    /// Full record snapshot, including aggregation links and timestamps
    pub fn record(&self, id: &CommandId) -> Option<CommandRecord> {
        self.inner.store.get(id)
    }

    /// Open a stream of response changes for `id`
    pub fn subscribe(&self, id: CommandId) -> ResponseSubscription {
        let slot = {
            let _gate = self.inner.write_gate.lock();
            let current = self.inner.store.query(&id);
            self.inner.hub.register(id, current)
        };
        debug!(subscription = %slot.handle(), "CRM: Subscription opened");

        let owner: Weak<dyn SubscriptionOwner> = self.inner.self_ref.clone();
        ResponseSubscription::new(slot, owner)
    }

    /// Cancel a live subscription. Returns false if it had already finished or
    /// been cancelled.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) -> bool {
        self.inner.release_subscription(*handle)
    }

    /// Wait up to `timeout` for the terminal response of `id`
    #[instrument(skip(self), fields(command_id = %id))]
    pub async fn query_final(&self, id: CommandId, timeout: Duration) -> QueryFinalOutcome {
        self.query_final_with_cancel(id, timeout, CancellationToken::new())
            .await
    }

    /// `query_final` bounded by the configured default timeout
    pub async fn query_final_default(&self, id: CommandId) -> QueryFinalOutcome {
        let timeout = self.inner.config.default_query_final_timeout();
        self.query_final(id, timeout).await
    }

    /// Wait for the terminal response of `id` until it arrives, `timeout`
    /// elapses, or `cancel` fires. The subscription is released in every case.
    pub async fn query_final_with_cancel(
        &self,
        id: CommandId,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> QueryFinalOutcome {
        let mut subscription = self.subscribe(id);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => QueryFinalOutcome::Cancelled,
            waited = tokio::time::timeout(timeout, next_terminal(&mut subscription)) => match waited {
                Ok(Some(kind)) => QueryFinalOutcome::Response(kind),
                Ok(None) => QueryFinalOutcome::Cancelled,
                Err(_) => QueryFinalOutcome::Timeout,
            },
        };
        drop(subscription);

        match &outcome {
            QueryFinalOutcome::Timeout => debug!(command_id = %id, ?timeout, "CRM: query_final timed out"),
            QueryFinalOutcome::Cancelled => debug!(command_id = %id, "CRM: query_final cancelled"),
            QueryFinalOutcome::Response(kind) => {
                debug!(command_id = %id, kind = kind.kind_name(), "CRM: query_final resolved")
            }
        }
        outcome
    }

    /// Wait up to `timeout` for the terminal responses of all `ids`.
    ///
    /// Every id is awaited concurrently under the same deadline. The outcomes
    /// come back in `ids` order; the wait succeeds only if every command
    /// completed.
    #[instrument(skip(self, ids), fields(commands = ids.len()))]
    pub async fn query_final_all(
        &self,
        ids: &[CommandId],
        timeout: Duration,
    ) -> QueryFinalAllOutcome {
        let outcomes = join_all(ids.iter().map(|id| self.query_final(*id, timeout))).await;
        let outcome = QueryFinalAllOutcome::from_outcomes(outcomes);

        if !outcome.is_success() {
            debug!(commands = ids.len(), "CRM: query_final_all finished with a failure");
        }
        outcome
    }

    /// Declared aggregation children of `id`
    pub fn children_of(&self, id: &CommandId) -> Option<Vec<CommandId>> {
        self.inner.store.get(id).map(|record| record.children)
    }

    /// Aggregation parent waiting on `id`
    pub fn parent_of(&self, id: &CommandId) -> Option<CommandId> {
        self.inner.store.get(id).and_then(|record| record.parent)
    }

    /// Subscriptions still waiting on `id`
    pub fn subscriber_count(&self, id: &CommandId) -> usize {
        self.inner.hub.subscriber_count(id)
    }

    /// Evict `id` now if it is terminal and nothing still depends on it
    pub fn evict(&self, id: &CommandId) -> bool {
        let _gate = self.inner.write_gate.lock();
        match self.inner.store.get(id) {
            Some(record) if self.inner.is_evictable(&record) => {
                self.inner.evict_locked(id);
                true
            }
            _ => false,
        }
    }

    /// Listen to lifecycle events for every stored change
    pub fn lifecycle_events(&self) -> broadcast::Receiver<ResponseEvent> {
        self.inner.events.subscribe()
    }

    pub fn stats(&self) -> ManagerStats {
        ManagerStats {
            tracked_commands: self.inner.store.len(),
            terminal_commands: self.inner.store.terminal_count(),
            live_subscriptions: self.inner.hub.total_subscriptions(),
        }
    }
}

impl Default for CommandResponseManager {
    fn default() -> Self {
        Self::build(CommandResponseConfig::default())
    }
}

impl std::fmt::Debug for CommandResponseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandResponseManager")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish()
    }
}

async fn next_terminal(subscription: &mut ResponseSubscription) -> Option<ResponseKind> {
    while let Some(kind) = subscription.next().await {
        if kind.ends_stream() {
            return Some(kind);
        }
    }
    None
}

impl ManagerInner {
    fn validate_children(&self, id: CommandId, children: &[CommandId]) -> Result<()> {
        if children.len() > self.config.max_children {
            return Err(CommandResponseError::invalid_operation(
                id,
                format!(
                    "{} children exceeds the limit of {}",
                    children.len(),
                    self.config.max_children
                ),
            ));
        }

        let mut seen = HashSet::with_capacity(children.len());
        for child in children {
            if *child == id {
                return Err(CommandResponseError::invalid_operation(
                    id,
                    "a command cannot aggregate itself",
                ));
            }
            if !seen.insert(*child) {
                return Err(CommandResponseError::invalid_operation(
                    id,
                    format!("child {child} declared more than once"),
                ));
            }
        }
        Ok(())
    }

    /// Store, publish and propagate one change. Caller holds the write gate.
    ///
    /// Ids that turned terminal are pushed to `settled`; the caller hands them
    /// to `settle` once the whole aggregation cascade is done.
    pub(crate) fn apply(
        &self,
        id: CommandId,
        kind: ResponseKind,
        origin: UpdateOrigin,
        settled: &mut Vec<CommandId>,
    ) -> Result<()> {
        let outcome = self
            .store
            .upsert(id, kind.clone(), None, origin)
            .inspect_err(|e| warn!(command_id = %id, error = %e, "CRM: Update rejected"))?;

        match outcome {
            UpsertOutcome::Unchanged => {
                debug!(command_id = %id, kind = kind.kind_name(), "CRM: Repeated update ignored");
                return Ok(());
            }
            UpsertOutcome::Inserted => self.events.tracked(id, &kind),
            UpsertOutcome::Changed { ref previous } => self.events.transitioned(id, previous, &kind),
        }

        let delivered = self.hub.publish(&id, &kind);
        if kind.is_terminal() {
            info!(
                command_id = %id,
                kind = kind.kind_name(),
                delivered,
                "✅ CRM: Terminal response recorded"
            );
            settled.push(id);
        } else {
            debug!(command_id = %id, kind = kind.kind_name(), delivered, "CRM: Response updated");
        }

        if let Some(parent) = self.store.get(&id).and_then(|record| record.parent) {
            self.aggregate(parent, id, settled)?;
        }
        Ok(())
    }

    /// Recompute `parent` after `trigger` changed. Caller holds the write gate.
    pub(crate) fn aggregate(
        &self,
        parent: CommandId,
        trigger: CommandId,
        settled: &mut Vec<CommandId>,
    ) -> Result<()> {
        let Some(record) = self.store.get(&parent) else {
            let err = CommandResponseError::aggregation_invariant(
                parent,
                trigger,
                "child references a parent that is not tracked",
            );
            error!(error = %err, "❌ CRM: Aggregation invariant violated");
            return Err(err);
        };

        if record.is_terminal() {
            return Ok(());
        }

        let mut statuses = Vec::with_capacity(record.children.len());
        for child in &record.children {
            let kind = self.store.query(child);
            if matches!(kind, ResponseKind::Invalid) {
                let err = CommandResponseError::aggregation_invariant(
                    parent,
                    *child,
                    "declared child is not tracked",
                );
                error!(error = %err, "❌ CRM: Aggregation invariant violated");
                return Err(err);
            }
            statuses.push((*child, kind));
        }

        let derived = Aggregator::compute(&statuses);
        if derived == record.response {
            return Ok(());
        }

        debug!(
            parent = %parent,
            trigger = %trigger,
            derived = derived.kind_name(),
            "CRM: Aggregated parent response"
        );
        self.apply(parent, derived, UpdateOrigin::Aggregator, settled)
    }

    /// Terminal publishes unregister every slot, so releasing one never
    /// changes whether its record is evictable.
    pub(crate) fn release_subscription(&self, handle: SubscriptionHandle) -> bool {
        let _gate = self.write_gate.lock();
        let was_live = self.hub.remove(&handle);
        if was_live {
            debug!(subscription = %handle, "CRM: Subscription cancelled");
        }
        was_live
    }
}

impl SubscriptionOwner for ManagerInner {
    fn release(&self, handle: SubscriptionHandle) {
        self.release_subscription(handle);
    }
}
