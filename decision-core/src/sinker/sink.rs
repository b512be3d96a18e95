use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::Result;
use crate::config::sink::PartitionSize;
use crate::error::Error;
use crate::message::{ActionType, StreamEvent};
use crate::sinker::actor::ExecutorActorMessage;

/// Columnar store executor, one table per stream.
#[path = "sink/columnar.rs"]
pub mod columnar;

/// Document store executor, one core per stream.
#[path = "sink/document.rs"]
pub mod document;

/// Document-collection store executor, one collection per stream.
#[path = "sink/collection.rs"]
pub mod collection;

/// Search engine executor, one index per stream.
#[path = "sink/search.rs"]
pub mod search;

/// Publishes events to a message broker.
#[path = "sink/forward.rs"]
pub mod forward;

/// [log] executor prints the events of a micro-batch.
#[path = "sink/log.rs"]
pub mod log;

/// Set of items to be implemented by the executor of an action type.
#[trait_variant::make(ActionExecutor: Send)]
#[allow(dead_code, async_fn_in_trait)]
pub trait LocalActionExecutor {
    /// Health check of the store behind the executor. Never fails, an unreachable store is
    /// reported as `false`.
    async fn check(&mut self) -> bool;

    /// Writes the events of one action group. Failures are logged, never returned.
    async fn process(&mut self, events: Vec<StreamEvent>);
}

/// Splits `items` into consecutive partitions of at most `size` items, in order.
pub fn partition<T>(items: Vec<T>, size: PartitionSize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }

    let chunk_len = size.chunk_len(items.len());
    let mut partitions = Vec::with_capacity(items.len().div_ceil(chunk_len));
    let mut items = items.into_iter().peekable();
    while items.peek().is_some() {
        partitions.push(items.by_ref().take(chunk_len).collect());
    }
    partitions
}

/// Groups a flat micro-batch by the action type of its events, keeping the event order within
/// each group.
pub fn group_by_action(
    events: impl IntoIterator<Item = StreamEvent>,
) -> HashMap<ActionType, Vec<StreamEvent>> {
    let mut groups: HashMap<ActionType, Vec<StreamEvent>> = HashMap::new();
    for event in events {
        groups.entry(event.action_type).or_default().push(event);
    }
    groups
}

/// Routes the action groups of every tick to the actors of the active executors. Cloning is
/// cheap, all clones talk to the same actors.
#[derive(Clone)]
pub struct ActionDispatcher {
    executors: HashMap<ActionType, mpsc::Sender<ExecutorActorMessage>>,
}

impl ActionDispatcher {
    pub(super) fn new(executors: HashMap<ActionType, mpsc::Sender<ExecutorActorMessage>>) -> Self {
        Self { executors }
    }

    pub fn is_active(&self, action: ActionType) -> bool {
        self.executors.contains_key(&action)
    }

    pub fn active_actions(&self) -> Vec<ActionType> {
        let mut actions: Vec<_> = self.executors.keys().copied().collect();
        actions.sort();
        actions
    }

    /// Probes the executor of `action`. Action types without an active executor are not alive.
    pub async fn check(&self, action: ActionType) -> Result<bool> {
        let Some(sender) = self.executors.get(&action) else {
            return Ok(false);
        };

        let (respond_to, rx) = oneshot::channel();
        sender
            .send(ExecutorActorMessage::Check { respond_to })
            .await
            .map_err(|e| Error::ActorPatternRecv(format!("{action} executor is gone: {e}")))?;
        rx.await
            .map_err(|e| Error::ActorPatternRecv(e.to_string()))
    }

    /// Hands every non-empty group to its executor and waits until all of them are processed.
    /// Groups of different action types are processed concurrently.
    pub async fn dispatch(&self, groups: HashMap<ActionType, Vec<StreamEvent>>) -> Result<()> {
        let mut pending = Vec::with_capacity(groups.len());
        for (action, events) in groups {
            if events.is_empty() {
                continue;
            }

            let Some(sender) = self.executors.get(&action) else {
                warn!(%action, dropped = events.len(), "No active executor, dropping events");
                continue;
            };

            let (respond_to, rx) = oneshot::channel();
            sender
                .send(ExecutorActorMessage::Process { events, respond_to })
                .await
                .map_err(|e| Error::ActorPatternRecv(format!("{action} executor is gone: {e}")))?;
            pending.push(rx);
        }

        for rx in pending {
            rx.await
                .map_err(|e| Error::ActorPatternRecv(e.to_string()))?;
        }
        Ok(())
    }
}
