use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::Result;
use crate::error::Error;
use crate::message::ActionType;
use crate::sinker::actor::{ExecutorActor, ExecutorActorMessage};
use crate::sinker::sink::{ActionDispatcher, ActionExecutor};

const DEFAULT_CHANNEL_SIZE: usize = 10;

type SpawnActor = Box<dyn FnOnce(mpsc::Receiver<ExecutorActorMessage>) -> JoinHandle<()> + Send>;

/// ActionDispatcherBuilder spawns one actor per registered executor. An executor only becomes
/// active if its health check passes when the dispatcher is built.
pub struct ActionDispatcherBuilder {
    channel_size: usize,
    executors: Vec<(ActionType, SpawnActor)>,
}

impl Default for ActionDispatcherBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionDispatcherBuilder {
    pub fn new() -> Self {
        Self {
            channel_size: DEFAULT_CHANNEL_SIZE,
            executors: Vec::new(),
        }
    }

    /// Number of pending groups an executor actor buffers.
    pub fn channel_size(mut self, channel_size: usize) -> Self {
        self.channel_size = channel_size.max(1);
        self
    }

    /// Registers the executor of `action`, replacing any executor registered before for it.
    pub fn executor<T>(mut self, action: ActionType, executor: T) -> Self
    where
        T: ActionExecutor + 'static,
    {
        self.executors.retain(|(registered, _)| *registered != action);
        self.executors.push((
            action,
            Box::new(move |rx| tokio::spawn(ExecutorActor::new(rx, executor).run())),
        ));
        self
    }

    /// Spawns the executor actors and keeps the ones whose store is alive.
    pub async fn build(self) -> Result<ActionDispatcher> {
        let mut executors = HashMap::new();
        for (action, spawn) in self.executors {
            let (sender, rx) = mpsc::channel(self.channel_size);
            spawn(rx);

            let (respond_to, check) = oneshot::channel();
            sender
                .send(ExecutorActorMessage::Check { respond_to })
                .await
                .map_err(|e| Error::ActorPatternRecv(format!("{action} executor is gone: {e}")))?;
            let alive = check
                .await
                .map_err(|e| Error::ActorPatternRecv(e.to_string()))?;

            if alive {
                info!(%action, "Action executor is active");
                executors.insert(action, sender);
            } else {
                // dropping the sender stops the actor
                warn!(%action, "Action executor failed its health check, skipping it");
            }
        }
        Ok(ActionDispatcher::new(executors))
    }
}
