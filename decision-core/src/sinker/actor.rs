use tokio::sync::mpsc::Receiver;
use tokio::sync::oneshot;
use tracing::debug;

use crate::message::StreamEvent;
use crate::sinker::sink::ActionExecutor;

/// ExecutorActorMessage is a message that is sent to the ExecutorActor.
pub(super) enum ExecutorActorMessage {
    Check {
        respond_to: oneshot::Sender<bool>,
    },
    Process {
        events: Vec<StreamEvent>,
        respond_to: oneshot::Sender<()>,
    },
}

/// ExecutorActor is an actor that owns an [ActionExecutor] and feeds it the groups of every tick.
pub(super) struct ExecutorActor<T> {
    actor_messages: Receiver<ExecutorActorMessage>,
    executor: T,
}

impl<T> ExecutorActor<T>
where
    T: ActionExecutor,
{
    pub(super) fn new(actor_messages: Receiver<ExecutorActorMessage>, executor: T) -> Self {
        Self {
            actor_messages,
            executor,
        }
    }

    async fn handle_message(&mut self, msg: ExecutorActorMessage) {
        match msg {
            ExecutorActorMessage::Check { respond_to } => {
                let _ = respond_to.send(self.executor.check().await);
            }
            ExecutorActorMessage::Process { events, respond_to } => {
                debug!(events = events.len(), "Processing action group");
                self.executor.process(events).await;
                let _ = respond_to.send(());
            }
        }
    }

    pub(super) async fn run(mut self) {
        while let Some(msg) = self.actor_messages.recv().await {
            self.handle_message(msg).await;
        }
    }
}
