use crate::message::StreamEvent;
use crate::sinker::sink::ActionExecutor;

/// Prints every event it receives, used for the print action.
pub struct LogSink;

impl ActionExecutor for LogSink {
    async fn check(&mut self) -> bool {
        true
    }

    async fn process(&mut self, events: Vec<StreamEvent>) {
        for event in events {
            let columns = event
                .columns
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join(", ");

            tracing::info!(
                stream = %event.stream_name,
                action = %event.action_type,
                event_time = event.event_time.timestamp_millis(),
                "Columns - {columns}"
            );
        }
    }
}
