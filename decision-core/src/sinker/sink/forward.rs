//! Publishes events to a message broker, one topic per stream. Every event is sent as its JSON
//! encoding, keyed by the stream name so that the events of a stream stay ordered.

use tracing::{debug, error};

use crate::Result;
use crate::config::sink::{ForwardSinkConfig, PartitionSize};
use crate::error::Error;
use crate::message::StreamEvent;
use crate::operations::{EventProducer, ProducerRecord};
use crate::sinker::sink::{ActionExecutor, partition};

impl TryFrom<&StreamEvent> for ProducerRecord {
    type Error = Error;

    fn try_from(event: &StreamEvent) -> Result<Self> {
        let payload = serde_json::to_vec(event)
            .map_err(|e| Error::Encode(format!("event of {}: {e}", event.stream_name)))?;
        Ok(Self {
            topic: event.stream_name.clone(),
            key: event.stream_name.clone(),
            payload,
        })
    }
}

pub struct ForwardSink<P> {
    producer: P,
    topic_prefix: String,
    max_batch_size: PartitionSize,
}

impl<P: EventProducer> ForwardSink<P> {
    pub fn new(producer: P, config: &ForwardSinkConfig) -> Self {
        Self {
            producer,
            topic_prefix: config.topic_prefix.clone(),
            max_batch_size: config.max_batch_size,
        }
    }

    async fn write_partition(&self, events: &[StreamEvent]) -> Result<()> {
        let records = events
            .iter()
            .map(|event| {
                ProducerRecord::try_from(event).map(|mut record| {
                    record.topic.insert_str(0, &self.topic_prefix);
                    record
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(records = records.len(), "Publishing partition");
        self.producer.send(records).await
    }
}

impl<P: EventProducer> ActionExecutor for ForwardSink<P> {
    async fn check(&mut self) -> bool {
        self.producer.is_ready().await
    }

    async fn process(&mut self, events: Vec<StreamEvent>) {
        for events in partition(events, self.max_batch_size) {
            if let Err(error) = self.write_partition(&events).await {
                error!(
                    partition_size = events.len(),
                    %error,
                    "Failed to publish partition, skipping the remaining partitions"
                );
                return;
            }
        }
    }
}
