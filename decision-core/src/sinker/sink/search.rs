//! Indexes events into a search engine, one index per stream. The index name is the stream name
//! in lower case. A missing index is created with a mapping derived from the columns of the event
//! that revealed it, then every partition is sent as a single bulk request.

use std::collections::HashMap;

use tracing::{debug, error, info};

use crate::Result;
use crate::cache::{CacheSource, Created, RemoteCache};
use crate::config::sink::{PartitionSize, SearchSinkConfig};
use crate::error::Error;
use crate::message::{Column, StreamEvent};
use crate::operations::{Document, IndexMapping, IndexRequest, SearchOperations};
use crate::sinker::sink::{ActionExecutor, partition};

/// Index holding the events of `stream`.
pub fn index_name(stream: &str) -> String {
    stream.to_ascii_lowercase()
}

pub struct SearchSink<O> {
    operations: O,
    max_batch_size: PartitionSize,
    indices: RemoteCache<()>,
}

struct Indices<'a, O> {
    operations: &'a O,
    columns: &'a [Column],
}

impl<O: SearchOperations> CacheSource<()> for Indices<'_, O> {
    async fn load(&mut self) -> Result<HashMap<String, ()>> {
        let indices = self.operations.list_indices().await?;
        Ok(indices.into_iter().map(|i| (i, ())).collect())
    }

    async fn create(&mut self, index: &str) -> Result<Created<()>> {
        info!(index, fields = self.columns.len(), "Creating index");
        self.operations
            .create_index(&IndexMapping::new(index, self.columns))
            .await?;
        Ok(Created::Refresh)
    }
}

impl<O: SearchOperations> SearchSink<O> {
    pub fn new(operations: O, config: &SearchSinkConfig) -> Self {
        Self {
            operations,
            max_batch_size: config.max_batch_size,
            indices: RemoteCache::new(),
        }
    }

    async fn write_partition(&mut self, events: &[StreamEvent]) -> Result<()> {
        let mut requests = Vec::with_capacity(events.len());
        for event in events {
            let index = index_name(&event.stream_name);
            let mut source = Indices {
                operations: &self.operations,
                columns: &event.columns,
            };
            self.indices.get_or_create(&index, &mut source).await?;
            requests.push(IndexRequest {
                index,
                document: Document::from_event(event),
            });
        }

        let total = requests.len();
        debug!(requests = total, "Sending bulk request");
        let response = self.operations.bulk(requests).await?;
        match response.failures.first() {
            None => Ok(()),
            Some(first) => Err(Error::Store(format!(
                "{} of {total} documents rejected, first: {first}",
                response.failures.len()
            ))),
        }
    }
}

impl<O: SearchOperations> ActionExecutor for SearchSink<O> {
    async fn check(&mut self) -> bool {
        self.operations.cluster_health().await
    }

    async fn process(&mut self, events: Vec<StreamEvent>) {
        for events in partition(events, self.max_batch_size) {
            if let Err(error) = self.write_partition(&events).await {
                error!(
                    partition_size = events.len(),
                    %error,
                    "Failed to index partition into the search engine, skipping the remaining partitions"
                );
                self.indices.invalidate();
                return;
            }
        }
    }
}
