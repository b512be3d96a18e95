//! Inserts events into a document-collection store, one collection per stream inside the
//! configured database. Collections are created the first time their stream is seen. Each
//! partition is written as one unordered bulk insert per collection.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, error, info};

use crate::Result;
use crate::cache::{CacheSource, Created, RemoteCache};
use crate::config::sink::{CollectionSinkConfig, PartitionSize};
use crate::message::StreamEvent;
use crate::operations::{CollectionOperations, Document};
use crate::sinker::sink::{ActionExecutor, partition};

pub struct CollectionSink<O> {
    operations: O,
    database: String,
    max_batch_size: PartitionSize,
    collections: RemoteCache<()>,
}

/// Collections of the database as listed by the store.
struct Collections<'a, O> {
    operations: &'a O,
    database: &'a str,
}

impl<O: CollectionOperations> CacheSource<()> for Collections<'_, O> {
    async fn load(&mut self) -> Result<HashMap<String, ()>> {
        let collections = self.operations.list_collections(self.database).await?;
        Ok(collections.into_iter().map(|c| (c, ())).collect())
    }

    async fn create(&mut self, collection: &str) -> Result<Created<()>> {
        info!(database = self.database, collection, "Creating collection");
        self.operations
            .create_collection(self.database, collection)
            .await?;
        Ok(Created::Refresh)
    }
}

impl<O: CollectionOperations> CollectionSink<O> {
    pub fn new(operations: O, config: &CollectionSinkConfig) -> Self {
        Self {
            operations,
            database: config.database.clone(),
            max_batch_size: config.max_batch_size,
            collections: RemoteCache::new(),
        }
    }

    async fn write_partition(&mut self, events: &[StreamEvent]) -> Result<()> {
        let mut source = Collections {
            operations: &self.operations,
            database: &self.database,
        };

        let mut documents: BTreeMap<&str, Vec<Document>> = BTreeMap::new();
        for event in events {
            self.collections
                .get_or_create(&event.stream_name, &mut source)
                .await?;
            documents
                .entry(event.stream_name.as_str())
                .or_default()
                .push(Document::from_event(event));
        }

        for (collection, documents) in documents {
            debug!(collection, documents = documents.len(), "Inserting documents");
            self.operations
                .insert_many(&self.database, collection, documents)
                .await?;
        }
        Ok(())
    }
}

impl<O: CollectionOperations> ActionExecutor for CollectionSink<O> {
    async fn check(&mut self) -> bool {
        self.operations.ping().await
    }

    async fn process(&mut self, events: Vec<StreamEvent>) {
        for events in partition(events, self.max_batch_size) {
            if let Err(error) = self.write_partition(&events).await {
                error!(
                    partition_size = events.len(),
                    %error,
                    "Failed to insert partition into the collection store, skipping the remaining partitions"
                );
                self.collections.invalidate();
                return;
            }
        }
    }
}
