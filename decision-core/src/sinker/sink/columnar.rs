//! Persists events into a columnar store with one table per stream. The schema of a table
//! follows the events: a table is created the first time its stream is seen and altered
//! whenever an event carries columns the table does not have.
//!
//! Each partition of a micro-batch is written as one write batch, atomic at the store level.
//! Nothing is atomic across partitions.

use std::collections::HashMap;

use tracing::{debug, error, info};

use crate::Result;
use crate::cache::{CacheSource, Created, RemoteCache};
use crate::config::sink::{BatchType, ColumnarSinkConfig, PartitionSize};
use crate::message::{Column, ColumnSet, StreamEvent, TIMESTAMP_FIELD};
use crate::operations::{ColumnarOperations, WriteBatch};
use crate::sinker::sink::{ActionExecutor, partition};

pub struct ColumnarSink<O> {
    operations: O,
    keyspace: String,
    max_batch_size: PartitionSize,
    batch_type: BatchType,
    /// Column set of every table, keyed by stream.
    schemas: RemoteCache<ColumnSet>,
}

/// Table schemas as seen by the store metadata. Creating a missing table needs the columns of
/// the event that revealed it.
struct TableSchemas<'a, O> {
    operations: &'a O,
    columns: &'a [Column],
}

impl<O: ColumnarOperations> CacheSource<ColumnSet> for TableSchemas<'_, O> {
    async fn load(&mut self) -> Result<HashMap<String, ColumnSet>> {
        self.operations.refresh_schema_cache().await?;
        self.operations.known_schemas().await
    }

    async fn create(&mut self, stream: &str) -> Result<Created<ColumnSet>> {
        info!(stream, columns = self.columns.len(), "Creating table");
        self.operations
            .create_table(stream, self.columns, TIMESTAMP_FIELD)
            .await?;
        Ok(Created::Refresh)
    }
}

impl<O: ColumnarOperations> ColumnarSink<O> {
    pub fn new(operations: O, config: &ColumnarSinkConfig) -> Self {
        Self {
            operations,
            keyspace: config.keyspace.clone(),
            max_batch_size: config.max_batch_size,
            batch_type: config.batch_type,
            schemas: RemoteCache::new(),
        }
    }

    /// Makes sure the keyspace exists and the schema cache is loaded. Only does work when the
    /// cache is not loaded yet.
    async fn prepare(&mut self) -> Result<()> {
        if self.schemas.is_loaded() {
            return Ok(());
        }

        if !self.operations.check_keyspace().await? {
            info!(keyspace = %self.keyspace, "Creating keyspace");
            self.operations.create_keyspace(&self.keyspace).await?;
        }

        let mut source = TableSchemas {
            operations: &self.operations,
            columns: &[],
        };
        self.schemas.refresh(&mut source).await
    }

    /// Brings the table of the event's stream in line with the columns the event carries.
    async fn reconcile(&mut self, event: &StreamEvent) -> Result<()> {
        let mut source = TableSchemas {
            operations: &self.operations,
            columns: &event.columns,
        };
        let known = self
            .schemas
            .get_or_create(&event.stream_name, &mut source)
            .await?;

        if event.column_set().is_subset(known) {
            return Ok(());
        }

        let added: Vec<Column> = event
            .columns
            .iter()
            .filter(|c| !known.contains(&c.name))
            .cloned()
            .collect();
        if added.is_empty() {
            return Ok(());
        }

        info!(
            stream = %event.stream_name,
            added = ?added.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "Altering table"
        );
        self.operations
            .alter_table(&event.stream_name, known, &added)
            .await?;
        self.schemas.refresh(&mut source).await
    }

    async fn write_partition(&mut self, events: &[StreamEvent]) -> Result<()> {
        let mut batch = WriteBatch::new(self.batch_type);
        for event in events {
            self.reconcile(event).await?;
            batch.push(self.operations.build_insert(
                &event.stream_name,
                &event.columns,
                TIMESTAMP_FIELD,
            )?);
        }

        debug!(
            statements = batch.len(),
            batch_type = %self.batch_type,
            "Executing write batch"
        );
        self.operations.execute_batch(batch).await
    }
}

impl<O: ColumnarOperations> ActionExecutor for ColumnarSink<O> {
    async fn check(&mut self) -> bool {
        self.operations.health_check().await
    }

    async fn process(&mut self, events: Vec<StreamEvent>) {
        if let Err(error) = self.prepare().await {
            error!(events = events.len(), %error, "Failed to prepare the columnar store");
            return;
        }

        for events in partition(events, self.max_batch_size) {
            if let Err(error) = self.write_partition(&events).await {
                error!(
                    partition_size = events.len(),
                    %error,
                    "Failed to persist partition into the columnar store, skipping the remaining partitions"
                );
                // the store may have applied part of the DDL, reload it on the next call
                self.schemas.invalidate();
                return;
            }
        }
    }
}
