//! Indexes events into a document store with one core per stream. Cores are created on demand,
//! each core is written through its own client, opened the first time the core is written to
//! and kept for the lifetime of the sink.
//!
//! Adding documents is retried while the store reports transient errors (a clustered store
//! rejects writes until its cloud state is initialized). After each partition every client
//! opened so far is committed.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::cache::{CacheSource, Created, RemoteCache};
use crate::config::sink::{DocumentSinkConfig, DocumentStoreMode, PartitionSize, RetryConfig};
use crate::message::{Column, ColumnValue, StreamEvent};
use crate::operations::{
    CoreDescriptor, CoreEndpoint, Document, DocumentClient, DocumentClientFactory,
    DocumentOperations,
};
use crate::sinker::sink::{ActionExecutor, partition};

/// Field holding the generated id of every document.
pub const DOCUMENT_ID_FIELD: &str = "decision_id";

pub struct DocumentSink<O, F: DocumentClientFactory> {
    operations: O,
    factory: F,
    mode: DocumentStoreMode,
    data_dir: Option<String>,
    max_batch_size: PartitionSize,
    retry: RetryConfig,
    cores: RemoteCache<()>,
    clients: RemoteCache<F::Client>,
}

/// Cores known to the store. Creating a missing core needs the columns of the event that
/// revealed it.
struct Cores<'a, O> {
    operations: &'a O,
    columns: &'a [Column],
    data_dir: Option<&'a str>,
}

impl<O: DocumentOperations> CacheSource<()> for Cores<'_, O> {
    async fn load(&mut self) -> Result<HashMap<String, ()>> {
        let cores = self.operations.list_cores().await?;
        Ok(cores.into_iter().map(|core| (core, ())).collect())
    }

    async fn create(&mut self, core: &str) -> Result<Created<()>> {
        info!(core, "Creating core");
        let descriptor = CoreDescriptor {
            core: core.to_string(),
            columns: self.columns.to_vec(),
            data_dir: self.data_dir.map(str::to_string),
        };
        self.operations.create_core(&descriptor).await?;
        Ok(Created::Refresh)
    }
}

/// Clients are opened locally, there is nothing to load from the store.
struct Clients<'a, F> {
    factory: &'a F,
    mode: &'a DocumentStoreMode,
}

impl<F: DocumentClientFactory> CacheSource<F::Client> for Clients<'_, F> {
    async fn load(&mut self) -> Result<HashMap<String, F::Client>> {
        Ok(HashMap::new())
    }

    async fn create(&mut self, core: &str) -> Result<Created<F::Client>> {
        let endpoint = CoreEndpoint::new(self.mode, core);
        debug!(?endpoint, "Opening document client");
        Ok(Created::Entry(self.factory.connect(&endpoint)?))
    }
}

/// Nanoseconds since the epoch, never going backwards within the process.
fn monotonic_nanos() -> i64 {
    static BASE: OnceLock<(Instant, i64)> = OnceLock::new();
    let (start, epoch_nanos) = BASE.get_or_init(|| {
        (
            Instant::now(),
            Utc::now().timestamp_nanos_opt().unwrap_or_default(),
        )
    });
    let elapsed = i64::try_from(start.elapsed().as_nanos()).unwrap_or(i64::MAX);
    epoch_nanos.saturating_add(elapsed)
}

/// One document per event, one field per column. `sequence` is the position of the event in
/// its partition, starting at 1.
fn build_document(event: &StreamEvent, sequence: usize) -> Document {
    let id = format!("{}-{sequence}", monotonic_nanos());
    let fields = std::iter::once((DOCUMENT_ID_FIELD.to_string(), ColumnValue::String(id)))
        .chain(
            event
                .columns
                .iter()
                .map(|c| (c.name.clone(), c.value.clone())),
        )
        .collect();
    Document { fields }
}

impl<O, F> DocumentSink<O, F>
where
    O: DocumentOperations,
    F: DocumentClientFactory,
{
    pub fn new(operations: O, factory: F, config: &DocumentSinkConfig, retry: RetryConfig) -> Self {
        Self {
            operations,
            factory,
            mode: config.mode.clone(),
            data_dir: config.data_dir.clone(),
            max_batch_size: config.max_batch_size,
            retry,
            cores: RemoteCache::new(),
            clients: RemoteCache::new(),
        }
    }

    /// Adds the documents of every core through its client, one attempt.
    async fn add_documents(&mut self, documents: &BTreeMap<&str, Vec<Document>>) -> Result<()> {
        let mut source = Clients {
            factory: &self.factory,
            mode: &self.mode,
        };
        for (core, documents) in documents {
            let client = self.clients.get_or_create(core, &mut source).await?;
            client.add(documents).await?;
        }
        Ok(())
    }

    /// Adds the documents, retrying as long as the store reports transient errors. Gives up with
    /// [`crate::Error::Retry`] once the attempts are exhausted.
    async fn add_with_retry(&mut self, documents: &BTreeMap<&str, Vec<Document>>) -> Result<()> {
        let mut retry = self.retry.strategy();
        loop {
            match self.add_documents(documents).await {
                Ok(()) => return Ok(()),
                Err(error) if error.is_transient() => {
                    warn!(
                        attempt = retry.attempt() + 1,
                        max_attempts = retry.max_attempts(),
                        %error,
                        "Document store not ready, retrying"
                    );
                    // the last permitted attempt leaves the loop with the exhaustion error
                    if let Some(delay) = retry.error_occurred()? {
                        tokio::time::sleep(delay).await;
                    }
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Commits every client opened so far, whether or not its core got documents in this
    /// partition.
    async fn commit_all(&mut self) -> Result<()> {
        for (core, client) in self.clients.iter_mut() {
            debug!(%core, "Committing");
            client.commit().await?;
        }
        Ok(())
    }

    async fn write_partition(&mut self, events: &[StreamEvent]) -> Result<()> {
        let mut documents: BTreeMap<&str, Vec<Document>> = BTreeMap::new();
        for (index, event) in events.iter().enumerate() {
            let mut source = Cores {
                operations: &self.operations,
                columns: &event.columns,
                data_dir: self.data_dir.as_deref(),
            };
            self.cores
                .get_or_create(&event.stream_name, &mut source)
                .await?;

            documents
                .entry(event.stream_name.as_str())
                .or_default()
                .push(build_document(event, index + 1));
        }

        self.add_with_retry(&documents).await?;
        self.commit_all().await
    }
}

impl<O, F> ActionExecutor for DocumentSink<O, F>
where
    O: DocumentOperations,
    F: DocumentClientFactory,
{
    async fn check(&mut self) -> bool {
        match self.operations.list_cores().await {
            Ok(_) => true,
            Err(error) => {
                error!(%error, "Document store is not reachable");
                false
            }
        }
    }

    async fn process(&mut self, events: Vec<StreamEvent>) {
        for events in partition(events, self.max_batch_size) {
            if let Err(error) = self.write_partition(&events).await {
                error!(
                    partition_size = events.len(),
                    %error,
                    "Failed to index partition into the document store, skipping the remaining partitions"
                );
                return;
            }
        }
    }
}
