//! Contracts of the store clients the sinks and the lifecycle controller are built on. The
//! implementations (drivers, HTTP clients, the CEP engine's stream registry) live outside this
//! crate and are handed to each component when it is constructed.

use std::collections::HashMap;
use std::future::Future;

use crate::Result;
use crate::config::sink::{BatchType, DocumentStoreMode};
use crate::message::{
    ActionType, Column, ColumnSet, ColumnType, ColumnValue, StreamEvent, TIMESTAMP_FIELD,
};

/// DDL and DML primitives of the columnar store.
pub trait ColumnarOperations: Send + Sync {
    /// A single insert, prepared by the store client.
    type Statement: Send;

    /// Whether the keyspace the sink writes to exists.
    fn check_keyspace(&self) -> impl Future<Output = Result<bool>> + Send;

    fn create_keyspace(&self, keyspace: &str) -> impl Future<Output = Result<()>> + Send;

    /// Column sets of every table in the keyspace as of the last
    /// [`ColumnarOperations::refresh_schema_cache`], keyed by stream.
    fn known_schemas(&self) -> impl Future<Output = Result<HashMap<String, ColumnSet>>> + Send;

    fn create_table(
        &self,
        stream: &str,
        columns: &[Column],
        timestamp_field: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Adds `added` to the table of `stream`, whose current columns are `known`.
    fn alter_table(
        &self,
        stream: &str,
        known: &ColumnSet,
        added: &[Column],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Re-reads the store metadata so that [`ColumnarOperations::known_schemas`] reflects DDL
    /// issued since the last refresh.
    fn refresh_schema_cache(&self) -> impl Future<Output = Result<()>> + Send;

    fn build_insert(
        &self,
        stream: &str,
        columns: &[Column],
        timestamp_field: &str,
    ) -> Result<Self::Statement>;

    /// Executes all statements of the batch atomically.
    fn execute_batch(
        &self,
        batch: WriteBatch<Self::Statement>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Non-throwing health check.
    fn health_check(&self) -> impl Future<Output = bool> + Send;
}

/// Statements executed together by the columnar store.
#[derive(Debug)]
pub struct WriteBatch<S> {
    pub batch_type: BatchType,
    pub statements: Vec<S>,
}

impl<S> WriteBatch<S> {
    pub fn new(batch_type: BatchType) -> Self {
        Self {
            batch_type,
            statements: Vec::new(),
        }
    }

    pub fn push(&mut self, statement: S) {
        self.statements.push(statement);
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }
}

/// Administrative primitives of the document store.
pub trait DocumentOperations: Send + Sync {
    fn list_cores(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn create_core(&self, descriptor: &CoreDescriptor) -> impl Future<Output = Result<()>> + Send;
}

/// Everything the document store needs to create the core of a stream.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreDescriptor {
    pub core: String,
    pub columns: Vec<Column>,
    pub data_dir: Option<String>,
}

/// Where the client of one core connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreEndpoint {
    Standalone { url: String },
    Cloud { zk_host: String, collection: String },
}

impl CoreEndpoint {
    pub fn new(mode: &DocumentStoreMode, core: &str) -> Self {
        match mode {
            DocumentStoreMode::Standalone { host } => CoreEndpoint::Standalone {
                url: format!("http://{host}/solr/{core}"),
            },
            DocumentStoreMode::Cloud { zk_host } => CoreEndpoint::Cloud {
                zk_host: zk_host.clone(),
                collection: core.to_string(),
            },
        }
    }
}

/// A document as indexed by the document store, one field per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub fields: Vec<(String, ColumnValue)>,
}

impl Document {
    /// The event time, in milliseconds since the epoch, under [`TIMESTAMP_FIELD`] followed by
    /// one field per column.
    pub fn from_event(event: &StreamEvent) -> Self {
        let timestamp = ColumnValue::Long(event.event_time.timestamp_millis());
        let fields = std::iter::once((TIMESTAMP_FIELD.to_string(), timestamp))
            .chain(
                event
                    .columns
                    .iter()
                    .map(|c| (c.name.clone(), c.value.clone())),
            )
            .collect();
        Self { fields }
    }

    pub fn field(&self, name: &str) -> Option<&ColumnValue> {
        self.fields
            .iter()
            .find_map(|(field, value)| (field == name).then_some(value))
    }
}

/// Client bound to a single core.
pub trait DocumentClient: Send {
    fn add(&mut self, documents: &[Document]) -> impl Future<Output = Result<()>> + Send;

    /// Makes the documents added so far visible.
    fn commit(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Opens [`DocumentClient`]s.
pub trait DocumentClientFactory: Send + Sync {
    type Client: DocumentClient;

    fn connect(&self, endpoint: &CoreEndpoint) -> Result<Self::Client>;
}

/// Primitives of the document-collection store. Collections live in a single database.
pub trait CollectionOperations: Send + Sync {
    fn list_collections(
        &self,
        database: &str,
    ) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn create_collection(
        &self,
        database: &str,
        collection: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Unordered bulk insert into one collection.
    fn insert_many(
        &self,
        database: &str,
        collection: &str,
        documents: Vec<Document>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Non-throwing health check.
    fn ping(&self) -> impl Future<Output = bool> + Send;
}

/// Field mapping of an index, created together with the index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMapping {
    pub index: String,
    /// Declared type of every column, the event time is mapped as a date under
    /// [`TIMESTAMP_FIELD`].
    pub fields: Vec<(String, ColumnType)>,
}

impl IndexMapping {
    pub fn new(index: impl Into<String>, columns: &[Column]) -> Self {
        Self {
            index: index.into(),
            fields: columns
                .iter()
                .map(|c| (c.name.clone(), c.column_type))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexRequest {
    pub index: String,
    pub document: Document,
}

/// Outcome of a bulk request. Items are accepted or rejected one by one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkResponse {
    /// Reasons of the rejected items.
    pub failures: Vec<String>,
}

/// Primitives of the search engine.
pub trait SearchOperations: Send + Sync {
    fn list_indices(&self) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn create_index(&self, mapping: &IndexMapping) -> impl Future<Output = Result<()>> + Send;

    fn bulk(
        &self,
        requests: Vec<IndexRequest>,
    ) -> impl Future<Output = Result<BulkResponse>> + Send;

    /// Non-throwing health check, true when the cluster accepts writes.
    fn cluster_health(&self) -> impl Future<Output = bool> + Send;
}

/// A message published by the forward action.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerRecord {
    pub topic: String,
    pub key: String,
    pub payload: Vec<u8>,
}

/// Producer of the message broker.
pub trait EventProducer: Send + Sync {
    /// Publishes the records, in order, and waits for the broker to acknowledge them.
    fn send(&self, records: Vec<ProducerRecord>) -> impl Future<Output = Result<()>> + Send;

    fn is_ready(&self) -> impl Future<Output = bool> + Send;
}

/// Stream registry of the CEP engine.
pub trait StreamOperations: Send + Sync {
    fn stream_exists(&self, stream: &str) -> impl Future<Output = bool> + Send;

    fn query_exists(&self, stream: &str, query: &str) -> impl Future<Output = bool> + Send;

    fn create_stream(
        &self,
        stream: &str,
        columns: &[Column],
    ) -> impl Future<Output = Result<()>> + Send;

    fn drop_stream(&self, stream: &str) -> impl Future<Output = Result<()>> + Send;

    fn add_query(&self, stream: &str, query: &str) -> impl Future<Output = Result<()>> + Send;

    fn remove_query(&self, stream: &str, query: &str) -> impl Future<Output = Result<()>> + Send;

    fn is_action_enabled(
        &self,
        stream: &str,
        action: ActionType,
    ) -> impl Future<Output = bool> + Send;

    fn enable_action(
        &self,
        stream: &str,
        action: ActionType,
    ) -> impl Future<Output = Result<()>> + Send;

    fn disable_action(
        &self,
        stream: &str,
        action: ActionType,
    ) -> impl Future<Output = Result<()>> + Send;
}
