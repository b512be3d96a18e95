//! In-memory stores standing in for the operations-service collaborators. Every store records
//! the calls it receives and supports injecting failures.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::Result;
use crate::config::sink::BatchType;
use crate::error::Error;
use crate::message::{ActionType, Column, ColumnSet, TIMESTAMP_FIELD};
use crate::operations::{
    BulkResponse, CollectionOperations, ColumnarOperations, CoreDescriptor, CoreEndpoint,
    Document, DocumentClient, DocumentClientFactory, DocumentOperations, EventProducer,
    IndexMapping, IndexRequest, ProducerRecord, SearchOperations, StreamOperations, WriteBatch,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ColumnarCall {
    CheckKeyspace,
    CreateKeyspace(String),
    KnownSchemas,
    CreateTable(String),
    AlterTable { stream: String, added: Vec<String> },
    RefreshSchemaCache,
    ExecuteBatch { statements: usize, batch_type: BatchType },
}

impl ColumnarCall {
    pub(crate) fn is_ddl(&self) -> bool {
        matches!(
            self,
            ColumnarCall::CreateKeyspace(_)
                | ColumnarCall::CreateTable(_)
                | ColumnarCall::AlterTable { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InsertStatement {
    pub(crate) stream: String,
    pub(crate) columns: Vec<String>,
}

#[derive(Default)]
struct ColumnarState {
    keyspace_exists: bool,
    /// Tables as they exist in the store.
    tables: HashMap<String, ColumnSet>,
    /// Tables as of the last metadata refresh.
    metadata: HashMap<String, ColumnSet>,
    rows: Vec<InsertStatement>,
    calls: Vec<ColumnarCall>,
    batches: usize,
    fail_batch: Option<usize>,
    unhealthy: bool,
}

/// Columnar store keeping its tables in memory.
#[derive(Clone, Default)]
pub(crate) struct InMemoryColumnarStore {
    state: Arc<Mutex<ColumnarState>>,
}

impl InMemoryColumnarStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_keyspace(self) -> Self {
        self.state.lock().keyspace_exists = true;
        self
    }

    pub(crate) fn with_table(self, stream: &str, columns: &[&str]) -> Self {
        {
            let mut state = self.state.lock();
            let columns: ColumnSet = columns
                .iter()
                .map(|c| c.to_string())
                .chain(std::iter::once(TIMESTAMP_FIELD.to_string()))
                .collect();
            state.tables.insert(stream.to_string(), columns);
        }
        self
    }

    /// Fails the `nth` (1-based) batch execution.
    pub(crate) fn fail_batch(self, nth: usize) -> Self {
        self.state.lock().fail_batch = Some(nth);
        self
    }

    pub(crate) fn unhealthy(self) -> Self {
        self.state.lock().unhealthy = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<ColumnarCall> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn ddl_calls(&self) -> Vec<ColumnarCall> {
        self.calls().into_iter().filter(ColumnarCall::is_ddl).collect()
    }

    /// Number of statements of every executed batch, failed ones included.
    pub(crate) fn batch_sizes(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ColumnarCall::ExecuteBatch { statements, .. } => Some(statements),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn rows(&self) -> Vec<InsertStatement> {
        self.state.lock().rows.clone()
    }

    pub(crate) fn table(&self, stream: &str) -> Option<ColumnSet> {
        self.state.lock().tables.get(stream).cloned()
    }
}

impl ColumnarOperations for InMemoryColumnarStore {
    type Statement = InsertStatement;

    async fn check_keyspace(&self) -> Result<bool> {
        let mut state = self.state.lock();
        state.calls.push(ColumnarCall::CheckKeyspace);
        Ok(state.keyspace_exists)
    }

    async fn create_keyspace(&self, keyspace: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(ColumnarCall::CreateKeyspace(keyspace.to_string()));
        state.keyspace_exists = true;
        Ok(())
    }

    async fn known_schemas(&self) -> Result<HashMap<String, ColumnSet>> {
        let mut state = self.state.lock();
        state.calls.push(ColumnarCall::KnownSchemas);
        Ok(state.metadata.clone())
    }

    async fn create_table(
        &self,
        stream: &str,
        columns: &[Column],
        timestamp_field: &str,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(ColumnarCall::CreateTable(stream.to_string()));
        if state.tables.contains_key(stream) {
            return Err(Error::Store(format!("table {stream} already exists")));
        }
        let columns = columns
            .iter()
            .map(|c| c.name.clone())
            .chain(std::iter::once(timestamp_field.to_string()))
            .collect();
        state.tables.insert(stream.to_string(), columns);
        Ok(())
    }

    async fn alter_table(&self, stream: &str, _known: &ColumnSet, added: &[Column]) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(ColumnarCall::AlterTable {
            stream: stream.to_string(),
            added: added.iter().map(|c| c.name.clone()).collect(),
        });
        let table = state
            .tables
            .get_mut(stream)
            .ok_or_else(|| Error::Store(format!("table {stream} does not exist")))?;
        table.extend(added.iter().map(|c| c.name.clone()));
        Ok(())
    }

    async fn refresh_schema_cache(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(ColumnarCall::RefreshSchemaCache);
        state.metadata = state.tables.clone();
        Ok(())
    }

    fn build_insert(
        &self,
        stream: &str,
        columns: &[Column],
        timestamp_field: &str,
    ) -> Result<InsertStatement> {
        Ok(InsertStatement {
            stream: stream.to_string(),
            columns: columns
                .iter()
                .map(|c| c.name.clone())
                .chain(std::iter::once(timestamp_field.to_string()))
                .collect(),
        })
    }

    async fn execute_batch(&self, batch: WriteBatch<InsertStatement>) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(ColumnarCall::ExecuteBatch {
            statements: batch.len(),
            batch_type: batch.batch_type,
        });
        state.batches += 1;
        if state.fail_batch == Some(state.batches) {
            return Err(Error::Store("write timeout".to_string()));
        }
        state.rows.extend(batch.statements);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        !self.state.lock().unhealthy
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DocumentCall {
    ListCores,
    CreateCore(String),
    Connect(CoreEndpoint),
    Add { core: String, documents: usize },
    Commit(String),
}

#[derive(Default)]
struct DocumentState {
    cores: Vec<String>,
    descriptors: Vec<CoreDescriptor>,
    indexed: HashMap<String, Vec<Document>>,
    calls: Vec<DocumentCall>,
    transient_failures: usize,
    broken_adds: bool,
    unreachable: bool,
}

/// Document store keeping its cores in memory. Doubles as the factory of its own clients.
#[derive(Clone, Default)]
pub(crate) struct InMemoryDocumentStore {
    state: Arc<Mutex<DocumentState>>,
}

impl InMemoryDocumentStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_core(self, core: &str) -> Self {
        self.state.lock().cores.push(core.to_string());
        self
    }

    /// The next `count` adds fail with a transient store error.
    pub(crate) fn transient_failures(self, count: usize) -> Self {
        self.state.lock().transient_failures = count;
        self
    }

    /// Every add fails with a non-transient error.
    pub(crate) fn broken_adds(self) -> Self {
        self.state.lock().broken_adds = true;
        self
    }

    pub(crate) fn unreachable(self) -> Self {
        self.state.lock().unreachable = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<DocumentCall> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn descriptors(&self) -> Vec<CoreDescriptor> {
        self.state.lock().descriptors.clone()
    }

    pub(crate) fn indexed(&self, core: &str) -> Vec<Document> {
        self.state
            .lock()
            .indexed
            .get(core)
            .cloned()
            .unwrap_or_default()
    }
}

impl DocumentOperations for InMemoryDocumentStore {
    async fn list_cores(&self) -> Result<Vec<String>> {
        let mut state = self.state.lock();
        state.calls.push(DocumentCall::ListCores);
        if state.unreachable {
            return Err(Error::Connection("connection refused".to_string()));
        }
        Ok(state.cores.clone())
    }

    async fn create_core(&self, descriptor: &CoreDescriptor) -> Result<()> {
        let mut state = self.state.lock();
        state
            .calls
            .push(DocumentCall::CreateCore(descriptor.core.clone()));
        state.cores.push(descriptor.core.clone());
        state.descriptors.push(descriptor.clone());
        Ok(())
    }
}

impl DocumentClientFactory for InMemoryDocumentStore {
    type Client = InMemoryDocumentClient;

    fn connect(&self, endpoint: &CoreEndpoint) -> Result<InMemoryDocumentClient> {
        let core = match endpoint {
            CoreEndpoint::Standalone { url } => url.rsplit('/').next().unwrap_or_default(),
            CoreEndpoint::Cloud { collection, .. } => collection.as_str(),
        }
        .to_string();
        self.state
            .lock()
            .calls
            .push(DocumentCall::Connect(endpoint.clone()));
        Ok(InMemoryDocumentClient {
            core,
            pending: Vec::new(),
            state: Arc::clone(&self.state),
        })
    }
}

pub(crate) struct InMemoryDocumentClient {
    core: String,
    pending: Vec<Document>,
    state: Arc<Mutex<DocumentState>>,
}

impl DocumentClient for InMemoryDocumentClient {
    async fn add(&mut self, documents: &[Document]) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(DocumentCall::Add {
            core: self.core.clone(),
            documents: documents.len(),
        });
        if state.broken_adds {
            return Err(Error::Connection("core is read only".to_string()));
        }
        if state.transient_failures > 0 {
            state.transient_failures -= 1;
            return Err(Error::Store("cloud status not yet initialized".to_string()));
        }
        self.pending.extend_from_slice(documents);
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(DocumentCall::Commit(self.core.clone()));
        let pending = std::mem::take(&mut self.pending);
        state
            .indexed
            .entry(self.core.clone())
            .or_default()
            .extend(pending);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CollectionCall {
    ListCollections,
    CreateCollection { database: String, collection: String },
    InsertMany { collection: String, documents: usize },
}

#[derive(Default)]
struct CollectionState {
    collections: Vec<String>,
    documents: HashMap<String, Vec<Document>>,
    calls: Vec<CollectionCall>,
    inserts: usize,
    fail_insert: Option<usize>,
    unreachable: bool,
}

/// Document-collection store keeping its collections in memory.
#[derive(Clone, Default)]
pub(crate) struct InMemoryCollectionStore {
    state: Arc<Mutex<CollectionState>>,
}

impl InMemoryCollectionStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_collection(self, collection: &str) -> Self {
        self.state.lock().collections.push(collection.to_string());
        self
    }

    /// Fails the `nth` (1-based) insert.
    pub(crate) fn fail_insert(self, nth: usize) -> Self {
        self.state.lock().fail_insert = Some(nth);
        self
    }

    pub(crate) fn unreachable(self) -> Self {
        self.state.lock().unreachable = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<CollectionCall> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn list_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, CollectionCall::ListCollections))
            .count()
    }

    /// Collection and size of every insert, failed ones included.
    pub(crate) fn inserts(&self) -> Vec<(String, usize)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                CollectionCall::InsertMany {
                    collection,
                    documents,
                } => Some((collection, documents)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn documents(&self, collection: &str) -> Vec<Document> {
        self.state
            .lock()
            .documents
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }
}

impl CollectionOperations for InMemoryCollectionStore {
    async fn list_collections(&self, _database: &str) -> Result<Vec<String>> {
        let mut state = self.state.lock();
        state.calls.push(CollectionCall::ListCollections);
        Ok(state.collections.clone())
    }

    async fn create_collection(&self, database: &str, collection: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(CollectionCall::CreateCollection {
            database: database.to_string(),
            collection: collection.to_string(),
        });
        state.collections.push(collection.to_string());
        Ok(())
    }

    async fn insert_many(
        &self,
        _database: &str,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(CollectionCall::InsertMany {
            collection: collection.to_string(),
            documents: documents.len(),
        });
        state.inserts += 1;
        if state.fail_insert == Some(state.inserts) {
            return Err(Error::Connection("not primary".to_string()));
        }
        state
            .documents
            .entry(collection.to_string())
            .or_default()
            .extend(documents);
        Ok(())
    }

    async fn ping(&self) -> bool {
        !self.state.lock().unreachable
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SearchCall {
    ListIndices,
    CreateIndex(String),
    Bulk(usize),
}

#[derive(Default)]
struct SearchState {
    indices: Vec<String>,
    mappings: Vec<IndexMapping>,
    indexed: HashMap<String, Vec<Document>>,
    calls: Vec<SearchCall>,
    bulks: usize,
    reject_bulk: Option<usize>,
    red: bool,
}

/// Search engine keeping its indices in memory.
#[derive(Clone, Default)]
pub(crate) struct InMemorySearchEngine {
    state: Arc<Mutex<SearchState>>,
}

impl InMemorySearchEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_index(self, index: &str) -> Self {
        self.state.lock().indices.push(index.to_string());
        self
    }

    /// Rejects every item of the `nth` (1-based) bulk request.
    pub(crate) fn reject_bulk(self, nth: usize) -> Self {
        self.state.lock().reject_bulk = Some(nth);
        self
    }

    /// Cluster health is red.
    pub(crate) fn red(self) -> Self {
        self.state.lock().red = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<SearchCall> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn mappings(&self) -> Vec<IndexMapping> {
        self.state.lock().mappings.clone()
    }

    /// Number of requests of every bulk, rejected ones included.
    pub(crate) fn bulk_sizes(&self) -> Vec<usize> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SearchCall::Bulk(requests) => Some(requests),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn indexed(&self, index: &str) -> Vec<Document> {
        self.state
            .lock()
            .indexed
            .get(index)
            .cloned()
            .unwrap_or_default()
    }
}

impl SearchOperations for InMemorySearchEngine {
    async fn list_indices(&self) -> Result<Vec<String>> {
        let mut state = self.state.lock();
        state.calls.push(SearchCall::ListIndices);
        Ok(state.indices.clone())
    }

    async fn create_index(&self, mapping: &IndexMapping) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(SearchCall::CreateIndex(mapping.index.clone()));
        state.indices.push(mapping.index.clone());
        state.mappings.push(mapping.clone());
        Ok(())
    }

    async fn bulk(&self, requests: Vec<IndexRequest>) -> Result<BulkResponse> {
        let mut state = self.state.lock();
        state.calls.push(SearchCall::Bulk(requests.len()));
        state.bulks += 1;
        if state.reject_bulk == Some(state.bulks) {
            return Ok(BulkResponse {
                failures: requests
                    .iter()
                    .map(|r| format!("mapper_parsing_exception in {}", r.index))
                    .collect(),
            });
        }
        for request in requests {
            state
                .indexed
                .entry(request.index)
                .or_default()
                .push(request.document);
        }
        Ok(BulkResponse::default())
    }

    async fn cluster_health(&self) -> bool {
        !self.state.lock().red
    }
}

#[derive(Default)]
struct ProducerState {
    /// Size of every send, failed ones included.
    sends: Vec<usize>,
    records: Vec<ProducerRecord>,
    fail_send: Option<usize>,
    not_ready: bool,
}

/// Broker producer keeping the acknowledged records in memory.
#[derive(Clone, Default)]
pub(crate) struct InMemoryProducer {
    state: Arc<Mutex<ProducerState>>,
}

impl InMemoryProducer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Fails the `nth` (1-based) send.
    pub(crate) fn fail_send(self, nth: usize) -> Self {
        self.state.lock().fail_send = Some(nth);
        self
    }

    pub(crate) fn not_ready(self) -> Self {
        self.state.lock().not_ready = true;
        self
    }

    pub(crate) fn sends(&self) -> Vec<usize> {
        self.state.lock().sends.clone()
    }

    pub(crate) fn records(&self) -> Vec<ProducerRecord> {
        self.state.lock().records.clone()
    }
}

impl EventProducer for InMemoryProducer {
    async fn send(&self, records: Vec<ProducerRecord>) -> Result<()> {
        let mut state = self.state.lock();
        state.sends.push(records.len());
        if state.fail_send == Some(state.sends.len()) {
            return Err(Error::Connection("broker not available".to_string()));
        }
        state.records.extend(records);
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        !self.state.lock().not_ready
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum StreamCall {
    CreateStream(String),
    DropStream(String),
    AddQuery(String, String),
    RemoveQuery(String, String),
    EnableAction(String, ActionType),
    DisableAction(String, ActionType),
}

#[derive(Default)]
struct StreamEntry {
    queries: Vec<String>,
    actions: HashSet<ActionType>,
}

#[derive(Default)]
struct StreamState {
    streams: HashMap<String, StreamEntry>,
    calls: Vec<StreamCall>,
    broken_mutations: bool,
}

/// Stream registry of a CEP engine kept in memory. Only mutations are recorded.
#[derive(Clone, Default)]
pub(crate) struct InMemoryStreamOperations {
    state: Arc<Mutex<StreamState>>,
}

impl InMemoryStreamOperations {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_stream(self, stream: &str) -> Self {
        self.state
            .lock()
            .streams
            .insert(stream.to_string(), StreamEntry::default());
        self
    }

    pub(crate) fn with_query(self, stream: &str, query: &str) -> Self {
        self.state
            .lock()
            .streams
            .entry(stream.to_string())
            .or_default()
            .queries
            .push(query.to_string());
        self
    }

    pub(crate) fn with_action(self, stream: &str, action: ActionType) -> Self {
        self.state
            .lock()
            .streams
            .entry(stream.to_string())
            .or_default()
            .actions
            .insert(action);
        self
    }

    /// Every mutation fails.
    pub(crate) fn broken_mutations(self) -> Self {
        self.state.lock().broken_mutations = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<StreamCall> {
        self.state.lock().calls.clone()
    }

    pub(crate) fn has_stream(&self, stream: &str) -> bool {
        self.state.lock().streams.contains_key(stream)
    }

    fn mutate<F>(&self, call: StreamCall, mutation: F) -> Result<()>
    where
        F: FnOnce(&mut HashMap<String, StreamEntry>),
    {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.broken_mutations {
            return Err(Error::Store("engine rejected the mutation".to_string()));
        }
        mutation(&mut state.streams);
        Ok(())
    }
}

impl StreamOperations for InMemoryStreamOperations {
    async fn stream_exists(&self, stream: &str) -> bool {
        self.state.lock().streams.contains_key(stream)
    }

    async fn query_exists(&self, stream: &str, query: &str) -> bool {
        self.state
            .lock()
            .streams
            .get(stream)
            .is_some_and(|s| s.queries.iter().any(|q| q == query))
    }

    async fn create_stream(&self, stream: &str, _columns: &[Column]) -> Result<()> {
        self.mutate(StreamCall::CreateStream(stream.to_string()), |streams| {
            streams.insert(stream.to_string(), StreamEntry::default());
        })
    }

    async fn drop_stream(&self, stream: &str) -> Result<()> {
        self.mutate(StreamCall::DropStream(stream.to_string()), |streams| {
            streams.remove(stream);
        })
    }

    async fn add_query(&self, stream: &str, query: &str) -> Result<()> {
        self.mutate(
            StreamCall::AddQuery(stream.to_string(), query.to_string()),
            |streams| {
                streams
                    .entry(stream.to_string())
                    .or_default()
                    .queries
                    .push(query.to_string());
            },
        )
    }

    async fn remove_query(&self, stream: &str, query: &str) -> Result<()> {
        self.mutate(
            StreamCall::RemoveQuery(stream.to_string(), query.to_string()),
            |streams| {
                if let Some(entry) = streams.get_mut(stream) {
                    entry.queries.retain(|q| q != query);
                }
            },
        )
    }

    async fn is_action_enabled(&self, stream: &str, action: ActionType) -> bool {
        self.state
            .lock()
            .streams
            .get(stream)
            .is_some_and(|s| s.actions.contains(&action))
    }

    async fn enable_action(&self, stream: &str, action: ActionType) -> Result<()> {
        self.mutate(
            StreamCall::EnableAction(stream.to_string(), action),
            |streams| {
                streams
                    .entry(stream.to_string())
                    .or_default()
                    .actions
                    .insert(action);
            },
        )
    }

    async fn disable_action(&self, stream: &str, action: ActionType) -> Result<()> {
        self.mutate(
            StreamCall::DisableAction(stream.to_string(), action),
            |streams| {
                if let Some(entry) = streams.get_mut(stream) {
                    entry.actions.remove(&action);
                }
            },
        )
    }
}
