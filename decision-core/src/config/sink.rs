use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

use backoff::RetryStrategy;
use backoff::strategy::fixed::Interval;

use crate::Error;

const DEFAULT_COLUMNAR_PORT: u16 = 9042;
const DEFAULT_KEYSPACE: &str = "decision";
const DEFAULT_DATABASE: &str = "decision";
const DEFAULT_CLUSTER_NAME: &str = "decision";

/// Upper bound on the number of events written in one partition of a micro-batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionSize {
    /// The whole micro-batch is written as a single partition.
    Unbounded,
    Max(NonZeroUsize),
}

impl PartitionSize {
    /// Number of events per partition for a batch of `total` events.
    pub fn chunk_len(&self, total: usize) -> usize {
        match self {
            PartitionSize::Unbounded => total.max(1),
            PartitionSize::Max(max) => max.get(),
        }
    }
}

/// Any value <= 0 means unbounded.
impl From<i64> for PartitionSize {
    fn from(value: i64) -> Self {
        usize::try_from(value)
            .ok()
            .and_then(NonZeroUsize::new)
            .map_or(PartitionSize::Unbounded, PartitionSize::Max)
    }
}

/// Atomicity of the write batch sent to the columnar store for each partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchType {
    #[default]
    Logged,
    Unlogged,
    Counter,
}

impl FromStr for BatchType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LOGGED" => Ok(BatchType::Logged),
            "UNLOGGED" => Ok(BatchType::Unlogged),
            "COUNTER" => Ok(BatchType::Counter),
            other => Err(Error::Config(format!("Unknown batch type {other}"))),
        }
    }
}

impl fmt::Display for BatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchType::Logged => write!(f, "LOGGED"),
            BatchType::Unlogged => write!(f, "UNLOGGED"),
            BatchType::Counter => write!(f, "COUNTER"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnarSinkConfig {
    pub hosts: Vec<String>,
    pub port: u16,
    pub max_batch_size: PartitionSize,
    pub batch_type: BatchType,
    /// Keyspace holding one table per stream.
    pub keyspace: String,
}

impl ColumnarSinkConfig {
    pub fn new(hosts: Vec<String>, max_batch_size: impl Into<PartitionSize>) -> Self {
        Self {
            hosts,
            port: DEFAULT_COLUMNAR_PORT,
            max_batch_size: max_batch_size.into(),
            batch_type: BatchType::default(),
            keyspace: DEFAULT_KEYSPACE.to_string(),
        }
    }

    pub fn default_port() -> u16 {
        DEFAULT_COLUMNAR_PORT
    }

    pub fn default_keyspace() -> &'static str {
        DEFAULT_KEYSPACE
    }
}

/// How the document store is reached. Fixed for the lifetime of a sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentStoreMode {
    Standalone { host: String },
    /// Clustered deployment, reached through the coordinator.
    Cloud { zk_host: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSinkConfig {
    pub mode: DocumentStoreMode,
    /// Data directory handed to the store when a core is created.
    pub data_dir: Option<String>,
    pub max_batch_size: PartitionSize,
}

impl DocumentSinkConfig {
    pub fn new(mode: DocumentStoreMode, max_batch_size: impl Into<PartitionSize>) -> Self {
        Self {
            mode,
            data_dir: None,
            max_batch_size: max_batch_size.into(),
        }
    }
}

/// Document-collection store, one collection per stream inside a single database.
#[derive(Clone, PartialEq)]
pub struct CollectionSinkConfig {
    pub hosts: Vec<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: String,
    pub max_batch_size: PartitionSize,
}

impl CollectionSinkConfig {
    pub fn new(hosts: Vec<String>, max_batch_size: impl Into<PartitionSize>) -> Self {
        Self {
            hosts,
            username: None,
            password: None,
            database: DEFAULT_DATABASE.to_string(),
            max_batch_size: max_batch_size.into(),
        }
    }

    pub fn default_database() -> &'static str {
        DEFAULT_DATABASE
    }
}

impl fmt::Debug for CollectionSinkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionSinkConfig")
            .field("hosts", &self.hosts)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("max_batch_size", &self.max_batch_size)
            .finish()
    }
}

/// Search engine, one index per stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSinkConfig {
    pub hosts: Vec<String>,
    pub cluster_name: String,
    pub max_batch_size: PartitionSize,
}

impl SearchSinkConfig {
    pub fn new(hosts: Vec<String>, max_batch_size: impl Into<PartitionSize>) -> Self {
        Self {
            hosts,
            cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
            max_batch_size: max_batch_size.into(),
        }
    }

    pub fn default_cluster_name() -> &'static str {
        DEFAULT_CLUSTER_NAME
    }
}

/// Message broker the forward action publishes to, one topic per stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardSinkConfig {
    pub brokers: Vec<String>,
    /// Prepended to the stream name to build the topic.
    pub topic_prefix: String,
    pub max_batch_size: PartitionSize,
}

impl ForwardSinkConfig {
    pub fn new(brokers: Vec<String>, max_batch_size: impl Into<PartitionSize>) -> Self {
        Self {
            brokers,
            topic_prefix: String::new(),
            max_batch_size: max_batch_size.into(),
        }
    }
}

/// Retry settings for writes against stores that report transient errors.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_attempts: u16,
    /// Delay between attempts, attempts are immediate when unset.
    pub interval: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: RetryStrategy::DEFAULT_MAX_ATTEMPTS,
            interval: None,
        }
    }
}

impl RetryConfig {
    /// A fresh strategy for one write.
    pub fn strategy(&self) -> RetryStrategy {
        let strategy = RetryStrategy::new(self.max_attempts);
        match self.interval {
            Some(interval) => strategy.with_interval(Interval::from(interval)),
            None => strategy,
        }
    }
}
