use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::Error;
use crate::Result;

/// Sink related configurations.
pub mod sink;

use sink::{
    BatchType, CollectionSinkConfig, ColumnarSinkConfig, DocumentSinkConfig, DocumentStoreMode,
    ForwardSinkConfig, PartitionSize, RetryConfig, SearchSinkConfig,
};

const ENV_COLUMNAR_HOSTS: &str = "DECISION_COLUMNAR_HOSTS";
const ENV_COLUMNAR_PORT: &str = "DECISION_COLUMNAR_PORT";
const ENV_COLUMNAR_MAX_BATCH_SIZE: &str = "DECISION_COLUMNAR_MAX_BATCH_SIZE";
const ENV_COLUMNAR_BATCH_TYPE: &str = "DECISION_COLUMNAR_BATCH_TYPE";
const ENV_COLUMNAR_KEYSPACE: &str = "DECISION_COLUMNAR_KEYSPACE";
const ENV_DOCUMENT_HOST: &str = "DECISION_DOCUMENT_HOST";
const ENV_DOCUMENT_CLOUD: &str = "DECISION_DOCUMENT_CLOUD";
const ENV_DOCUMENT_ZK_HOST: &str = "DECISION_DOCUMENT_ZK_HOST";
const ENV_DOCUMENT_DATA_DIR: &str = "DECISION_DOCUMENT_DATA_DIR";
const ENV_DOCUMENT_MAX_BATCH_SIZE: &str = "DECISION_DOCUMENT_MAX_BATCH_SIZE";
const ENV_COLLECTION_HOSTS: &str = "DECISION_COLLECTION_HOSTS";
const ENV_COLLECTION_USERNAME: &str = "DECISION_COLLECTION_USERNAME";
const ENV_COLLECTION_PASSWORD: &str = "DECISION_COLLECTION_PASSWORD";
const ENV_COLLECTION_DATABASE: &str = "DECISION_COLLECTION_DATABASE";
const ENV_COLLECTION_MAX_BATCH_SIZE: &str = "DECISION_COLLECTION_MAX_BATCH_SIZE";
const ENV_SEARCH_HOSTS: &str = "DECISION_SEARCH_HOSTS";
const ENV_SEARCH_CLUSTER_NAME: &str = "DECISION_SEARCH_CLUSTER_NAME";
const ENV_SEARCH_MAX_BATCH_SIZE: &str = "DECISION_SEARCH_MAX_BATCH_SIZE";
const ENV_FORWARD_BROKERS: &str = "DECISION_FORWARD_BROKERS";
const ENV_FORWARD_TOPIC_PREFIX: &str = "DECISION_FORWARD_TOPIC_PREFIX";
const ENV_FORWARD_MAX_BATCH_SIZE: &str = "DECISION_FORWARD_MAX_BATCH_SIZE";
const ENV_RETRY_MAX_ATTEMPTS: &str = "DECISION_RETRY_MAX_ATTEMPTS";
const ENV_RETRY_INTERVAL_MS: &str = "DECISION_RETRY_INTERVAL_MS";
const ENV_PRINT_STREAMS: &str = "DECISION_PRINT_STREAMS";
const ENV_INTERNAL_STREAM_PREFIX: &str = "DECISION_INTERNAL_STREAM_PREFIX";
const ENV_BATCH_TIME_MS: &str = "DECISION_BATCH_TIME_MS";
const ENV_BATCH_SIZE: &str = "DECISION_BATCH_SIZE";

const DEFAULT_MAX_BATCH_SIZE: i64 = -1;
const DEFAULT_INTERNAL_STREAM_PREFIX: &str = "decision_";
const DEFAULT_BATCH_TIME_MS: u64 = 1000;
const DEFAULT_BATCH_SIZE: usize = 500;

/// Lifecycle related configurations.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleConfig {
    /// Streams whose name starts with this prefix belong to the engine and cannot be dropped.
    pub internal_stream_prefix: String,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            internal_stream_prefix: DEFAULT_INTERNAL_STREAM_PREFIX.to_string(),
        }
    }
}

/// How events are cut into micro-batches when replayed locally.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayConfig {
    pub batch_size: usize,
    pub batch_time: Duration,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            batch_time: Duration::from_millis(DEFAULT_BATCH_TIME_MS),
        }
    }
}

/// Settings consumed read-only when the sinks and the lifecycle controller are constructed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settings {
    /// Present only when the columnar sink is configured.
    pub columnar: Option<ColumnarSinkConfig>,
    /// Present only when the document sink is configured.
    pub document: Option<DocumentSinkConfig>,
    pub collection: Option<CollectionSinkConfig>,
    pub search: Option<SearchSinkConfig>,
    pub forward: Option<ForwardSinkConfig>,
    pub retry: RetryConfig,
    pub print_streams: bool,
    pub lifecycle: LifecycleConfig,
    pub replay: ReplayConfig,
}

impl Settings {
    /// Loads the settings from the given environment variables. A missing mandatory setting is
    /// an [`Error::Config`] and must abort the start of the process.
    pub fn load(
        env_vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Result<Self> {
        let env_vars: HashMap<String, String> = env_vars
            .into_iter()
            .map(|(key, val)| (key.into(), val.into()))
            .filter(|(key, _val)| key.starts_with("DECISION_"))
            .collect();

        let retry = RetryConfig {
            max_attempts: parse_var(&env_vars, ENV_RETRY_MAX_ATTEMPTS)?
                .unwrap_or(RetryConfig::default().max_attempts),
            interval: parse_var::<u64>(&env_vars, ENV_RETRY_INTERVAL_MS)?
                .map(Duration::from_millis),
        };

        let lifecycle = LifecycleConfig {
            internal_stream_prefix: env_vars
                .get(ENV_INTERNAL_STREAM_PREFIX)
                .cloned()
                .unwrap_or_else(|| DEFAULT_INTERNAL_STREAM_PREFIX.to_string()),
        };

        let replay = ReplayConfig {
            batch_size: parse_var(&env_vars, ENV_BATCH_SIZE)?.unwrap_or(DEFAULT_BATCH_SIZE),
            batch_time: Duration::from_millis(
                parse_var(&env_vars, ENV_BATCH_TIME_MS)?.unwrap_or(DEFAULT_BATCH_TIME_MS),
            ),
        };

        Ok(Settings {
            columnar: load_columnar(&env_vars)?,
            document: load_document(&env_vars)?,
            collection: load_collection(&env_vars)?,
            search: load_search(&env_vars)?,
            forward: load_forward(&env_vars)?,
            retry,
            print_streams: parse_var(&env_vars, ENV_PRINT_STREAMS)?.unwrap_or(false),
            lifecycle,
            replay,
        })
    }
}

fn load_columnar(env_vars: &HashMap<String, String>) -> Result<Option<ColumnarSinkConfig>> {
    let Some(hosts) = env_vars.get(ENV_COLUMNAR_HOSTS) else {
        return Ok(None);
    };

    let hosts = parse_hosts(hosts, ENV_COLUMNAR_HOSTS)?;

    let max_batch_size: i64 = parse_var(env_vars, ENV_COLUMNAR_MAX_BATCH_SIZE)?.ok_or_else(|| {
        Error::Config(format!(
            "Environment variable {ENV_COLUMNAR_MAX_BATCH_SIZE} is not set"
        ))
    })?;

    Ok(Some(ColumnarSinkConfig {
        hosts,
        port: parse_var(env_vars, ENV_COLUMNAR_PORT)?.unwrap_or(ColumnarSinkConfig::default_port()),
        max_batch_size: PartitionSize::from(max_batch_size),
        batch_type: parse_var::<BatchType>(env_vars, ENV_COLUMNAR_BATCH_TYPE)?.unwrap_or_default(),
        keyspace: env_vars
            .get(ENV_COLUMNAR_KEYSPACE)
            .cloned()
            .unwrap_or_else(|| ColumnarSinkConfig::default_keyspace().to_string()),
    }))
}

fn load_document(env_vars: &HashMap<String, String>) -> Result<Option<DocumentSinkConfig>> {
    let cloud: bool = parse_var(env_vars, ENV_DOCUMENT_CLOUD)?.unwrap_or(false);

    let mode = if cloud {
        let zk_host = env_vars.get(ENV_DOCUMENT_ZK_HOST).ok_or_else(|| {
            Error::Config(format!(
                "Environment variable {ENV_DOCUMENT_ZK_HOST} is not set, it is required in cloud mode"
            ))
        })?;
        DocumentStoreMode::Cloud {
            zk_host: zk_host.clone(),
        }
    } else {
        match env_vars.get(ENV_DOCUMENT_HOST) {
            Some(host) => DocumentStoreMode::Standalone { host: host.clone() },
            None => return Ok(None),
        }
    };

    Ok(Some(DocumentSinkConfig {
        mode,
        data_dir: env_vars.get(ENV_DOCUMENT_DATA_DIR).cloned(),
        max_batch_size: PartitionSize::from(
            parse_var(env_vars, ENV_DOCUMENT_MAX_BATCH_SIZE)?
                .unwrap_or(DEFAULT_MAX_BATCH_SIZE),
        ),
    }))
}

fn load_collection(env_vars: &HashMap<String, String>) -> Result<Option<CollectionSinkConfig>> {
    let Some(hosts) = env_vars.get(ENV_COLLECTION_HOSTS) else {
        return Ok(None);
    };

    let mut config = CollectionSinkConfig::new(
        parse_hosts(hosts, ENV_COLLECTION_HOSTS)?,
        parse_var(env_vars, ENV_COLLECTION_MAX_BATCH_SIZE)?.unwrap_or(DEFAULT_MAX_BATCH_SIZE),
    );
    config.username = env_vars.get(ENV_COLLECTION_USERNAME).cloned();
    config.password = env_vars.get(ENV_COLLECTION_PASSWORD).cloned();
    if config.username.is_some() != config.password.is_some() {
        return Err(Error::Config(format!(
            "{ENV_COLLECTION_USERNAME} and {ENV_COLLECTION_PASSWORD} must be set together"
        )));
    }
    if let Some(database) = env_vars.get(ENV_COLLECTION_DATABASE) {
        config.database = database.clone();
    }
    Ok(Some(config))
}

fn load_search(env_vars: &HashMap<String, String>) -> Result<Option<SearchSinkConfig>> {
    let Some(hosts) = env_vars.get(ENV_SEARCH_HOSTS) else {
        return Ok(None);
    };

    let mut config = SearchSinkConfig::new(
        parse_hosts(hosts, ENV_SEARCH_HOSTS)?,
        parse_var(env_vars, ENV_SEARCH_MAX_BATCH_SIZE)?.unwrap_or(DEFAULT_MAX_BATCH_SIZE),
    );
    if let Some(cluster_name) = env_vars.get(ENV_SEARCH_CLUSTER_NAME) {
        config.cluster_name = cluster_name.clone();
    }
    Ok(Some(config))
}

fn load_forward(env_vars: &HashMap<String, String>) -> Result<Option<ForwardSinkConfig>> {
    let Some(brokers) = env_vars.get(ENV_FORWARD_BROKERS) else {
        return Ok(None);
    };

    let mut config = ForwardSinkConfig::new(
        parse_hosts(brokers, ENV_FORWARD_BROKERS)?,
        parse_var(env_vars, ENV_FORWARD_MAX_BATCH_SIZE)?.unwrap_or(DEFAULT_MAX_BATCH_SIZE),
    );
    if let Some(prefix) = env_vars.get(ENV_FORWARD_TOPIC_PREFIX) {
        config.topic_prefix = prefix.clone();
    }
    Ok(Some(config))
}

/// Comma separated `host[:port]` list, at least one entry.
fn parse_hosts(hosts: &str, var: &str) -> Result<Vec<String>> {
    let hosts: Vec<String> = hosts
        .split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(String::from)
        .collect();
    if hosts.is_empty() {
        return Err(Error::Config(format!("{var} is empty")));
    }
    Ok(hosts)
}

fn parse_var<T>(env_vars: &HashMap<String, String>, var: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    env_vars
        .get(var)
        .map(|val| {
            val.trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Invalid value {val:?} for {var}: {e}")))
        })
        .transpose()
}
