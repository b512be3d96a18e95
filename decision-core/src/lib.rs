//! Sink persistence and stream lifecycle of the decision engine.
//!
//! Every micro-batch the engine emits is grouped by action type and handed to the
//! [ActionDispatcher], which runs the executor of each action type in its own actor:
//!   - [ColumnarSink] writes events into a columnar store, one table per stream
//!   - [DocumentSink] indexes events into a document store, one core per stream
//!   - [CollectionSink] inserts events into a document-collection store
//!   - [SearchSink] indexes events into a search engine, one index per stream
//!   - [ForwardSink] publishes events to a message broker, one topic per stream
//!   - [LogSink] prints them
//!
//! Streams, queries and persistence actions are created and dropped through the
//! [LifecycleController], which guards every operation with an ordered chain of validators.
//!
//! The store clients themselves are collaborators, see [operations].
//!
//! [ActionDispatcher]: sinker::sink::ActionDispatcher
//! [ColumnarSink]: sinker::sink::columnar::ColumnarSink
//! [DocumentSink]: sinker::sink::document::DocumentSink
//! [CollectionSink]: sinker::sink::collection::CollectionSink
//! [SearchSink]: sinker::sink::search::SearchSink
//! [ForwardSink]: sinker::sink::forward::ForwardSink
//! [LogSink]: sinker::sink::log::LogSink
//! [LifecycleController]: lifecycle::LifecycleController

pub use self::error::{Error, Result};

mod error;

/// Settings read from the environment.
pub mod config;

/// Events of a micro-batch and their columns.
pub mod message;

/// Local views of remote state, loaded on first use and created on miss.
mod cache;

pub mod operations;

pub mod sinker;

pub mod lifecycle;

#[cfg(test)]
pub(crate) mod test_utils;

pub use crate::config::Settings;
pub use crate::lifecycle::{LifecycleController, Reply, ReplyCode, ValidationError, ValidationRequest};
pub use crate::message::{ActionType, Column, ColumnType, ColumnValue, StreamEvent};
pub use crate::sinker::builder::ActionDispatcherBuilder;
pub use crate::sinker::sink::{ActionDispatcher, ActionExecutor, group_by_action};
