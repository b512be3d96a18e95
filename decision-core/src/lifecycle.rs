//! Creation and destruction of streams, queries and persistence actions.
//!
//! Every lifecycle operation is a [StreamCommand] with a start and a stop label. Before a
//! command touches the stream registry, the [ValidatorChain] of the requested direction runs in
//! its declared order, and the first violated rule decides the [ReplyCode] the caller gets back.

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::LifecycleConfig;
use crate::message::{ActionType, Column};
use crate::operations::StreamOperations;

mod command;
mod validator;

pub use command::{ActionCommand, CreateStreamCommand, QueryCommand, StreamCommand};
pub use validator::{Validator, ValidatorChain};

/// Stable codes of the replies sent back to the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyCode {
    Ok,
    ParserError,
    StreamAlreadyExists,
    StreamDoesNotExist,
    QueryAlreadyExists,
    GeneralError,
    QueryDoesNotExist,
    StreamIsNotUserDefined,
    ActionAlreadyEnabled,
    ActionNotEnabled,
    StreamNameEmpty,
}

impl ReplyCode {
    pub fn code(&self) -> u8 {
        match self {
            ReplyCode::Ok => 1,
            ReplyCode::ParserError => 2,
            ReplyCode::StreamAlreadyExists => 3,
            ReplyCode::StreamDoesNotExist => 4,
            ReplyCode::QueryAlreadyExists => 5,
            ReplyCode::GeneralError => 7,
            ReplyCode::QueryDoesNotExist => 11,
            ReplyCode::StreamIsNotUserDefined => 12,
            ReplyCode::ActionAlreadyEnabled => 15,
            ReplyCode::ActionNotEnabled => 16,
            ReplyCode::StreamNameEmpty => 17,
        }
    }
}

/// A violated business rule. Never retried, always reaches the requester.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} (code {})", .code.code())]
pub struct ValidationError {
    pub code: ReplyCode,
    pub message: String,
}

impl ValidationError {
    pub fn new(code: ReplyCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// A lifecycle request as received from the request layer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequest {
    pub request_id: String,
    /// Start or stop label of the command to run.
    pub operation: String,
    pub stream_name: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    /// Query text, for query commands.
    #[serde(default)]
    pub query: Option<String>,
}

impl ValidationRequest {
    pub fn new(
        request_id: impl Into<String>,
        operation: impl Into<String>,
        stream_name: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            operation: operation.into(),
            stream_name: stream_name.into(),
            columns: Vec::new(),
            query: None,
        }
    }

    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub request_id: String,
    pub code: ReplyCode,
    pub description: Option<String>,
}

/// Runs the lifecycle commands against the stream registry.
pub struct LifecycleController<S> {
    operations: S,
    create_stream: CreateStreamCommand,
    query: QueryCommand,
    actions: Vec<ActionCommand>,
}

impl<S: StreamOperations> LifecycleController<S> {
    pub fn new(operations: S, config: &LifecycleConfig) -> Self {
        Self {
            operations,
            create_stream: CreateStreamCommand::new(&config.internal_stream_prefix),
            query: QueryCommand::new(),
            actions: ActionType::ALL.into_iter().map(ActionCommand::new).collect(),
        }
    }

    /// Runs the command whose start or stop label matches the request operation, compared
    /// case-insensitively. Requests no command answers to get no reply.
    pub async fn handle(&self, request: &ValidationRequest) -> Option<Reply> {
        if let Some(reply) = self.try_command(&self.create_stream, request).await {
            return Some(reply);
        }
        if let Some(reply) = self.try_command(&self.query, request).await {
            return Some(reply);
        }
        for action in &self.actions {
            if let Some(reply) = self.try_command(action, request).await {
                return Some(reply);
            }
        }

        warn!(operation = %request.operation, request_id = %request.request_id, "Unknown lifecycle operation, ignoring");
        None
    }

    async fn try_command<C>(&self, command: &C, request: &ValidationRequest) -> Option<Reply>
    where
        C: StreamCommand<S>,
    {
        let outcome = if command
            .start_operation()
            .eq_ignore_ascii_case(&request.operation)
        {
            match command
                .start_validators()
                .validate(&self.operations, request)
                .await
            {
                Ok(()) => command.start_action(&self.operations, request).await,
                Err(e) => Err(e),
            }
        } else if command
            .stop_operation()
            .eq_ignore_ascii_case(&request.operation)
        {
            match command
                .stop_validators()
                .validate(&self.operations, request)
                .await
            {
                Ok(()) => command.stop_action(&self.operations, request).await,
                Err(e) => Err(e),
            }
        } else {
            return None;
        };

        Some(match outcome {
            Ok(()) => {
                info!(
                    operation = %request.operation,
                    stream = %request.stream_name,
                    "Lifecycle operation applied"
                );
                Reply {
                    request_id: request.request_id.clone(),
                    code: ReplyCode::Ok,
                    description: None,
                }
            }
            Err(error) => {
                warn!(
                    operation = %request.operation,
                    stream = %request.stream_name,
                    %error,
                    "Lifecycle operation rejected"
                );
                Reply {
                    request_id: request.request_id.clone(),
                    code: error.code,
                    description: Some(error.message),
                }
            }
        })
    }
}
