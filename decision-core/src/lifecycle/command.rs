use crate::lifecycle::validator::{Validator, ValidatorChain};
use crate::lifecycle::{ReplyCode, ValidationError, ValidationRequest};
use crate::message::ActionType;
use crate::operations::StreamOperations;

const CREATE_STREAM: &str = "create";
const DROP_STREAM: &str = "drop";
const ADD_QUERY: &str = "add_query";
const REMOVE_QUERY: &str = "remove_query";

/// A lifecycle operation with a start and a stop direction. Each direction is guarded by its own
/// [ValidatorChain], the action itself only runs once the chain passed.
#[trait_variant::make(StreamCommand: Send)]
#[allow(dead_code, async_fn_in_trait)]
pub trait LocalStreamCommand<S> {
    fn start_operation(&self) -> &str;

    fn stop_operation(&self) -> &str;

    fn start_validators(&self) -> &ValidatorChain;

    fn stop_validators(&self) -> &ValidatorChain;

    async fn start_action(
        &self,
        operations: &S,
        request: &ValidationRequest,
    ) -> Result<(), ValidationError>;

    async fn stop_action(
        &self,
        operations: &S,
        request: &ValidationRequest,
    ) -> Result<(), ValidationError>;
}

fn query(request: &ValidationRequest) -> Result<&str, ValidationError> {
    request.query.as_deref().ok_or_else(|| {
        ValidationError::new(ReplyCode::ParserError, "Query request carries no query")
    })
}

/// Creates and drops streams.
#[derive(Debug, Clone)]
pub struct CreateStreamCommand {
    start: ValidatorChain,
    stop: ValidatorChain,
}

impl CreateStreamCommand {
    /// Streams whose name starts with `internal_prefix` belong to the engine and are never
    /// dropped on request.
    pub fn new(internal_prefix: &str) -> Self {
        Self {
            start: ValidatorChain::new(vec![Validator::StreamNameNotEmpty, Validator::StreamIsNew]),
            stop: ValidatorChain::new(vec![
                Validator::StreamExists,
                Validator::StreamIsUserDefined {
                    internal_prefix: internal_prefix.to_string(),
                },
            ]),
        }
    }
}

impl<S: StreamOperations> StreamCommand<S> for CreateStreamCommand {
    fn start_operation(&self) -> &str {
        CREATE_STREAM
    }

    fn stop_operation(&self) -> &str {
        DROP_STREAM
    }

    fn start_validators(&self) -> &ValidatorChain {
        &self.start
    }

    fn stop_validators(&self) -> &ValidatorChain {
        &self.stop
    }

    async fn start_action(
        &self,
        operations: &S,
        request: &ValidationRequest,
    ) -> Result<(), ValidationError> {
        operations
            .create_stream(&request.stream_name, &request.columns)
            .await
            .map_err(|e| ValidationError::new(ReplyCode::ParserError, e.to_string()))
    }

    async fn stop_action(
        &self,
        operations: &S,
        request: &ValidationRequest,
    ) -> Result<(), ValidationError> {
        operations
            .drop_stream(&request.stream_name)
            .await
            .map_err(|e| ValidationError::new(ReplyCode::GeneralError, e.to_string()))
    }
}

/// Adds queries to and removes queries from existing streams.
#[derive(Debug, Clone)]
pub struct QueryCommand {
    start: ValidatorChain,
    stop: ValidatorChain,
}

impl Default for QueryCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCommand {
    pub fn new() -> Self {
        Self {
            start: ValidatorChain::new(vec![Validator::StreamExists, Validator::QueryIsNew]),
            stop: ValidatorChain::new(vec![Validator::StreamExists, Validator::QueryExists]),
        }
    }
}

impl<S: StreamOperations> StreamCommand<S> for QueryCommand {
    fn start_operation(&self) -> &str {
        ADD_QUERY
    }

    fn stop_operation(&self) -> &str {
        REMOVE_QUERY
    }

    fn start_validators(&self) -> &ValidatorChain {
        &self.start
    }

    fn stop_validators(&self) -> &ValidatorChain {
        &self.stop
    }

    async fn start_action(
        &self,
        operations: &S,
        request: &ValidationRequest,
    ) -> Result<(), ValidationError> {
        operations
            .add_query(&request.stream_name, query(request)?)
            .await
            .map_err(|e| ValidationError::new(ReplyCode::GeneralError, e.to_string()))
    }

    async fn stop_action(
        &self,
        operations: &S,
        request: &ValidationRequest,
    ) -> Result<(), ValidationError> {
        operations
            .remove_query(&request.stream_name, query(request)?)
            .await
            .map_err(|e| ValidationError::new(ReplyCode::GeneralError, e.to_string()))
    }
}

/// Enables and disables one [ActionType] on existing streams.
#[derive(Debug, Clone)]
pub struct ActionCommand {
    action: ActionType,
    start: ValidatorChain,
    stop: ValidatorChain,
}

impl ActionCommand {
    pub fn new(action: ActionType) -> Self {
        Self {
            action,
            start: ValidatorChain::new(vec![
                Validator::StreamExists,
                Validator::ActionDisabled(action),
            ]),
            stop: ValidatorChain::new(vec![
                Validator::StreamExists,
                Validator::ActionEnabled(action),
            ]),
        }
    }
}

impl<S: StreamOperations> StreamCommand<S> for ActionCommand {
    fn start_operation(&self) -> &str {
        self.action.start_operation()
    }

    fn stop_operation(&self) -> &str {
        self.action.stop_operation()
    }

    fn start_validators(&self) -> &ValidatorChain {
        &self.start
    }

    fn stop_validators(&self) -> &ValidatorChain {
        &self.stop
    }

    async fn start_action(
        &self,
        operations: &S,
        request: &ValidationRequest,
    ) -> Result<(), ValidationError> {
        operations
            .enable_action(&request.stream_name, self.action)
            .await
            .map_err(|e| ValidationError::new(ReplyCode::GeneralError, e.to_string()))
    }

    async fn stop_action(
        &self,
        operations: &S,
        request: &ValidationRequest,
    ) -> Result<(), ValidationError> {
        operations
            .disable_action(&request.stream_name, self.action)
            .await
            .map_err(|e| ValidationError::new(ReplyCode::GeneralError, e.to_string()))
    }
}
