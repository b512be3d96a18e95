use tracing::debug;

use crate::lifecycle::{ReplyCode, ValidationError, ValidationRequest};
use crate::message::ActionType;
use crate::operations::StreamOperations;

/// A single precondition of a lifecycle command. Each rule either passes or fails with exactly
/// one [ReplyCode].
#[derive(Debug, Clone, PartialEq)]
pub enum Validator {
    /// The request names a stream.
    StreamNameNotEmpty,
    /// No stream with the requested name exists yet.
    StreamIsNew,
    /// The requested stream exists. Requests without a stream name pass, that case belongs to
    /// [Validator::StreamNameNotEmpty].
    StreamExists,
    /// The stream was created by a user, not by the engine itself.
    StreamIsUserDefined { internal_prefix: String },
    /// The stream does not run the requested query yet.
    QueryIsNew,
    /// The stream runs the requested query.
    QueryExists,
    /// The action of the command is not enabled on the stream yet.
    ActionDisabled(ActionType),
    /// The action of the command is enabled on the stream.
    ActionEnabled(ActionType),
}

fn query(request: &ValidationRequest) -> Result<&str, ValidationError> {
    request.query.as_deref().ok_or_else(|| {
        ValidationError::new(
            ReplyCode::ParserError,
            format!("Request for stream {} carries no query", request.stream_name),
        )
    })
}

impl Validator {
    pub async fn validate<S>(
        &self,
        operations: &S,
        request: &ValidationRequest,
    ) -> Result<(), ValidationError>
    where
        S: StreamOperations,
    {
        let stream = request.stream_name.as_str();
        match self {
            Validator::StreamNameNotEmpty => {
                if stream.is_empty() {
                    return Err(ValidationError::new(
                        ReplyCode::StreamNameEmpty,
                        "Stream name cannot be empty",
                    ));
                }
            }
            Validator::StreamIsNew => {
                if operations.stream_exists(stream).await {
                    return Err(ValidationError::new(
                        ReplyCode::StreamAlreadyExists,
                        format!("Stream {stream} already exists"),
                    ));
                }
            }
            Validator::StreamExists => {
                if !stream.is_empty() && !operations.stream_exists(stream).await {
                    return Err(ValidationError::new(
                        ReplyCode::StreamDoesNotExist,
                        format!("Stream {stream} does not exist"),
                    ));
                }
            }
            Validator::StreamIsUserDefined { internal_prefix } => {
                if stream.starts_with(internal_prefix.as_str()) {
                    return Err(ValidationError::new(
                        ReplyCode::StreamIsNotUserDefined,
                        format!("Stream {stream} is internal and cannot be modified"),
                    ));
                }
            }
            Validator::QueryIsNew => {
                if operations.query_exists(stream, query(request)?).await {
                    return Err(ValidationError::new(
                        ReplyCode::QueryAlreadyExists,
                        format!("Query in stream {stream} already exists"),
                    ));
                }
            }
            Validator::QueryExists => {
                if !operations.query_exists(stream, query(request)?).await {
                    return Err(ValidationError::new(
                        ReplyCode::QueryDoesNotExist,
                        format!("Query in stream {stream} does not exist"),
                    ));
                }
            }
            Validator::ActionDisabled(action) => {
                if operations.is_action_enabled(stream, *action).await {
                    return Err(ValidationError::new(
                        ReplyCode::ActionAlreadyEnabled,
                        format!("Action {action} is already enabled on stream {stream}"),
                    ));
                }
            }
            Validator::ActionEnabled(action) => {
                if !operations.is_action_enabled(stream, *action).await {
                    return Err(ValidationError::new(
                        ReplyCode::ActionNotEnabled,
                        format!("Action {action} is not enabled on stream {stream}"),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Validators of one direction of a command, run in the order they were declared. The first
/// failure ends the chain.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValidatorChain(Vec<Validator>);

impl ValidatorChain {
    pub fn new(validators: Vec<Validator>) -> Self {
        Self(validators)
    }

    pub fn validators(&self) -> &[Validator] {
        &self.0
    }

    pub async fn validate<S>(
        &self,
        operations: &S,
        request: &ValidationRequest,
    ) -> Result<(), ValidationError>
    where
        S: StreamOperations,
    {
        for validator in &self.0 {
            debug!(?validator, stream = %request.stream_name, "Validating");
            validator.validate(operations, request).await?;
        }
        Ok(())
    }
}
