//! Bounded retries for writes against unreliable remote stores.
//!
//! [`RetryStrategy`] is a small state machine that counts failed attempts and decides whether
//! another attempt may be made. Attempts are immediate unless a delay [`strategy`] is attached.

pub use retry::{RetryError, RetryState, RetryStrategy};

/// Retry state machine.
mod retry;

/// Delay strategies that can be attached to a [`RetryStrategy`].
pub mod strategy;
