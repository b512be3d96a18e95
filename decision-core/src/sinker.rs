//! The [ActionExecutor]s are the endpoints of a micro-batch: every event the engine emits is
//! attributed to an action type, and the executor registered for that action type persists it
//! into (or prints it to) an external system.
//!
//! The [ActionDispatcher] uses an actor-based pattern where:
//!   - [ExecutorActor] owns one executor and processes its groups strictly sequentially
//!   - [ActionDispatcher] fans out the groups of a tick to the actors and waits for all of them
//!
//! Error handling: failures never leave an executor. A failing partition is logged with its size
//! and ends the current `process` call, the events of the remaining partitions of that call are
//! dropped. Persistence is best-effort, availability is preferred over durability.
//!
//! [ActionExecutor]: sink::ActionExecutor
//! [ActionDispatcher]: sink::ActionDispatcher
//! [ExecutorActor]: actor::ExecutorActor
pub mod sink;

mod actor;

pub mod builder;
