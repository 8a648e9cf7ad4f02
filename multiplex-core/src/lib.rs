//! In-process message-passing runtime: services with bounded inboxes and
//! dynamically resized worker pools, a request/reply envelope with
//! one-shot completion, a controller that routes messages between
//! registered services by identifier, and the synchronized numeric cells
//! that back worker accounting and diagnostics.
//!
//! No persistent, CLI, or wire surface — the only boundaries are the types
//! in this crate and the ambient `tracing` log lines each worker emits on
//! start/exit.

#[macro_use]
mod error;
pub use error::{AnyError, AnyResult, ProgressError};

pub mod controller;
pub mod diag;
pub mod message;
pub mod service;
pub mod state;
pub mod sync;

pub use controller::{Router, ServiceController};
pub use message::{ExecParams, Reply, ReplyWaiter, RouteExtra, ServiceMessage, EXIT};
pub use service::{ProcessHook, Service, ServiceCore};
pub use state::{HookState, ProcessState};
pub use sync::{Int64Cell, SyncCell, Uint64Cell};
