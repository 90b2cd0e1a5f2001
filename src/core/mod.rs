// src/core/mod.rs

//! The central module containing command dispatch, the action services it drives,
//! and the shared event and statistics plumbing.

pub mod dispatch;
pub mod errors;
pub mod events;
pub mod services;
pub mod stats;

pub use dispatch::{Acknowledgement, DispatchOutcome, Dispatcher};
pub use errors::{ActionError, NexronError};
