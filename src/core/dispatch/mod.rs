// src/core/dispatch/mod.rs

//! Command matching and execution: the ordered action registry and the dispatcher
//! that drives it.

pub mod dispatcher;
pub mod registry;

pub use dispatcher::{Acknowledgement, DispatchOutcome, DispatchSettings, Dispatcher};
pub use registry::{ActionKind, ActionRegistry, ActionRule};
