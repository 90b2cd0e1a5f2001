// src/connection/mod.rs

//! Manages the lifecycle of a single client TCP connection: framing the byte
//! stream into commands, dispatching them, and writing acknowledgements.

mod codec;
mod guard;
mod handler;

pub use codec::CommandCodec;
pub use guard::ConnectionGuard;
pub use handler::ConnectionHandler;
