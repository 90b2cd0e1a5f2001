// src/core/errors.rs

//! Defines the error types used across the listener, connection and dispatch layers.

use thiserror::Error;

/// The main error enum, representing failures of the server and its connections.
///
/// Only `Bind` ever escapes the control surface; every other variant is contained
/// within the connection that produced it.
#[derive(Error, Debug)]
pub enum NexronError {
    #[error("Failed to bind listener on {host}:{port}: {source}")]
    Bind {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid UTF-8 in command: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("Command exceeds the maximum length of {0} bytes")]
    CommandTooLong(usize),

    #[error("Connection idle for more than {0} seconds")]
    IdleTimeout(u64),
}

impl NexronError {
    /// Returns true for errors that just mean the peer went away.
    pub fn is_normal_disconnect(&self) -> bool {
        matches!(self, NexronError::Io(e) if matches!(
            e.kind(),
            std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::UnexpectedEof
                | std::io::ErrorKind::ConnectionAborted
        ))
    }
}

/// Failure of an external action service. Always recovered by the dispatcher.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}")]
    CommandFailed { program: String, status: String },

    #[error("No command is configured for {0}")]
    Unsupported(&'static str),

    #[error("Action timed out after {0} ms")]
    Timeout(u64),

    #[error("Action panicked: {0}")]
    Panicked(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
}

impl ActionError {
    /// Returns true if the failure was caused by a missing executable.
    pub fn is_not_found(&self) -> bool {
        matches!(self, ActionError::Launch { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}
