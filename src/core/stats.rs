// src/core/stats.rs

//! Contains server-wide statistics counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Holds all counters related to connections and dispatched commands.
#[derive(Debug)]
pub struct StatsState {
    /// The total number of connections accepted since the server was created.
    total_connections: AtomicU64,
    /// The number of connections whose handler is still running.
    active_connections: AtomicU64,
    /// The total number of commands handed to the dispatcher.
    total_commands: AtomicU64,
    /// Commands that matched no rule.
    unmatched_commands: AtomicU64,
    /// Commands whose action failed.
    failed_actions: AtomicU64,
}

impl Default for StatsState {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsState {
    /// Creates a new `StatsState` with zeroed counters.
    pub fn new() -> Self {
        Self {
            total_connections: AtomicU64::new(0),
            active_connections: AtomicU64::new(0),
            total_commands: AtomicU64::new(0),
            unmatched_commands: AtomicU64::new(0),
            failed_actions: AtomicU64::new(0),
        }
    }

    /// Records a newly accepted connection.
    pub fn connection_opened(&self) {
        self.total_connections.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the end of a connection handler.
    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get_total_connections(&self) -> u64 {
        self.total_connections.load(Ordering::Relaxed)
    }

    pub fn get_active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Relaxed)
    }

    pub fn increment_total_commands(&self) {
        self.total_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_total_commands(&self) -> u64 {
        self.total_commands.load(Ordering::Relaxed)
    }

    pub fn increment_unmatched_commands(&self) {
        self.unmatched_commands.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_unmatched_commands(&self) -> u64 {
        self.unmatched_commands.load(Ordering::Relaxed)
    }

    pub fn increment_failed_actions(&self) {
        self.failed_actions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_failed_actions(&self) -> u64 {
        self.failed_actions.load(Ordering::Relaxed)
    }
}
