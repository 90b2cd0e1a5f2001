// src/connection/guard.rs

//! Defines `ConnectionGuard`, an RAII guard for connection bookkeeping.

use crate::core::events::EventBus;
use crate::core::stats::StatsState;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::debug;

/// Registers a connection on creation and reports its end when dropped, so the
/// active-connection count and the disconnect log line are correct on every exit
/// path of a handler, including panics.
pub struct ConnectionGuard {
    stats: Arc<StatsState>,
    events: EventBus,
    addr: SocketAddr,
}

impl ConnectionGuard {
    pub(crate) fn new(stats: Arc<StatsState>, events: EventBus, addr: SocketAddr) -> Self {
        stats.connection_opened();
        events.log(format!("Client connected: {addr}"));
        Self {
            stats,
            events,
            addr,
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        debug!(
            "ConnectionGuard dropping, cleaning up resources for connection {}",
            self.addr
        );
        self.stats.connection_closed();
        self.events
            .log(format!("Client disconnected: {}", self.addr));
    }
}
