// src/server/context.rs

use crate::config::{Config, ConnectionConfig};
use crate::core::dispatch::{ActionRegistry, DispatchSettings, Dispatcher};
use crate::core::events::EventBus;
use crate::core::services::ActionServices;
use crate::core::stats::StatsState;
use std::sync::Arc;

/// Everything a connection handler needs, shared by all connections of a server.
pub struct ServerContext {
    pub dispatcher: Arc<Dispatcher>,
    pub events: EventBus,
    pub stats: Arc<StatsState>,
    pub connection: ConnectionConfig,
}

impl ServerContext {
    /// Wires the dispatcher with the default rule table.
    pub fn new(config: &Config, services: ActionServices, events: EventBus) -> Self {
        let stats = Arc::new(StatsState::new());
        let dispatcher = Dispatcher::new(
            ActionRegistry::default(),
            services,
            DispatchSettings::from_config(config),
            events.clone(),
            stats.clone(),
        );
        Self {
            dispatcher: Arc::new(dispatcher),
            events,
            stats,
            connection: config.connection.clone(),
        }
    }
}
