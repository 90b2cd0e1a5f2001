// src/server/mod.rs

//! The control surface: starting and stopping the command listener.

use crate::config::Config;
use crate::core::NexronError;
use crate::core::events::{EventBus, LogEvent, ServerStatus};
use crate::core::services::{ActionServices, SpeechSynth};
use crate::core::stats::StatsState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

mod connection_loop;
mod context;
mod initialization;

pub use context::ServerContext;
pub use initialization::local_ip_address;

pub const STARTED_SPEECH: &str = "Server started. Waiting for commands.";
pub const STOPPED_SPEECH: &str = "Server stopped";

/// State that exists only while the listener is up.
struct RunningServer {
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    accept_task: JoinHandle<()>,
}

/// A handle to one command server. `start` and `stop` may be called from any
/// task, at any time; redundant calls are no-ops.
pub struct Server {
    config: Config,
    ctx: Arc<ServerContext>,
    speech: Arc<dyn SpeechSynth>,
    running: Mutex<Option<RunningServer>>,
}

impl Server {
    /// Creates a stopped server and spawns its event sink. Must be called from
    /// within a Tokio runtime.
    pub fn new(config: Config, services: ActionServices) -> Self {
        let events = EventBus::spawn(config.log_file.as_ref().map(PathBuf::from));
        Self::with_events(config, services, events)
    }

    /// Creates a stopped server publishing to an existing event bus.
    pub fn with_events(config: Config, services: ActionServices, events: EventBus) -> Self {
        let speech = services.speech.clone();
        let ctx = Arc::new(ServerContext::new(&config, services, events));
        Self {
            config,
            ctx,
            speech,
            running: Mutex::new(None),
        }
    }

    /// Binds the listener on the configured host and `port` and starts accepting
    /// connections. Port `0` picks an ephemeral port; see `local_addr`.
    pub async fn start(&self, port: u16) -> Result<(), NexronError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!("Start requested while already running; ignoring.");
            return Ok(());
        }

        let events = &self.ctx.events;
        let listener = match initialization::bind_listener(&self.config.host, port).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("{}", e);
                events.log(format!("Server start error: {e}"));
                events.status(ServerStatus::Error);
                return Err(e);
            }
        };
        let local_addr = listener.local_addr()?;

        events.status(ServerStatus::Running);
        events.log(format!("TCP Server started on port {}", local_addr.port()));
        events.log(format!("=== Server Started on Port {} ===", local_addr.port()));
        let local_ip = initialization::local_ip_address()
            .await
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        events.log(format!("Local IP: {local_ip}"));
        for warning in self.config.startup_warnings() {
            warn!("{}", warning);
            events.log(format!("Warning: {warning}"));
        }

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let accept_task = tokio::spawn(connection_loop::run(
            listener,
            self.ctx.clone(),
            shutdown_rx,
        ));

        *running = Some(RunningServer {
            local_addr,
            shutdown_tx,
            accept_task,
        });
        self.announce(STARTED_SPEECH);
        Ok(())
    }

    /// Closes the listener. Open connections keep running until their clients
    /// disconnect.
    ///
    /// The state lock is held until the listener is closed, so a `start` racing
    /// with this call binds only after the port is free again.
    pub async fn stop(&self) {
        let mut guard = self.running.lock().await;
        let Some(running) = guard.take() else {
            debug!("Stop requested while not running; ignoring.");
            return;
        };

        if running.shutdown_tx.send(()).is_err() {
            debug!("Accept loop already exited before shutdown was signalled.");
        }
        if let Err(e) = running.accept_task.await {
            error!("Accept loop terminated abnormally: {e:?}");
        }

        info!("Listener on {} closed.", running.local_addr);
        self.ctx.events.status(ServerStatus::Stopped);
        self.ctx.events.log("Server stopped");
        drop(guard);
        self.announce(STOPPED_SPEECH);
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// The address the listener is bound to, while running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|r| r.local_addr)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.ctx.events
    }

    pub fn stats(&self) -> &StatsState {
        &self.ctx.stats
    }

    /// Every log line published from now on (the `OnLogEvent` feed).
    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogEvent> {
        self.ctx.events.subscribe_logs()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ServerStatus> {
        self.ctx.events.subscribe_status()
    }

    /// Speaks a lifecycle announcement in the background.
    fn announce(&self, text: &'static str) {
        if !self.config.dispatch.announce_lifecycle {
            return;
        }
        let speech = self.speech.clone();
        let events = self.ctx.events.clone();
        let timeout = Duration::from_millis(self.config.dispatch.speech_timeout_ms);
        tokio::spawn(async move {
            match tokio::time::timeout(timeout, speech.speak(text)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => events.log(format!("Speech error: {e}")),
                Err(_) => events.log("Speech error: announcement timed out"),
            }
        });
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        // Without an explicit stop the accept loop would outlive its handle.
        if let Some(running) = self.running.get_mut().take() {
            let _ = running.shutdown_tx.send(());
        }
    }
}
