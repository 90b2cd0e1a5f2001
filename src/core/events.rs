// src/core/events.rs

//! The event sink: a single task that serializes every user-visible notification.
//!
//! Connection tasks, the dispatcher and the server loop never touch the log file or
//! subscriber channels directly. They push `ServerEvent`s into an unbounded channel and
//! the `EventSink` task applies them one at a time, so the log file only ever has one
//! writer and presentation layers observe events in a single, consistent order.

use chrono::{DateTime, Local};
use std::fmt;
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info};

/// Capacity of the broadcast channel feeding log subscribers. Slow subscribers
/// lag and lose lines rather than holding up the sink.
const LOG_SUBSCRIBER_CAPACITY: usize = 1024;

/// The lifecycle state of the server, as shown to a control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Stopped,
    Running,
    Error,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerStatus::Stopped => write!(f, "Stopped"),
            ServerStatus::Running => write!(f, "Running"),
            ServerStatus::Error => write!(f, "Error"),
        }
    }
}

/// One timestamped log line.
#[derive(Debug, Clone)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub message: String,
}

impl LogEvent {
    /// Formats the event as it is written to the log file.
    pub fn to_log_line(&self) -> String {
        format!(
            "[{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.message
        )
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// Work items processed by the sink task.
#[derive(Debug)]
enum ServerEvent {
    Log(LogEvent),
    Status(ServerStatus),
    /// Acknowledged once every event queued before it has been applied.
    Flush(oneshot::Sender<()>),
}

/// A cheaply cloneable handle for publishing events and subscribing to them.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: mpsc::UnboundedSender<ServerEvent>,
    log_tx: broadcast::Sender<LogEvent>,
    status_rx: watch::Receiver<ServerStatus>,
}

impl EventBus {
    /// Creates a new `EventBus` and the `EventSink` that must be spawned to drain it.
    pub fn new(log_file: Option<PathBuf>) -> (Self, EventSink) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (log_tx, _) = broadcast::channel(LOG_SUBSCRIBER_CAPACITY);
        let (status_tx, status_rx) = watch::channel(ServerStatus::Stopped);

        let bus = Self {
            sender,
            log_tx: log_tx.clone(),
            status_rx,
        };
        let sink = EventSink {
            receiver,
            log_tx,
            status_tx,
            log_path: log_file,
            file: None,
        };
        (bus, sink)
    }

    /// Creates a bus and spawns its sink onto the current Tokio runtime.
    pub fn spawn(log_file: Option<PathBuf>) -> Self {
        let (bus, sink) = Self::new(log_file);
        tokio::spawn(sink.run());
        bus
    }

    /// Queues a log line. Never blocks and never fails; events published after the
    /// sink has stopped are dropped.
    pub fn log(&self, message: impl Into<String>) {
        let event = LogEvent {
            timestamp: Local::now(),
            message: message.into(),
        };
        let _ = self.sender.send(ServerEvent::Log(event));
    }

    /// Queues a status change.
    pub fn status(&self, status: ServerStatus) {
        let _ = self.sender.send(ServerEvent::Status(status));
    }

    /// Subscribes to every log line published after this call.
    pub fn subscribe_logs(&self) -> broadcast::Receiver<LogEvent> {
        self.log_tx.subscribe()
    }

    /// Returns a receiver that always holds the latest server status.
    pub fn subscribe_status(&self) -> watch::Receiver<ServerStatus> {
        self.status_rx.clone()
    }

    /// Waits until every event queued before this call has been applied.
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.sender.send(ServerEvent::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

/// The consumer side of the `EventBus`. Runs until every bus handle is dropped.
pub struct EventSink {
    receiver: mpsc::UnboundedReceiver<ServerEvent>,
    log_tx: broadcast::Sender<LogEvent>,
    status_tx: watch::Sender<ServerStatus>,
    log_path: Option<PathBuf>,
    file: Option<File>,
}

impl EventSink {
    /// The main loop for the sink task.
    pub async fn run(mut self) {
        while let Some(event) = self.receiver.recv().await {
            match event {
                ServerEvent::Log(event) => {
                    info!(target: "nexron::events", "{}", event.message);
                    self.append_to_file(&event).await;
                    // No subscribers is the normal headless case.
                    let _ = self.log_tx.send(event);
                }
                ServerEvent::Status(status) => {
                    self.status_tx.send_replace(status);
                }
                ServerEvent::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!("Event sink stopped: all publishers dropped.");
    }

    /// Appends one line to the log file. Failures are swallowed; the file is
    /// reopened on the next event.
    async fn append_to_file(&mut self, event: &LogEvent) {
        let Some(path) = self.log_path.as_ref() else {
            return;
        };

        if self.file.is_none() {
            match OpenOptions::new().create(true).append(true).open(path).await {
                Ok(file) => self.file = Some(file),
                Err(e) => {
                    debug!("Could not open log file '{}': {}", path.display(), e);
                    return;
                }
            }
        }

        let line = format!("{}\n", event.to_log_line());
        if let Some(file) = self.file.as_mut() {
            let result = match file.write_all(line.as_bytes()).await {
                Ok(()) => file.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                debug!("Could not write to log file '{}': {}", path.display(), e);
                self.file = None;
            }
        }
    }
}
