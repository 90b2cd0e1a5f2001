// src/core/dispatch/dispatcher.rs

//! Routes a received command to its action and produces the acknowledgement.
//!
//! Whatever happens inside an action, `dispatch` always returns an acknowledgement:
//! failures are logged, spoken, and counted, but never surface to the caller.

use super::registry::{ActionKind, ActionRegistry, ActionRule, normalize};
use crate::config::{AppsConfig, CommandTemplate, Config};
use crate::core::errors::ActionError;
use crate::core::events::EventBus;
use crate::core::services::{ActionServices, PowerAction};
use crate::core::stats::StatsState;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, debug, info_span, warn};

pub const MUSIC_FALLBACK_CONFIRMATION: &str = "Opening media player";
pub const ERROR_SPEECH: &str = "An error occurred while processing the command";
pub const EXECUTED_SPEECH: &str = "Command executed";
pub const NOT_EXECUTED_SPEECH: &str = "Command could not be executed";

/// Formats the reply sent back to the client for one command.
pub fn acknowledgement_text(command: &str) -> String {
    format!("Command processed: {command}")
}

/// Which branch of the dispatcher handled a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A rule matched and its action succeeded.
    Matched(ActionKind),
    /// No rule matched. `executed` reports whether the shell accepted the command.
    Fallback { executed: bool },
    /// A rule matched but its action failed.
    Failed(ActionKind),
}

/// The result of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acknowledgement {
    text: String,
    outcome: DispatchOutcome,
}

impl Acknowledgement {
    /// The text written back on the wire.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn outcome(&self) -> &DispatchOutcome {
        &self.outcome
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Tunables for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub shell_fallback: bool,
    pub speech_timeout: Duration,
    pub apps: AppsConfig,
}

impl DispatchSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            shell_fallback: config.dispatch.shell_fallback,
            speech_timeout: Duration::from_millis(config.dispatch.speech_timeout_ms),
            apps: config.actions.apps.clone(),
        }
    }
}

/// Evaluates commands against the registry and drives the action services.
pub struct Dispatcher {
    registry: ActionRegistry,
    services: ActionServices,
    settings: DispatchSettings,
    events: EventBus,
    stats: Arc<StatsState>,
}

impl Dispatcher {
    pub fn new(
        registry: ActionRegistry,
        services: ActionServices,
        settings: DispatchSettings,
        events: EventBus,
        stats: Arc<StatsState>,
    ) -> Self {
        Self {
            registry,
            services,
            settings,
            events,
            stats,
        }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Handles one command as received from a client (already trimmed by the
    /// connection layer, but not normalized).
    pub async fn dispatch(&self, command: &str) -> Acknowledgement {
        let command = command.trim();
        let normalized = normalize(command);
        let span = info_span!("dispatch", command = %normalized);

        async move {
            self.stats.increment_total_commands();

            let outcome = match self.registry.find(&normalized) {
                Some(rule) => self.run_rule(rule, &normalized).await,
                None => self.run_fallback(command, &normalized).await,
            };
            debug!("Dispatch outcome: {:?}", outcome);

            Acknowledgement {
                text: acknowledgement_text(command),
                outcome,
            }
        }
        .instrument(span)
        .await
    }

    async fn run_rule(&self, rule: &ActionRule, normalized: &str) -> DispatchOutcome {
        debug!("Command matched rule '{}'", rule.kind);

        let result = AssertUnwindSafe(self.execute(rule))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(ActionError::Panicked(panic_message(panic))));

        match result {
            Ok(confirmation) => {
                if let Some(text) = confirmation {
                    self.speak(text).await;
                }
                self.events.log(format!("Command processed: {normalized}"));
                DispatchOutcome::Matched(rule.kind)
            }
            Err(e) => {
                warn!("Action '{}' failed: {}", rule.kind, e);
                self.stats.increment_failed_actions();
                self.events.log(format!("Command processing error: {e}"));
                self.speak(ERROR_SPEECH).await;
                DispatchOutcome::Failed(rule.kind)
            }
        }
    }

    /// Performs the action for a rule. Returns the confirmation still to be
    /// spoken, if any.
    async fn execute(&self, rule: &ActionRule) -> Result<Option<&'static str>, ActionError> {
        let apps = &self.settings.apps;
        match rule.kind {
            ActionKind::OpenNotepad => self.launch(&apps.notepad).await?,
            ActionKind::OpenCalculator => self.launch(&apps.calculator).await?,
            ActionKind::OpenBrowser => self.launch(&apps.browser).await?,
            ActionKind::OpenMusicPlayer => {
                if let Err(e) = self.launch(&apps.music).await {
                    self.events
                        .log(format!("Primary music player unavailable: {e}"));
                    self.launch(&apps.music_fallback).await?;
                    return Ok(Some(MUSIC_FALLBACK_CONFIRMATION));
                }
            }
            ActionKind::OpenFileExplorer => self.launch(&apps.file_explorer).await?,
            ActionKind::CloseWindow => self.services.window.close_active_window().await?,
            ActionKind::VolumeUp => self.services.volume.increase().await?,
            ActionKind::VolumeDown => self.services.volume.decrease().await?,
            ActionKind::Screenshot => {
                let path = self.services.screen.capture().await?;
                self.events
                    .log(format!("Screenshot saved: {}", path.display()));
            }
            ActionKind::Shutdown | ActionKind::Restart => {
                let action = if rule.kind == ActionKind::Shutdown {
                    PowerAction::Shutdown
                } else {
                    PowerAction::Restart
                };
                self.speak(rule.confirmation).await;
                self.services.power.execute(action).await?;
            }
        }

        if rule.kind.announces_first() {
            Ok(None)
        } else {
            Ok(Some(rule.confirmation))
        }
    }

    async fn launch(&self, app: &CommandTemplate) -> Result<(), ActionError> {
        self.services.launcher.launch(&app.program, &app.args).await
    }

    /// The path taken when no rule matches: announce, then hand the command to
    /// the shell exactly once.
    async fn run_fallback(&self, command: &str, normalized: &str) -> DispatchOutcome {
        self.stats.increment_unmatched_commands();
        self.events.log(format!("Unknown command: {normalized}"));
        self.speak(&format!("Unknown command: {normalized}")).await;

        let executed = if !self.settings.shell_fallback {
            self.events
                .log(format!("Shell fallback disabled, not executing: {command}"));
            false
        } else {
            let result = AssertUnwindSafe(self.services.shell.execute(command))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(ActionError::Panicked(panic_message(panic))));
            match result {
                Ok(()) => true,
                Err(e) => {
                    self.events.log(format!("Shell execution failed: {e}"));
                    false
                }
            }
        };

        if executed {
            self.speak(EXECUTED_SPEECH).await;
        } else {
            self.speak(NOT_EXECUTED_SPEECH).await;
        }
        self.events.log(format!("Command processed: {normalized}"));
        DispatchOutcome::Fallback { executed }
    }

    /// Speaks text with a bounded wait. Speech problems are only logged.
    async fn speak(&self, text: &str) {
        let timeout = self.settings.speech_timeout;
        match tokio::time::timeout(timeout, self.services.speech.speak(text)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => self.events.log(format!("Speech error: {e}")),
            Err(_) => self.events.log(format!(
                "Speech error: {}",
                ActionError::Timeout(timeout.as_millis() as u64)
            )),
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
