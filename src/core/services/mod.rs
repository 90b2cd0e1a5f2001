// src/core/services/mod.rs

//! The side-effecting services the dispatcher calls into.
//!
//! Each concern is a small async trait so the dispatcher can be driven by the
//! host-tool implementations in `system` or by any other backend.

pub mod system;

use crate::config::ActionsConfig;
use crate::core::errors::ActionError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use strum_macros::Display;

/// The two host power operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum PowerAction {
    Shutdown,
    Restart,
}

/// Starts an application without waiting for it to exit.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Fails with `ActionError::Launch` if the program cannot be started.
    async fn launch(&self, program: &str, args: &[String]) -> Result<(), ActionError>;
}

/// Manipulates the focused window.
#[async_trait]
pub trait WindowControl: Send + Sync {
    async fn close_active_window(&self) -> Result<(), ActionError>;
}

/// Adjusts the output volume by a fixed number of discrete steps per call.
#[async_trait]
pub trait VolumeControl: Send + Sync {
    async fn increase(&self) -> Result<(), ActionError>;
    async fn decrease(&self) -> Result<(), ActionError>;
}

/// Captures the primary screen to a file.
#[async_trait]
pub trait ScreenCapture: Send + Sync {
    /// Returns the path of the saved image.
    async fn capture(&self) -> Result<PathBuf, ActionError>;
}

/// Speaks text aloud.
#[async_trait]
pub trait SpeechSynth: Send + Sync {
    async fn speak(&self, text: &str) -> Result<(), ActionError>;
}

/// Shuts down or restarts the host after a grace delay.
#[async_trait]
pub trait PowerControl: Send + Sync {
    async fn execute(&self, action: PowerAction) -> Result<(), ActionError>;
}

/// Runs free-form text through the host shell.
#[async_trait]
pub trait ShellExecutor: Send + Sync {
    async fn execute(&self, command: &str) -> Result<(), ActionError>;
}

/// The full set of services available to the dispatcher.
#[derive(Clone)]
pub struct ActionServices {
    pub launcher: Arc<dyn ProcessLauncher>,
    pub window: Arc<dyn WindowControl>,
    pub volume: Arc<dyn VolumeControl>,
    pub screen: Arc<dyn ScreenCapture>,
    pub speech: Arc<dyn SpeechSynth>,
    pub power: Arc<dyn PowerControl>,
    pub shell: Arc<dyn ShellExecutor>,
}

impl ActionServices {
    /// Builds the services that drive the host's own tools.
    pub fn system(config: &ActionsConfig) -> Self {
        Self {
            launcher: Arc::new(system::SystemLauncher),
            window: Arc::new(system::SystemWindowControl::new(config)),
            volume: Arc::new(system::SystemVolumeControl::new(config)),
            screen: Arc::new(system::SystemScreenCapture::new(config)),
            speech: Arc::new(system::SystemSpeech::new(config)),
            power: Arc::new(system::SystemPowerControl::new(config)),
            shell: Arc::new(system::SystemShell::new(config)),
        }
    }
}
