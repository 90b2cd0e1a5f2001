// src/core/services/system.rs

//! Action services backed by host programs, configured through `CommandTemplate`s.

use super::{
    PowerAction, PowerControl, ProcessLauncher, ScreenCapture, ShellExecutor, SpeechSynth,
    VolumeControl, WindowControl,
};
use crate::config::{ActionsConfig, CommandTemplate};
use crate::core::errors::ActionError;
use async_trait::async_trait;
use chrono::Local;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Environment variable carrying the text to speak, for templates that cannot
/// take it as an argument safely.
pub const SPEECH_TEXT_ENV: &str = "NEXRON_SPEECH_TEXT";

/// Builds a detached `Command` for a template with its placeholders filled in.
fn build_command(template: &CommandTemplate, vars: &[(&str, &str)]) -> Command {
    let mut command = Command::new(&template.program);
    command
        .args(template.render(vars))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    command
}

/// Starts a program without waiting for it.
fn spawn_detached(mut command: Command, program: &str) -> Result<(), ActionError> {
    command.spawn().map_err(|source| ActionError::Launch {
        program: program.to_string(),
        source,
    })?;
    Ok(())
}

/// Runs a program to completion and checks its exit status.
async fn run_to_completion(mut command: Command, program: &str) -> Result<(), ActionError> {
    let status = command
        .status()
        .await
        .map_err(|source| ActionError::Launch {
            program: program.to_string(),
            source,
        })?;
    if status.success() {
        Ok(())
    } else {
        Err(ActionError::CommandFailed {
            program: program.to_string(),
            status: status.to_string(),
        })
    }
}

/// Launches applications by program name.
pub struct SystemLauncher;

#[async_trait]
impl ProcessLauncher for SystemLauncher {
    async fn launch(&self, program: &str, args: &[String]) -> Result<(), ActionError> {
        debug!("Launching '{}' with args {:?}", program, args);
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        spawn_detached(command, program)
    }
}

pub struct SystemWindowControl {
    close: Option<CommandTemplate>,
}

impl SystemWindowControl {
    pub fn new(config: &ActionsConfig) -> Self {
        Self {
            close: config.close_window.clone(),
        }
    }
}

#[async_trait]
impl WindowControl for SystemWindowControl {
    async fn close_active_window(&self) -> Result<(), ActionError> {
        let template = self
            .close
            .as_ref()
            .ok_or(ActionError::Unsupported("closing the active window"))?;
        run_to_completion(build_command(template, &[]), &template.program).await
    }
}

pub struct SystemVolumeControl {
    up: Option<CommandTemplate>,
    down: Option<CommandTemplate>,
    steps: u32,
}

impl SystemVolumeControl {
    pub fn new(config: &ActionsConfig) -> Self {
        Self {
            up: config.volume_up.clone(),
            down: config.volume_down.clone(),
            steps: config.volume_steps,
        }
    }

    async fn step(&self, template: Option<&CommandTemplate>) -> Result<(), ActionError> {
        let template = template.ok_or(ActionError::Unsupported("volume control"))?;
        for _ in 0..self.steps {
            run_to_completion(build_command(template, &[]), &template.program).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl VolumeControl for SystemVolumeControl {
    async fn increase(&self) -> Result<(), ActionError> {
        self.step(self.up.as_ref()).await
    }

    async fn decrease(&self) -> Result<(), ActionError> {
        self.step(self.down.as_ref()).await
    }
}

pub struct SystemScreenCapture {
    template: Option<CommandTemplate>,
    directory: PathBuf,
}

impl SystemScreenCapture {
    pub fn new(config: &ActionsConfig) -> Self {
        Self {
            template: config.screenshot.clone(),
            directory: config.screenshot_dir(),
        }
    }
}

/// The file name a screenshot taken now is saved under.
pub fn screenshot_file_name() -> String {
    format!("Screenshot_{}.png", Local::now().format("%Y%m%d_%H%M%S"))
}

#[async_trait]
impl ScreenCapture for SystemScreenCapture {
    async fn capture(&self) -> Result<PathBuf, ActionError> {
        let template = self
            .template
            .as_ref()
            .ok_or(ActionError::Unsupported("screenshots"))?;
        tokio::fs::create_dir_all(&self.directory).await?;
        let path = self.directory.join(screenshot_file_name());
        let path_str = path.to_string_lossy().into_owned();
        run_to_completion(
            build_command(template, &[("path", &path_str)]),
            &template.program,
        )
        .await?;
        Ok(path)
    }
}

pub struct SystemSpeech {
    template: Option<CommandTemplate>,
}

impl SystemSpeech {
    pub fn new(config: &ActionsConfig) -> Self {
        Self {
            template: config.speech.clone(),
        }
    }
}

#[async_trait]
impl SpeechSynth for SystemSpeech {
    async fn speak(&self, text: &str) -> Result<(), ActionError> {
        let Some(template) = self.template.as_ref() else {
            debug!("No speech command configured; not speaking '{}'", text);
            return Ok(());
        };
        let mut command = build_command(template, &[("text", text)]);
        command.env(SPEECH_TEXT_ENV, text).kill_on_drop(true);
        run_to_completion(command, &template.program).await
    }
}

pub struct SystemPowerControl {
    shutdown: CommandTemplate,
    restart: CommandTemplate,
    grace: Duration,
}

impl SystemPowerControl {
    pub fn new(config: &ActionsConfig) -> Self {
        Self {
            shutdown: config.shutdown.clone(),
            restart: config.restart.clone(),
            grace: Duration::from_millis(config.power_grace_ms),
        }
    }
}

#[async_trait]
impl PowerControl for SystemPowerControl {
    async fn execute(&self, action: PowerAction) -> Result<(), ActionError> {
        tokio::time::sleep(self.grace).await;
        let template = match action {
            PowerAction::Shutdown => &self.shutdown,
            PowerAction::Restart => &self.restart,
        };
        debug!("Executing power action '{}'", action);
        spawn_detached(build_command(template, &[]), &template.program)
    }
}

pub struct SystemShell {
    template: CommandTemplate,
}

impl SystemShell {
    pub fn new(config: &ActionsConfig) -> Self {
        Self {
            template: config.shell.clone(),
        }
    }
}

#[async_trait]
impl ShellExecutor for SystemShell {
    async fn execute(&self, command: &str) -> Result<(), ActionError> {
        spawn_detached(
            build_command(&self.template, &[("command", command)]),
            &self.template.program,
        )
    }
}
