// src/config.rs

//! Manages server configuration: loading, per-platform defaults, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// The size of the per-connection read buffer. One read of at most this many bytes
/// is treated as one command under chunk framing.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

pub const SHELL_FALLBACK_WARNING: &str =
    "Shell fallback is enabled: unrecognized commands from any client are executed by the host shell.";
pub const NO_IDLE_TIMEOUT_WARNING: &str =
    "No idle timeout is configured. Silent clients can hold connections open indefinitely.";

/// How a connection's byte stream is split into commands.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    /// Every read from the socket is one command, whatever it contains.
    #[default]
    Chunk,
    /// Commands are terminated by `\n`; replies are newline-terminated too.
    Line,
}

/// A program invocation with `{placeholder}` arguments that are filled in at call time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl CommandTemplate {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Substitutes each `{name}` in the arguments with its value.
    pub fn render(&self, vars: &[(&str, &str)]) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                vars.iter().fold(arg.clone(), |acc, (name, value)| {
                    acc.replace(&format!("{{{name}}}"), value)
                })
            })
            .collect()
    }
}

/// Settings for accepted client connections.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConnectionConfig {
    #[serde(default)]
    pub framing: Framing,
    /// Maximum size of one command in bytes.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Closes connections that stay silent for this long. `0` disables the timeout.
    #[serde(default)]
    pub idle_timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            framing: Framing::default(),
            buffer_size: default_buffer_size(),
            idle_timeout_secs: 0,
        }
    }
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

/// Settings for the command dispatcher.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DispatchConfig {
    /// If true, unrecognized commands are handed to the host shell.
    #[serde(default = "default_true")]
    pub shell_fallback: bool,
    /// Upper bound on how long a spoken confirmation may hold up a dispatch.
    #[serde(default = "default_speech_timeout_ms")]
    pub speech_timeout_ms: u64,
    /// Speak an announcement when the server starts and stops.
    #[serde(default = "default_true")]
    pub announce_lifecycle: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            shell_fallback: true,
            speech_timeout_ms: default_speech_timeout_ms(),
            announce_lifecycle: true,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_speech_timeout_ms() -> u64 {
    10_000
}

/// Applications opened by the launch rules.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AppsConfig {
    #[serde(default = "default_notepad")]
    pub notepad: CommandTemplate,
    #[serde(default = "default_calculator")]
    pub calculator: CommandTemplate,
    #[serde(default = "default_browser")]
    pub browser: CommandTemplate,
    #[serde(default = "default_music")]
    pub music: CommandTemplate,
    /// Launched when the primary music player cannot be started.
    #[serde(default = "default_music_fallback")]
    pub music_fallback: CommandTemplate,
    #[serde(default = "default_file_explorer")]
    pub file_explorer: CommandTemplate,
}

impl Default for AppsConfig {
    fn default() -> Self {
        Self {
            notepad: default_notepad(),
            calculator: default_calculator(),
            browser: default_browser(),
            music: default_music(),
            music_fallback: default_music_fallback(),
            file_explorer: default_file_explorer(),
        }
    }
}

fn default_notepad() -> CommandTemplate {
    if cfg!(target_os = "windows") {
        CommandTemplate::new("notepad.exe", &[])
    } else if cfg!(target_os = "macos") {
        CommandTemplate::new("open", &["-a", "TextEdit"])
    } else {
        CommandTemplate::new("gedit", &[])
    }
}
fn default_calculator() -> CommandTemplate {
    if cfg!(target_os = "windows") {
        CommandTemplate::new("calc.exe", &[])
    } else if cfg!(target_os = "macos") {
        CommandTemplate::new("open", &["-a", "Calculator"])
    } else {
        CommandTemplate::new("gnome-calculator", &[])
    }
}
fn default_browser() -> CommandTemplate {
    if cfg!(target_os = "windows") {
        CommandTemplate::new("chrome.exe", &[])
    } else if cfg!(target_os = "macos") {
        CommandTemplate::new("open", &["-a", "Safari"])
    } else {
        CommandTemplate::new("firefox", &[])
    }
}
fn default_music() -> CommandTemplate {
    if cfg!(target_os = "windows") {
        CommandTemplate::new("spotify.exe", &[])
    } else if cfg!(target_os = "macos") {
        CommandTemplate::new("open", &["-a", "Spotify"])
    } else {
        CommandTemplate::new("spotify", &[])
    }
}
fn default_music_fallback() -> CommandTemplate {
    if cfg!(target_os = "windows") {
        CommandTemplate::new("wmplayer.exe", &[])
    } else if cfg!(target_os = "macos") {
        CommandTemplate::new("open", &["-a", "Music"])
    } else {
        CommandTemplate::new("rhythmbox", &[])
    }
}
fn default_file_explorer() -> CommandTemplate {
    if cfg!(target_os = "windows") {
        CommandTemplate::new("explorer.exe", &[])
    } else if cfg!(target_os = "macos") {
        CommandTemplate::new("open", &["-a", "Finder"])
    } else {
        CommandTemplate::new("nautilus", &[])
    }
}

const WINDOWS_SEND_KEYS: &str = "(New-Object -ComObject WScript.Shell).SendKeys";

fn powershell(script: &str) -> CommandTemplate {
    CommandTemplate::new("powershell", &["-NoProfile", "-NonInteractive", "-Command", script])
}

fn osascript(script: &str) -> CommandTemplate {
    CommandTemplate::new("osascript", &["-e", script])
}

/// Host tools used by the built-in action services.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ActionsConfig {
    #[serde(default)]
    pub apps: AppsConfig,
    /// Number of discrete steps performed by one volume up/down command.
    #[serde(default = "default_volume_steps")]
    pub volume_steps: u32,
    /// Delay between announcing a shutdown/restart and performing it.
    #[serde(default = "default_power_grace_ms")]
    pub power_grace_ms: u64,
    /// Where screenshots are written. Defaults to the desktop directory.
    #[serde(default)]
    pub screenshot_dir: Option<String>,
    #[serde(default = "default_close_window")]
    pub close_window: Option<CommandTemplate>,
    /// Runs once per volume step.
    #[serde(default = "default_volume_up")]
    pub volume_up: Option<CommandTemplate>,
    #[serde(default = "default_volume_down")]
    pub volume_down: Option<CommandTemplate>,
    /// Receives the target file as `{path}`.
    #[serde(default = "default_screenshot")]
    pub screenshot: Option<CommandTemplate>,
    /// Receives the text as `{text}` and in the `NEXRON_SPEECH_TEXT` environment variable.
    #[serde(default = "default_speech")]
    pub speech: Option<CommandTemplate>,
    #[serde(default = "default_shutdown")]
    pub shutdown: CommandTemplate,
    #[serde(default = "default_restart")]
    pub restart: CommandTemplate,
    /// Receives the unrecognized command as `{command}`.
    #[serde(default = "default_shell")]
    pub shell: CommandTemplate,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            apps: AppsConfig::default(),
            volume_steps: default_volume_steps(),
            power_grace_ms: default_power_grace_ms(),
            screenshot_dir: None,
            close_window: default_close_window(),
            volume_up: default_volume_up(),
            volume_down: default_volume_down(),
            screenshot: default_screenshot(),
            speech: default_speech(),
            shutdown: default_shutdown(),
            restart: default_restart(),
            shell: default_shell(),
        }
    }
}

impl ActionsConfig {
    /// Resolves the screenshot directory, falling back to the desktop and then
    /// the working directory.
    pub fn screenshot_dir(&self) -> PathBuf {
        self.screenshot_dir
            .as_ref()
            .map(PathBuf::from)
            .or_else(dirs::desktop_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

fn default_volume_steps() -> u32 {
    5
}
fn default_power_grace_ms() -> u64 {
    2000
}
fn default_close_window() -> Option<CommandTemplate> {
    Some(if cfg!(target_os = "windows") {
        powershell(&format!("{WINDOWS_SEND_KEYS}('%{{F4}}')"))
    } else if cfg!(target_os = "macos") {
        osascript("tell application \"System Events\" to keystroke \"w\" using command down")
    } else {
        CommandTemplate::new("xdotool", &["key", "alt+F4"])
    })
}
fn default_volume_up() -> Option<CommandTemplate> {
    Some(if cfg!(target_os = "windows") {
        powershell(&format!("{WINDOWS_SEND_KEYS}([char]175)"))
    } else if cfg!(target_os = "macos") {
        osascript("set volume output volume ((output volume of (get volume settings)) + 2)")
    } else {
        CommandTemplate::new("pactl", &["set-sink-volume", "@DEFAULT_SINK@", "+2%"])
    })
}
fn default_volume_down() -> Option<CommandTemplate> {
    Some(if cfg!(target_os = "windows") {
        powershell(&format!("{WINDOWS_SEND_KEYS}([char]174)"))
    } else if cfg!(target_os = "macos") {
        osascript("set volume output volume ((output volume of (get volume settings)) - 2)")
    } else {
        CommandTemplate::new("pactl", &["set-sink-volume", "@DEFAULT_SINK@", "-2%"])
    })
}
fn default_screenshot() -> Option<CommandTemplate> {
    Some(if cfg!(target_os = "windows") {
        powershell(concat!(
            "Add-Type -AssemblyName System.Windows.Forms,System.Drawing; ",
            "$b = [System.Windows.Forms.Screen]::PrimaryScreen.Bounds; ",
            "$bmp = New-Object System.Drawing.Bitmap $b.Width, $b.Height; ",
            "$g = [System.Drawing.Graphics]::FromImage($bmp); ",
            "$g.CopyFromScreen($b.X, $b.Y, 0, 0, $b.Size); ",
            "$bmp.Save('{path}', [System.Drawing.Imaging.ImageFormat]::Png)"
        ))
    } else if cfg!(target_os = "macos") {
        CommandTemplate::new("screencapture", &["-x", "{path}"])
    } else {
        CommandTemplate::new("gnome-screenshot", &["-f", "{path}"])
    })
}
fn default_speech() -> Option<CommandTemplate> {
    Some(if cfg!(target_os = "windows") {
        powershell(concat!(
            "Add-Type -AssemblyName System.Speech; ",
            "(New-Object System.Speech.Synthesis.SpeechSynthesizer).Speak($env:NEXRON_SPEECH_TEXT)"
        ))
    } else if cfg!(target_os = "macos") {
        CommandTemplate::new("say", &["{text}"])
    } else {
        CommandTemplate::new("espeak", &["{text}"])
    })
}
fn default_shutdown() -> CommandTemplate {
    if cfg!(target_os = "windows") {
        CommandTemplate::new("shutdown", &["/s", "/t", "0"])
    } else if cfg!(target_os = "macos") {
        osascript("tell application \"System Events\" to shut down")
    } else {
        CommandTemplate::new("systemctl", &["poweroff"])
    }
}
fn default_restart() -> CommandTemplate {
    if cfg!(target_os = "windows") {
        CommandTemplate::new("shutdown", &["/r", "/t", "0"])
    } else if cfg!(target_os = "macos") {
        osascript("tell application \"System Events\" to restart")
    } else {
        CommandTemplate::new("systemctl", &["reboot"])
    }
}
fn default_shell() -> CommandTemplate {
    if cfg!(target_os = "windows") {
        CommandTemplate::new("cmd.exe", &["/c", "{command}"])
    } else {
        CommandTemplate::new("sh", &["-c", "{command}"])
    }
}

/// A raw representation of the config file before validation.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_log_file")]
    log_file: Option<String>,
    #[serde(default)]
    connection: ConnectionConfig,
    #[serde(default)]
    dispatch: DispatchConfig,
    #[serde(default)]
    actions: ActionsConfig,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_file() -> Option<String> {
    Some("command_log.txt".to_string())
}

/// Represents the final, validated server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    /// Append-only event log. `None` disables the file sink.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_file: default_log_file(),
            connection: ConnectionConfig::default(),
            dispatch: DispatchConfig::default(),
            actions: ActionsConfig::default(),
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("Invalid configuration in '{path}'"))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let raw_config: RawConfig =
            toml::from_str(contents).context("Failed to parse TOML configuration")?;

        let config = Config {
            host: raw_config.host,
            port: raw_config.port,
            log_level: raw_config.log_level,
            log_file: raw_config.log_file.filter(|path| !path.trim().is_empty()),
            connection: raw_config.connection,
            dispatch: raw_config.dispatch,
            actions: raw_config.actions,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration to ensure logical consistency.
    fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.connection.buffer_size == 0 {
            return Err(anyhow!("connection.buffer_size cannot be 0"));
        }
        if self.actions.volume_steps == 0 {
            return Err(anyhow!("actions.volume_steps cannot be 0"));
        }

        let templates = [
            ("actions.apps.notepad", &self.actions.apps.notepad),
            ("actions.apps.calculator", &self.actions.apps.calculator),
            ("actions.apps.browser", &self.actions.apps.browser),
            ("actions.apps.music", &self.actions.apps.music),
            ("actions.apps.music_fallback", &self.actions.apps.music_fallback),
            ("actions.apps.file_explorer", &self.actions.apps.file_explorer),
            ("actions.shutdown", &self.actions.shutdown),
            ("actions.restart", &self.actions.restart),
            ("actions.shell", &self.actions.shell),
        ];
        for (name, template) in templates {
            if template.program.trim().is_empty() {
                return Err(anyhow!("{name}.program cannot be empty"));
            }
        }
        Ok(())
    }

    /// Valid but risky settings, reported each time the server starts.
    pub fn startup_warnings(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();
        if self.dispatch.shell_fallback {
            warnings.push(SHELL_FALLBACK_WARNING);
        }
        if self.connection.idle_timeout_secs == 0 {
            warnings.push(NO_IDLE_TIMEOUT_WARNING);
        }
        warnings
    }
}
