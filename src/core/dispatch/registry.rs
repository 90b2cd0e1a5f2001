// src/core/dispatch/registry.rs

//! The ordered table of recognized commands.
//!
//! Rules are evaluated strictly in declaration order and the first rule whose
//! trigger set intersects the command text wins. Several triggers deliberately
//! overlap (`kapat` closes a window before it could ever reach the shutdown rule),
//! so the order of `default_rules` is part of the command language.

use std::borrow::Cow;
use strum_macros::Display;

/// Every recognized command category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ActionKind {
    OpenNotepad,
    OpenCalculator,
    OpenBrowser,
    OpenMusicPlayer,
    OpenFileExplorer,
    CloseWindow,
    VolumeUp,
    VolumeDown,
    Screenshot,
    Shutdown,
    Restart,
}

impl ActionKind {
    /// Power actions announce themselves before they run, since the host may
    /// not be around to speak afterwards.
    pub fn announces_first(&self) -> bool {
        matches!(self, ActionKind::Shutdown | ActionKind::Restart)
    }
}

/// One immutable entry of the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRule {
    pub kind: ActionKind,
    /// Lowercase substrings; any one of them selects this rule.
    pub triggers: &'static [&'static str],
    /// Spoken after the action succeeds.
    pub confirmation: &'static str,
}

impl ActionRule {
    pub const fn new(
        kind: ActionKind,
        triggers: &'static [&'static str],
        confirmation: &'static str,
    ) -> Self {
        Self {
            kind,
            triggers,
            confirmation,
        }
    }

    /// Substring containment against already-normalized text. Dotless `ı` and
    /// `i` compare equal on both sides.
    pub fn matches(&self, normalized: &str) -> bool {
        let text = fold_dotless_i(normalized);
        self.triggers
            .iter()
            .any(|trigger| text.contains(fold_dotless_i(trigger).as_ref()))
    }
}

/// Trims and lowercases a command. Lowercasing is Unicode-aware but independent
/// of the host locale, except that `İ` becomes a plain `i` rather than `i` plus a
/// combining dot.
pub fn normalize(raw: &str) -> String {
    let mut normalized = String::with_capacity(raw.len());
    for c in raw.trim().chars() {
        match c {
            'İ' => normalized.push('i'),
            _ => normalized.extend(c.to_lowercase()),
        }
    }
    normalized
}

/// Uppercase `I` lowercases to `i` while Turkish triggers spell it `ı`, so the
/// two are treated as one letter when matching.
fn fold_dotless_i(text: &str) -> Cow<'_, str> {
    if text.contains('ı') {
        Cow::Owned(text.replace('ı', "i"))
    } else {
        Cow::Borrowed(text)
    }
}

/// The built-in rule table, in priority order.
pub fn default_rules() -> Vec<ActionRule> {
    vec![
        ActionRule::new(
            ActionKind::OpenNotepad,
            &["not defteri", "notepad"],
            "Opening notepad",
        ),
        ActionRule::new(
            ActionKind::OpenCalculator,
            &["hesap makinesi", "calculator"],
            "Opening calculator",
        ),
        ActionRule::new(
            ActionKind::OpenBrowser,
            &["tarayıcı", "browser", "internet"],
            "Opening browser",
        ),
        ActionRule::new(
            ActionKind::OpenMusicPlayer,
            &["müzik", "music"],
            "Opening music player",
        ),
        ActionRule::new(
            ActionKind::OpenFileExplorer,
            &["dosya", "file", "explorer"],
            "Opening file explorer",
        ),
        ActionRule::new(
            ActionKind::CloseWindow,
            &["kapat", "close"],
            "Closing window",
        ),
        ActionRule::new(
            ActionKind::VolumeUp,
            &["ses aç", "volume up"],
            "Volume increased",
        ),
        ActionRule::new(
            ActionKind::VolumeDown,
            &["ses kıs", "volume down"],
            "Volume decreased",
        ),
        ActionRule::new(
            ActionKind::Screenshot,
            &["ekran", "screenshot"],
            "Screenshot taken",
        ),
        ActionRule::new(
            ActionKind::Shutdown,
            &["shutdown", "kapat"],
            "Shutting down the system",
        ),
        ActionRule::new(
            ActionKind::Restart,
            &["restart", "yeniden"],
            "Restarting the system",
        ),
    ]
}

/// An ordered, immutable list of `ActionRule`s.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    rules: Vec<ActionRule>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl ActionRegistry {
    pub fn new(rules: Vec<ActionRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ActionRule] {
        &self.rules
    }

    /// Returns the first rule matching the normalized command, if any.
    pub fn find(&self, normalized: &str) -> Option<&ActionRule> {
        self.rules.iter().find(|rule| rule.matches(normalized))
    }
}
