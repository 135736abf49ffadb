//! Input handling
//!
//! Keybinding presets and the mapping from key presses to dialog actions.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde::{Deserialize, Serialize};

/// What a key press asks the dialog to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Up,
    Down,
    /// Flip inclusion of the highlighted file
    Toggle,
    /// OK / upload / overwrite
    Commit,
    /// Cancel, or close a finished dialog
    Cancel,
    /// Open the path prompt
    AddPath,
    /// Show or hide the stack trace in the error dialog
    Details,
}

/// Keybinding preset styles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeyPreset {
    /// Vim-style (j/k) + arrow keys (default)
    #[default]
    Vim,
    /// Arrow keys only
    Arrows,
    /// Emacs-style (Ctrl+n/p) + arrow keys
    Emacs,
}

impl KeyPreset {
    #[cfg(test)]
    pub const ALL: [KeyPreset; 3] = [KeyPreset::Vim, KeyPreset::Arrows, KeyPreset::Emacs];

    pub fn name(&self) -> &'static str {
        match self {
            KeyPreset::Vim => "Vim (jk)",
            KeyPreset::Arrows => "Arrows",
            KeyPreset::Emacs => "Emacs (C-np)",
        }
    }

    /// Parse key preset from name string (case-insensitive)
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "vim" | "vi" => KeyPreset::Vim,
            "arrows" | "arrow" => KeyPreset::Arrows,
            "emacs" | "emac" => KeyPreset::Emacs,
            _ => KeyPreset::default(),
        }
    }

    fn ctrl(key: &KeyEvent) -> bool {
        key.modifiers.contains(KeyModifiers::CONTROL)
    }

    pub fn is_up(&self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Up => true,
            KeyCode::Char('k') if *self == KeyPreset::Vim => true,
            KeyCode::Char('p') if *self == KeyPreset::Emacs && Self::ctrl(key) => true,
            _ => false,
        }
    }

    pub fn is_down(&self, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Down => true,
            KeyCode::Char('j') if *self == KeyPreset::Vim => true,
            KeyCode::Char('n') if *self == KeyPreset::Emacs && Self::ctrl(key) => true,
            _ => false,
        }
    }

    /// Ctrl+C always cancels, whatever the preset
    pub fn action(&self, key: &KeyEvent) -> Option<Action> {
        if self.is_up(key) {
            return Some(Action::Up);
        }
        if self.is_down(key) {
            return Some(Action::Down);
        }

        match key.code {
            KeyCode::Char('c') if Self::ctrl(key) => Some(Action::Cancel),
            KeyCode::Char('g') if *self == KeyPreset::Emacs && Self::ctrl(key) => {
                Some(Action::Cancel)
            }
            KeyCode::Char('o') if *self == KeyPreset::Emacs && Self::ctrl(key) => {
                Some(Action::AddPath)
            }
            _ if Self::ctrl(key) => None,
            KeyCode::Char(' ') => Some(Action::Toggle),
            KeyCode::Enter => Some(Action::Commit),
            KeyCode::Esc | KeyCode::Char('q') => Some(Action::Cancel),
            KeyCode::Char('a') => Some(Action::AddPath),
            KeyCode::Char('d') => Some(Action::Details),
            _ => None,
        }
    }
}
