//! Application state
//!
//! Thin layer between key presses and the [`SessionController`]; all
//! workflow decisions live in the controller.

use std::path::PathBuf;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};

use crate::input::{Action, KeyPreset};
use crate::notify::{Level, Notifier, ToastQueue};
use crate::theme::ThemeKind;
use crate::upload::scan::scan_path;
use crate::upload::{FileCandidate, SessionController, WorkflowState};

/// Why a row is marked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowNote {
    TooLarge,
    InvalidName,
    Exists,
}

/// One line of the file list as the UI shows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRow {
    pub name: String,
    pub size: u64,
    pub checked: bool,
    pub selectable: bool,
    pub note: Option<RowNote>,
}

pub struct App {
    pub session: SessionController,
    pub toasts: Arc<ToastQueue>,
    pub theme: ThemeKind,
    pub key_preset: KeyPreset,
    pub follow_symlinks: bool,

    pub cursor: usize,
    /// Text typed into the add-path prompt, None while closed
    pub path_input: Option<String>,
    pub show_details: bool,
    pub should_quit: bool,
}

impl App {
    pub fn new(session: SessionController, toasts: Arc<ToastQueue>) -> Self {
        Self {
            session,
            toasts,
            theme: ThemeKind::default(),
            key_preset: KeyPreset::default(),
            follow_symlinks: false,
            cursor: 0,
            path_input: None,
            show_details: false,
            should_quit: false,
        }
    }

    /// Builder method: Set theme by name
    pub fn with_theme_name(mut self, name: &str) -> Self {
        self.theme = ThemeKind::from_name(name);
        tracing::debug!("Theme {}", self.theme.name());
        self
    }

    /// Builder method: Set key preset by name
    pub fn with_key_preset_name(mut self, name: &str) -> Self {
        self.key_preset = KeyPreset::from_name(name);
        tracing::debug!("Key preset {}", self.key_preset.name());
        self
    }

    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }

    /// Rows for the current state: the conflicting subset while resolving
    /// overwrites, every known file otherwise.
    pub fn rows(&self) -> Vec<ListRow> {
        let state = self.session.state();
        if let WorkflowState::Overwrite { .. } = state {
            return self
                .session
                .conflict_entries()
                .into_iter()
                .map(|entry| {
                    let selectable = entry.selectable();
                    ListRow {
                        size: self.session.selection().get(&entry.name).map_or(0, |c| c.size),
                        note: Some(if selectable {
                            RowNote::Exists
                        } else {
                            RowNote::InvalidName
                        }),
                        name: entry.name,
                        checked: entry.checked,
                        selectable,
                    }
                })
                .collect();
        }

        let editable = *state == WorkflowState::Selection;
        self.session
            .entries()
            .into_iter()
            .map(|entry| {
                let note = if entry.invalid {
                    Some(RowNote::InvalidName)
                } else if entry.too_large {
                    Some(RowNote::TooLarge)
                } else {
                    None
                };
                ListRow {
                    name: entry.candidate.name.clone(),
                    size: entry.candidate.size,
                    checked: entry.included,
                    selectable: editable && note.is_none(),
                    note,
                }
            })
            .collect()
    }

    /// Drain finished async work into the controller
    pub fn tick(&mut self) {
        self.session.pump();
        self.clamp_cursor();
        if self.session.is_closed() {
            self.should_quit = true;
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if self.path_input.is_some() {
            self.handle_path_input_key(key);
            return;
        }

        let Some(action) = self.key_preset.action(&key) else {
            return;
        };

        match action {
            Action::Up => self.cursor = self.cursor.saturating_sub(1),
            Action::Down => {
                if self.cursor + 1 < self.rows().len() {
                    self.cursor += 1;
                }
            }
            Action::Toggle => {
                if let Some(row) = self.rows().get(self.cursor) {
                    if row.selectable {
                        self.session.toggle_selection(&row.name, !row.checked);
                    }
                }
            }
            Action::Commit => {
                if self.session.state().is_terminal() {
                    self.session.acknowledge();
                } else if self.session.commit() {
                    self.cursor = 0;
                }
            }
            Action::Cancel => self.session.cancel(),
            Action::AddPath => {
                if self.session.controls().add_files.enabled {
                    self.path_input = Some(String::new());
                }
            }
            Action::Details => {
                if matches!(self.session.state(), WorkflowState::Error { .. }) {
                    self.show_details = !self.show_details;
                }
            }
        }

        self.clamp_cursor();
        if self.session.is_closed() {
            self.should_quit = true;
        }
    }

    fn handle_path_input_key(&mut self, key: KeyEvent) {
        let Some(input) = self.path_input.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc => self.path_input = None,
            KeyCode::Enter => {
                let typed = input.trim().to_string();
                self.path_input = None;
                if !typed.is_empty() {
                    self.add_paths(&[PathBuf::from(typed)]);
                }
            }
            KeyCode::Backspace => {
                input.pop();
            }
            KeyCode::Char(c) => input.push(c),
            _ => {}
        }
    }

    /// Scan paths and hand the found files to the session. Returns how
    /// many files were offered.
    pub fn add_paths(&mut self, paths: &[PathBuf]) -> usize {
        let candidates = collect_candidates(paths, self.follow_symlinks, self.toasts.as_ref());
        let count = candidates.len();
        if count > 0 && !self.session.add_files(candidates) {
            return 0;
        }
        count
    }

    fn clamp_cursor(&mut self) {
        let len = self.rows().len();
        if self.cursor >= len {
            self.cursor = len.saturating_sub(1);
        }
    }
}

/// Scan every path, reporting unreadable or empty ones through `notifier`
pub fn collect_candidates(
    paths: &[PathBuf],
    follow_symlinks: bool,
    notifier: &dyn Notifier,
) -> Vec<FileCandidate> {
    let mut candidates = Vec::new();
    for path in paths {
        match scan_path(path, follow_symlinks) {
            Ok(found) if found.is_empty() => {
                notifier.notify(Level::Warning, &format!("No files in {}", path.display()));
            }
            Ok(found) => candidates.extend(found),
            Err(e) => {
                notifier.notify(Level::Error, &format!("Cannot read {}: {}", path.display(), e));
            }
        }
    }
    candidates
}
