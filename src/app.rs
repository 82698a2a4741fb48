//! Interactive menu and log viewer state.
//!
//! This module holds the state behind the full-screen menu and translates key
//! presses into state changes. The outcome of a menu session is a tagged
//! [`MenuChoice`]; nothing downstream parses display labels.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::config::Configuration;
use crate::process::ExecutionResult;
use crate::runner::WorkItem;

const PAGE: usize = 10;

/// One line of the menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEntry {
    Action { app: String, action: String },
    Details { app: String },
}

impl MenuEntry {
    pub fn label(&self) -> String {
        match self {
            MenuEntry::Action { app, action } => format!("{} - {}", app, action),
            MenuEntry::Details { app } => format!("{} - Show Details", app),
        }
    }
}

/// What the user asked for when leaving the menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuChoice {
    ShowDetails(String),
    RunSelection(Vec<WorkItem>),
    Quit,
}

#[derive(Debug)]
pub struct Menu {
    entries: Vec<MenuEntry>,
    /// Current filter text.
    pub filter: String,
    /// Indices into `entries` that pass the filter.
    visible: Vec<usize>,
    /// Position within `visible`.
    pub cursor: usize,
    /// Selected indices into `entries`.
    selected: BTreeSet<usize>,
}

impl Menu {
    /// One entry per action, followed by a details entry, for every app.
    pub fn from_config(config: &Configuration) -> Self {
        let mut entries = Vec::new();
        for app in &config.applications {
            for action in &app.actions {
                entries.push(MenuEntry::Action {
                    app: app.name.clone(),
                    action: action.name.clone(),
                });
            }
            entries.push(MenuEntry::Details {
                app: app.name.clone(),
            });
        }
        let mut menu = Self {
            entries,
            filter: String::new(),
            visible: Vec::new(),
            cursor: 0,
            selected: BTreeSet::new(),
        };
        menu.refilter();
        menu
    }

    /// Visible entries with their entry index.
    pub fn visible(&self) -> impl Iterator<Item = (usize, &MenuEntry)> {
        self.visible.iter().map(|&idx| (idx, &self.entries[idx]))
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    pub fn is_selected(&self, entry: usize) -> bool {
        self.selected.contains(&entry)
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    fn current(&self) -> Option<(usize, &MenuEntry)> {
        let idx = *self.visible.get(self.cursor)?;
        Some((idx, &self.entries[idx]))
    }

    fn refilter(&mut self) {
        let needle = self.filter.to_lowercase();
        self.visible = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                needle.is_empty() || entry.label().to_lowercase().contains(&needle)
            })
            .map(|(idx, _)| idx)
            .collect();
        self.cursor = self.cursor.min(self.visible.len().saturating_sub(1));
    }

    fn move_cursor(&mut self, delta: isize) {
        if self.visible.is_empty() {
            return;
        }
        let last = self.visible.len() - 1;
        self.cursor = self.cursor.saturating_add_signed(delta).min(last);
    }

    fn toggle_current(&mut self) {
        let target = match self.current() {
            Some((idx, MenuEntry::Action { .. })) => Some(idx),
            _ => None,
        };
        if let Some(idx) = target {
            if !self.selected.remove(&idx) {
                self.selected.insert(idx);
            }
        }
    }

    fn select_all_visible(&mut self) {
        for &idx in &self.visible {
            if matches!(self.entries[idx], MenuEntry::Action { .. }) {
                self.selected.insert(idx);
            }
        }
    }

    fn confirm(&self) -> Option<MenuChoice> {
        if !self.selected.is_empty() {
            let items = self
                .selected
                .iter()
                .filter_map(|&idx| match &self.entries[idx] {
                    MenuEntry::Action { app, action } => {
                        Some(WorkItem::new(app.as_str(), action.as_str()))
                    }
                    MenuEntry::Details { .. } => None,
                })
                .collect();
            return Some(MenuChoice::RunSelection(items));
        }
        match self.current()?.1 {
            MenuEntry::Action { app, action } => Some(MenuChoice::RunSelection(vec![WorkItem::new(
                app.as_str(),
                action.as_str(),
            )])),
            MenuEntry::Details { app } => Some(MenuChoice::ShowDetails(app.clone())),
        }
    }

    /// Applies a key press; returns a choice when the menu should close.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<MenuChoice> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c') => Some(MenuChoice::Quit),
                _ => None,
            };
        }
        match key.code {
            KeyCode::Esc => {
                if self.filter.is_empty() {
                    return Some(MenuChoice::Quit);
                }
                self.filter.clear();
                self.refilter();
            }
            KeyCode::Enter => return self.confirm(),
            KeyCode::Up => self.move_cursor(-1),
            KeyCode::Down => self.move_cursor(1),
            KeyCode::PageUp => self.move_cursor(-(PAGE as isize)),
            KeyCode::PageDown => self.move_cursor(PAGE as isize),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.move_cursor(isize::MAX),
            KeyCode::Char(' ') => self.toggle_current(),
            KeyCode::Char('+') => self.select_all_visible(),
            KeyCode::Char('-') => self.selected.clear(),
            KeyCode::Char('q') if self.filter.is_empty() => return Some(MenuChoice::Quit),
            KeyCode::Backspace => {
                self.filter.pop();
                self.refilter();
            }
            KeyCode::Delete => {
                self.filter.clear();
                self.refilter();
            }
            KeyCode::Char(c) => {
                self.filter.push(c);
                self.cursor = 0;
                self.refilter();
            }
            _ => {}
        }
        None
    }
}

/// Browses the logs of a finished parallel run.
#[derive(Debug)]
pub struct LogViewer {
    pub results: Vec<ExecutionResult>,
    /// Position in `results`.
    pub cursor: usize,
    /// The log currently open, if any.
    pub open: Option<OpenLog>,
}

#[derive(Debug)]
pub struct OpenLog {
    pub title: String,
    pub path: PathBuf,
    pub lines: Vec<String>,
    pub scroll: usize,
}

/// Result of a key press in the log viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerAction {
    None,
    /// Load the log at this index into the pane.
    Open(usize),
    Close,
}

impl LogViewer {
    /// Only results that produced a log file are listed.
    pub fn new(results: Vec<ExecutionResult>) -> Self {
        Self {
            results: results.into_iter().filter(|r| r.log_path.is_some()).collect(),
            cursor: 0,
            open: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn show(&mut self, index: usize, lines: Vec<String>) {
        let Some(result) = self.results.get(index) else {
            return;
        };
        let Some(path) = result.log_path.clone() else {
            return;
        };
        self.open = Some(OpenLog {
            title: result.label(),
            path,
            lines,
            scroll: 0,
        });
    }

    pub fn handle_key(&mut self, key: KeyEvent, page: usize) -> ViewerAction {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return ViewerAction::Close;
        }
        if let Some(log) = self.open.as_mut() {
            let max_scroll = log.lines.len().saturating_sub(page.max(1));
            match key.code {
                KeyCode::Esc | KeyCode::Char('q') => self.open = None,
                KeyCode::Up => log.scroll = log.scroll.saturating_sub(1),
                KeyCode::Down => log.scroll = (log.scroll + 1).min(max_scroll),
                KeyCode::PageUp => log.scroll = log.scroll.saturating_sub(page),
                KeyCode::PageDown => log.scroll = (log.scroll + page).min(max_scroll),
                KeyCode::Home => log.scroll = 0,
                KeyCode::End => log.scroll = max_scroll,
                _ => {}
            }
            return ViewerAction::None;
        }
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => ViewerAction::Close,
            KeyCode::Up => {
                self.cursor = self.cursor.saturating_sub(1);
                ViewerAction::None
            }
            KeyCode::Down => {
                self.cursor = (self.cursor + 1).min(self.results.len().saturating_sub(1));
                ViewerAction::None
            }
            KeyCode::Enter if !self.results.is_empty() => ViewerAction::Open(self.cursor),
            _ => ViewerAction::None,
        }
    }
}
