//! Terminal User Interface (TUI) for the interactive menu and log viewer.
//!
//! This module handles putting the terminal in raw mode, restoring it, and
//! drawing [`Menu`] and [`LogViewer`] state with `ratatui`. Key handling
//! lives in `app`; this module only shuttles events and renders.

use std::io::{self, Stdout};

use anyhow::Result;
use crossterm::event::{self, Event as TermEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen, SetTitle,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Borders, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};

use crate::app::{LogViewer, Menu, MenuChoice, MenuEntry, ViewerAction};
use crate::output::read_log;

/// Type alias for the specific terminal backend used.
pub type TuiTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Enables raw mode, enters the alternate screen, and creates a `ratatui` Terminal.
pub fn init_terminal() -> io::Result<TuiTerminal> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, SetTitle("shell-bun"))?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Disables raw mode, leaves the alternate screen, and shows the cursor.
pub fn restore_terminal(mut terminal: TuiTerminal) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

/// Shows the menu until the user makes a choice.
pub fn run_menu(menu: &mut Menu) -> Result<MenuChoice> {
    let mut terminal = init_terminal()?;
    let outcome = menu_loop(menu, &mut terminal);
    restore_terminal(terminal)?;
    outcome
}

fn menu_loop(menu: &mut Menu, terminal: &mut TuiTerminal) -> Result<MenuChoice> {
    loop {
        terminal.draw(|frame| draw_menu(frame, menu))?;
        if let TermEvent::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            if let Some(choice) = menu.handle_key(key) {
                return Ok(choice);
            }
        }
    }
}

/// Lets the user browse log files of a finished run.
pub fn run_log_viewer(viewer: &mut LogViewer) -> Result<()> {
    let mut terminal = init_terminal()?;
    let outcome = viewer_loop(viewer, &mut terminal);
    restore_terminal(terminal)?;
    outcome
}

fn viewer_loop(viewer: &mut LogViewer, terminal: &mut TuiTerminal) -> Result<()> {
    let mut page = 1;
    loop {
        terminal.draw(|frame| page = draw_viewer(frame, viewer))?;
        let TermEvent::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match viewer.handle_key(key, page) {
            ViewerAction::None => {}
            ViewerAction::Close => return Ok(()),
            ViewerAction::Open(index) => {
                let lines = match viewer.results.get(index).and_then(|r| r.log_path.as_ref()) {
                    Some(path) => read_log(path).unwrap_or_else(|err| vec![format!("{err:#}")]),
                    None => Vec::new(),
                };
                viewer.show(index, lines);
            }
        }
    }
}

fn split_main(area: Rect) -> (Rect, Rect) {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(4)])
        .split(area);
    (vertical[0], vertical[1])
}

fn rounded(title: String) -> Block<'static> {
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::DarkGray))
}

fn draw_menu(frame: &mut Frame, menu: &Menu) {
    let (main, footer) = split_main(frame.size());

    let items: Vec<ListItem> = menu
        .visible()
        .map(|(idx, entry)| {
            let (mark, mark_style) = match entry {
                MenuEntry::Action { .. } if menu.is_selected(idx) => {
                    ("[x] ", Style::default().fg(Color::Green))
                }
                MenuEntry::Action { .. } => ("[ ] ", Style::default().fg(Color::DarkGray)),
                MenuEntry::Details { .. } => ("    ", Style::default()),
            };
            let label_style = match entry {
                MenuEntry::Action { .. } => Style::default(),
                MenuEntry::Details { .. } => Style::default().fg(Color::Cyan),
            };
            ListItem::new(Line::from(vec![
                Span::styled(mark, mark_style),
                Span::styled(entry.label(), label_style),
            ]))
        })
        .collect();

    let title = format!(
        "Shell-Bun · {} shown · {} selected",
        menu.visible_len(),
        menu.selected_count()
    );
    let list = List::new(items)
        .block(rounded(title))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .highlight_symbol("▶ ");
    frame.render_stateful_widget(list, main, &mut list_state(menu.cursor, menu.visible_len()));

    let filter_line = if menu.filter.is_empty() {
        Line::from(Span::styled("Type to filter", Style::default().fg(Color::DarkGray)))
    } else {
        Line::from(vec![
            Span::raw("Filter: "),
            Span::styled(menu.filter.clone(), Style::default().fg(Color::Yellow)),
        ])
    };
    let help = "↑/↓ move | Space select | + all | - none | Enter run | Esc clear/quit | q quit";
    let status = Paragraph::new(Text::from(vec![
        filter_line,
        Line::from(Span::styled(help, Style::default().fg(Color::DarkGray))),
    ]))
    .block(rounded(String::new()));
    frame.render_widget(status, footer);
}

// Returns the height of the log pane, used as the page size for scrolling.
fn draw_viewer(frame: &mut Frame, viewer: &LogViewer) -> usize {
    let (main, footer) = split_main(frame.size());
    let page = main.height.saturating_sub(2) as usize;

    let help = if let Some(log) = &viewer.open {
        let block = rounded(format!("{} · {}", log.title, log.path.display()));
        let end = (log.scroll + page).min(log.lines.len());
        let lines: Vec<Line> = log.lines[log.scroll.min(end)..end]
            .iter()
            .map(|l| Line::from(l.clone()))
            .collect();
        let body = if lines.is_empty() {
            Paragraph::new("(empty log)").style(Style::default().fg(Color::DarkGray))
        } else {
            Paragraph::new(lines)
        };
        frame.render_widget(body.block(block), main);
        "↑/↓ scroll | PgUp/PgDn page | Home/End | Esc back"
    } else {
        let items: Vec<ListItem> = viewer
            .results
            .iter()
            .map(|result| {
                let (mark, color) = if result.success() {
                    ("✅ ", Color::Green)
                } else {
                    ("❌ ", Color::Red)
                };
                ListItem::new(Line::from(vec![
                    Span::styled(mark, Style::default().fg(color)),
                    Span::raw(result.label()),
                    Span::styled(
                        format!("  (exit {})", result.exit_code),
                        Style::default().fg(Color::DarkGray),
                    ),
                ]))
            })
            .collect();
        let list = List::new(items)
            .block(rounded("Logs".to_string()))
            .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
            .highlight_symbol("▶ ");
        let mut state = list_state(viewer.cursor, viewer.results.len());
        frame.render_stateful_widget(list, main, &mut state);
        "↑/↓ move | Enter open log | Esc/q done"
    };

    let hint = Line::from(Span::styled(help, Style::default().fg(Color::DarkGray)));
    let status = Paragraph::new(hint).block(rounded(String::new()));
    frame.render_widget(status, footer);
    page
}

fn list_state(selected: usize, len: usize) -> ListState {
    let mut state = ListState::default();
    if len > 0 {
        state.select(Some(selected.min(len - 1)));
    }
    state
}
