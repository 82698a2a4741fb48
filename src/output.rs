//! Console colouring and log file presentation.

use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use strip_ansi_escapes::strip;

/// Colours used for console status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Red,
    Green,
    Yellow,
    Blue,
    Cyan,
    Dim,
}

impl Tone {
    fn code(self) -> &'static str {
        match self {
            Tone::Red => "31",
            Tone::Green => "32",
            Tone::Yellow => "33",
            Tone::Blue => "34",
            Tone::Cyan => "36",
            Tone::Dim => "2",
        }
    }
}

/// Whether stdout is a terminal; decided once per process.
pub fn color_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::io::stdout().is_terminal())
}

/// Wraps `text` in the ANSI colour for `tone` when `enabled`.
pub fn paint(text: &str, tone: Tone, enabled: bool) -> String {
    if enabled {
        format!("\u{1b}[{}m{}\u{1b}[0m", tone.code(), text)
    } else {
        text.to_string()
    }
}

/// Prints one coloured line to stdout.
pub fn print_line(text: &str, tone: Tone) {
    println!("{}", paint(text, tone, color_enabled()));
}

/// Removes ANSI escape codes and replaces invalid UTF-8.
pub fn sanitize_text(bytes: &[u8]) -> String {
    let stripped = strip(bytes);
    String::from_utf8_lossy(&stripped).to_string()
}

/// Reads a log file as display lines with escape codes removed.
pub fn read_log(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read(path)
        .with_context(|| format!("failed to read log file {}", path.display()))?;
    let text = String::from_utf8_lossy(&raw);
    // Keep only what a terminal would show after carriage-return redraws.
    Ok(text
        .lines()
        .map(|line| sanitize_text(line.rsplit('\r').next().unwrap_or(line).as_bytes()))
        .collect())
}
