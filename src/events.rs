//! Execution status events.
//!
//! Every action announces itself before it runs and reports success or
//! failure afterwards. These lines are part of the program's console output,
//! separate from `tracing` diagnostics.

use crate::output::{color_enabled, paint, Tone};

/// A status change for one `(app, action)` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent<'a> {
    /// The action is about to run `command`.
    Start {
        app: &'a str,
        action: &'a str,
        command: &'a str,
    },
    /// The action exited with code 0.
    Success { app: &'a str, action: &'a str },
    /// The action failed to launch or exited non-zero.
    Error { app: &'a str, action: &'a str },
}

impl StatusEvent<'_> {
    /// Renders the console line for this event.
    pub fn render(&self, color: bool) -> String {
        match self {
            StatusEvent::Start {
                app,
                action,
                command,
            } => format!(
                "{}{}",
                paint(&format!("🚀 Starting: {} - {}: ", app, action), Tone::Cyan, color),
                paint(command, Tone::Dim, color)
            ),
            StatusEvent::Success { app, action } => {
                paint(&format!("✅ Completed: {} - {}", app, action), Tone::Green, color)
            }
            StatusEvent::Error { app, action } => {
                paint(&format!("❌ Failed: {} - {}", app, action), Tone::Red, color)
            }
        }
    }

    /// Prints the event to stdout.
    pub fn emit(&self) {
        println!("{}", self.render(color_enabled()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_plain_lines() {
        let start = StatusEvent::Start {
            app: "A",
            action: "build",
            command: "bash -c 'echo hi'",
        };
        assert_eq!(start.render(false), "🚀 Starting: A - build: bash -c 'echo hi'");
        assert_eq!(
            StatusEvent::Success { app: "A", action: "build" }.render(false),
            "✅ Completed: A - build"
        );
        assert_eq!(
            StatusEvent::Error { app: "A", action: "build" }.render(false),
            "❌ Failed: A - build"
        );
    }

    #[test]
    fn coloured_start_keeps_command_text() {
        let line = StatusEvent::Start {
            app: "A",
            action: "b",
            command: "make",
        }
        .render(true);
        assert!(line.starts_with("\u{1b}[36m"));
        assert!(line.contains("\u{1b}[2mmake\u{1b}[0m"));
    }
}
