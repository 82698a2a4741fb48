//! The "show details" view for one application.

use crate::command::compose_argv;
use crate::config::Configuration;
use crate::logfile::log_dir_for;
use crate::output::{paint, Tone};
use crate::paths::RunContext;

/// Renders working dir, log dir, container and every action with its full invocation.
pub fn render_details(
    app: &str,
    config: &Configuration,
    ctx: &RunContext,
    color: bool,
) -> Vec<String> {
    let Some(application) = config.app(app) else {
        return vec![paint(&format!("Unknown application: {}", app), Tone::Red, color)];
    };

    let working_dir = match application.working_dir() {
        Some(raw) if config.is_containerized() => format!("{} (inside container)", raw),
        Some(raw) => ctx.expand_path(raw).display().to_string(),
        None if config.is_containerized() => "(container default)".to_string(),
        None => format!("{} (default)", ctx.install_dir.display()),
    };
    let (log_dir, source) = log_dir_for(app, config, ctx);
    let container = if config.is_containerized() {
        config.container.clone()
    } else {
        "(none - runs on host)".to_string()
    };

    let mut lines = vec![
        String::new(),
        paint(&format!("=== {} ===", app), Tone::Cyan, color),
        format!("Working Dir:    {}", working_dir),
        format!("Log Dir:        {} ({})", log_dir.display(), source.label()),
        format!("Container:      {}", container),
        String::new(),
        paint("Available Actions:", Tone::Yellow, color),
    ];
    if application.actions.is_empty() {
        lines.push("  No actions configured".to_string());
    }
    let container = config.is_containerized().then_some(config.container.as_str());
    for action in &application.actions {
        lines.push(String::new());
        lines.push(paint(&format!("  {}:", action.name), Tone::Cyan, color));
        lines.push(format!("    Command:  {}", action.command));
        let full = compose_argv(&action.command, container, application.working_dir())
            .map(shell_words::join)
            .unwrap_or_else(|err| err.to_string());
        lines.push(format!("    Full cmd: {}", full));
    }
    lines.push(String::new());
    lines
}
