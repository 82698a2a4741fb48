//! Turning an `(app, action)` pair into the exact invocation to run.
//!
//! The argv built here is both executed and displayed, so what the user sees in
//! the start line is what actually runs.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::{Application, Configuration};
use crate::paths::RunContext;

/// Shell used on the host and inside containers.
pub const SHELL: &str = "bash";

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("no command configured for '{action}' in {app}")]
    UnknownAction { app: String, action: String },
    #[error("working directory '{}' does not exist for {app}", path.display())]
    WorkingDirNotFound { app: String, path: PathBuf },
    #[error("invalid container command '{container}': {reason}")]
    InvalidContainer { container: String, reason: String },
}

/// Everything needed to launch one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub app: String,
    pub action: String,
    /// Program followed by its arguments.
    pub argv: Vec<String>,
    /// Directory for the subprocess; `None` keeps the current one.
    pub cwd: Option<PathBuf>,
    /// Log file destination, when output is captured.
    pub log_path: Option<PathBuf>,
}

impl ExecutionPlan {
    /// Shell-quoted rendering of `argv`, suitable for display and copy-paste.
    pub fn rendered(&self) -> String {
        shell_words::join(&self.argv)
    }

    pub fn with_log_path(mut self, path: PathBuf) -> Self {
        self.log_path = Some(path);
        self
    }
}

/// Builds the plan for `(app, action)` without touching any subprocess.
pub fn build_plan(
    app: &str,
    action: &str,
    config: &Configuration,
    ctx: &RunContext,
) -> Result<ExecutionPlan, CommandError> {
    let command = config
        .command(app, action)
        .ok_or_else(|| CommandError::UnknownAction {
            app: app.to_string(),
            action: action.to_string(),
        })?;
    let working_dir = config.app(app).and_then(Application::working_dir);

    let (argv, cwd) = if config.is_containerized() {
        // The directory lives inside the container; pass it through untouched.
        let argv = compose_argv(command, Some(&config.container), working_dir)?;
        (argv, None)
    } else {
        let dir = match working_dir {
            Some(raw) => ctx.expand_path(raw),
            None => ctx.install_dir.clone(),
        };
        if !dir.is_dir() {
            return Err(CommandError::WorkingDirNotFound {
                app: app.to_string(),
                path: dir,
            });
        }
        (compose_argv(command, None, None)?, Some(dir))
    };

    Ok(ExecutionPlan {
        app: app.to_string(),
        action: action.to_string(),
        argv,
        cwd,
        log_path: None,
    })
}

/// Composes the argv for `command`.
///
/// With a container, the result is `<container...> bash -lc "[cd <dir> && ]<command>"`;
/// on the host it is `bash -c <command>`. `container_dir` is only consulted
/// for containers.
pub fn compose_argv(
    command: &str,
    container: Option<&str>,
    container_dir: Option<&str>,
) -> Result<Vec<String>, CommandError> {
    let Some(container) = container.filter(|c| !c.trim().is_empty()) else {
        return Ok(vec![SHELL.to_string(), "-c".to_string(), command.to_string()]);
    };

    let mut argv = shell_words::split(container).map_err(|err| CommandError::InvalidContainer {
        container: container.to_string(),
        reason: err.to_string(),
    })?;
    let inner = match container_dir {
        Some(dir) => format!("cd {} && {}", shell_words::quote(dir), command),
        None => command.to_string(),
    };
    argv.extend([SHELL.to_string(), "-lc".to_string(), inner]);
    Ok(argv)
}
