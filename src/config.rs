//! Configuration loading for Shell-Bun.
//!
//! The configuration file is a line-oriented, INI-like format:
//!
//! ```text
//! # global settings
//! log_dir=~/logs
//! container=podman exec dev
//!
//! [MyApp]
//! working_dir=src/my-app
//! log_dir=logs/my-app
//! build=make all
//! ```
//!
//! Keys before the first `[section]` are global settings; every other key in a
//! section is an action whose value is passed verbatim to a shell.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    #[error("failed to read configuration file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no applications found in configuration file")]
    NoApplications,
}

/// A named shell command under an application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub name: String,
    pub command: String,
}

/// One `[section]` of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    pub name: String,
    /// Raw `working_dir` value; may contain `~` or be relative.
    pub working_dir: Option<String>,
    /// Raw `log_dir` value; may contain `~` or be relative.
    pub log_dir: Option<String>,
    /// Actions in declaration order, unique by name.
    pub actions: Vec<Action>,
}

impl Application {
    fn new(name: String) -> Self {
        Self {
            name,
            working_dir: None,
            log_dir: None,
            actions: Vec::new(),
        }
    }

    /// Looks up the command configured for `action`.
    pub fn command(&self, action: &str) -> Option<&str> {
        self.actions
            .iter()
            .find(|a| a.name == action)
            .map(|a| a.command.as_str())
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.name.as_str()).collect()
    }

    /// The configured working directory, treating an empty value as unset.
    pub fn working_dir(&self) -> Option<&str> {
        non_empty(self.working_dir.as_deref())
    }

    /// The configured log directory, treating an empty value as unset.
    pub fn log_dir(&self) -> Option<&str> {
        non_empty(self.log_dir.as_deref())
    }

    // Re-declaring an action replaces its command but keeps its position.
    fn upsert_action(&mut self, name: &str, command: &str) {
        match self.actions.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.command = command.to_string(),
            None => self.actions.push(Action {
                name: name.to_string(),
                command: command.to_string(),
            }),
        }
    }
}

/// Parsed configuration. Read-only once loaded and the container resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
    /// Applications in first-declaration order.
    pub applications: Vec<Application>,
    /// Global `log_dir`, used when an app has none.
    pub global_log_dir: Option<String>,
    /// `container` value as written in the file.
    pub configured_container: Option<String>,
    /// Effective container wrapper; empty means host execution.
    pub container: String,
}

impl Configuration {
    /// Parses configuration text in a single line-oriented pass.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut applications: Vec<Application> = Vec::new();
        let mut global_log_dir = None;
        let mut configured_container: Option<String> = None;
        let mut current: Option<usize> = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let idx = match applications.iter().position(|a| a.name == name) {
                    Some(idx) => idx,
                    None => {
                        applications.push(Application::new(name.to_string()));
                        applications.len() - 1
                    }
                };
                current = Some(idx);
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            if key.is_empty() {
                continue;
            }

            match current {
                None => match key {
                    "log_dir" => global_log_dir = Some(value.to_string()),
                    "container" => configured_container = Some(value.to_string()),
                    _ => {}
                },
                Some(idx) => {
                    let app = &mut applications[idx];
                    match key {
                        "working_dir" => app.working_dir = Some(value.to_string()),
                        "log_dir" => app.log_dir = Some(value.to_string()),
                        _ => app.upsert_action(key, value),
                    }
                }
            }
        }

        if applications.is_empty() {
            return Err(ConfigError::NoApplications);
        }

        let container = configured_container.clone().unwrap_or_default();
        Ok(Self {
            applications,
            global_log_dir,
            configured_container,
            container,
        })
    }

    pub fn app(&self, name: &str) -> Option<&Application> {
        self.applications.iter().find(|a| a.name == name)
    }

    pub fn app_names(&self) -> Vec<&str> {
        self.applications.iter().map(|a| a.name.as_str()).collect()
    }

    /// Looks up the command for `(app, action)`.
    pub fn command(&self, app: &str, action: &str) -> Option<&str> {
        self.app(app).and_then(|a| a.command(action))
    }

    pub fn global_log_dir(&self) -> Option<&str> {
        non_empty(self.global_log_dir.as_deref())
    }

    /// Whether commands are wrapped in a container invocation.
    pub fn is_containerized(&self) -> bool {
        !self.container.trim().is_empty()
    }

    /// Applies a container resolution produced by [`resolve_container`].
    pub fn apply_container(&mut self, resolution: &ContainerResolution) {
        self.container = resolution.command.clone();
    }

    /// Total number of actions across all applications.
    pub fn action_count(&self) -> usize {
        self.applications.iter().map(|a| a.actions.len()).sum()
    }
}

/// Reads and parses the configuration file at `path`.
pub fn load_config(path: &Path) -> Result<Configuration, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Configuration::parse(&raw)
}

/// Where the effective container command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerSource {
    /// `--container` on the command line, empty string included.
    CliOverride,
    /// The marker file exists, so the configured container was dropped.
    MarkerSuppressed,
    /// The file's `container` setting (possibly empty).
    Config,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerResolution {
    pub command: String,
    pub source: ContainerSource,
}

/// Picks the effective container wrapper.
///
/// A CLI override always wins. Otherwise a configured container is dropped
/// when the marker file exists, since we are already inside a container.
pub fn resolve_container(
    configured: Option<&str>,
    cli_override: Option<&str>,
    marker_file: &Path,
) -> ContainerResolution {
    if let Some(cmd) = cli_override {
        return ContainerResolution {
            command: cmd.to_string(),
            source: ContainerSource::CliOverride,
        };
    }
    let configured = configured.unwrap_or_default();
    if !configured.is_empty() && marker_file.exists() {
        return ContainerResolution {
            command: String::new(),
            source: ContainerSource::MarkerSuppressed,
        };
    }
    ContainerResolution {
        command: configured.to_string(),
        source: ContainerSource::Config,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
