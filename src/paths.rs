//! Process-wide run context and path expansion.
//!
//! The install directory, the user's home directory and the container marker
//! file are read from the environment once in `main` and passed down as a
//! `RunContext`, so the rest of the program never consults ambient state.

use std::path::{Path, PathBuf};

/// Marker file whose presence means we are already inside a container.
pub const DEFAULT_MARKER_FILE: &str = "/run/.containerenv";
/// Environment variable overriding [`DEFAULT_MARKER_FILE`].
pub const MARKER_FILE_ENV: &str = "SHELL_BUN_CONTAINER_MARKER_FILE";

/// Facts about the running process that path resolution depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Directory holding the running executable. Relative paths resolve here.
    pub install_dir: PathBuf,
    /// Home directory used for `~` expansion.
    pub home_dir: Option<PathBuf>,
    /// Path probed for container auto-detection.
    pub marker_file: PathBuf,
}

impl RunContext {
    /// Builds the context from the current executable and environment.
    pub fn from_env() -> Self {
        let install_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        let marker_file = std::env::var_os(MARKER_FILE_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MARKER_FILE));
        Self {
            install_dir,
            home_dir: dirs::home_dir(),
            marker_file,
        }
    }

    /// Expands a leading `~` and anchors relative paths at the install directory.
    pub fn expand_path(&self, raw: &str) -> PathBuf {
        let expanded = self.expand_tilde(raw);
        if expanded.is_absolute() {
            expanded
        } else {
            self.install_dir.join(expanded)
        }
    }

    fn expand_tilde(&self, raw: &str) -> PathBuf {
        let Some(home) = &self.home_dir else {
            return PathBuf::from(raw);
        };
        if raw == "~" {
            return home.clone();
        }
        match raw.strip_prefix("~/") {
            Some(rest) => home.join(rest),
            None => PathBuf::from(raw),
        }
    }

    /// Default log directory when neither the app nor the file configures one.
    pub fn default_log_dir(&self) -> PathBuf {
        self.install_dir.join("logs")
    }
}

#[cfg(test)]
pub(crate) fn test_context(install_dir: &Path) -> RunContext {
    RunContext {
        install_dir: install_dir.to_path_buf(),
        home_dir: Some(PathBuf::from("/home/tester")),
        marker_file: install_dir.join("no-such-marker"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_home_prefix() {
        let ctx = test_context(Path::new("/opt/app"));
        assert_eq!(ctx.expand_path("~"), PathBuf::from("/home/tester"));
        assert_eq!(
            ctx.expand_path("~/builds/logs"),
            PathBuf::from("/home/tester/builds/logs")
        );
    }

    #[test]
    fn relative_paths_anchor_at_install_dir() {
        let ctx = test_context(Path::new("/opt/app"));
        assert_eq!(
            ctx.expand_path("relative/path"),
            PathBuf::from("/opt/app/relative/path")
        );
        assert_eq!(ctx.expand_path("/srv/data"), PathBuf::from("/srv/data"));
    }

    #[test]
    fn tilde_user_form_is_left_relative() {
        let ctx = test_context(Path::new("/opt/app"));
        assert_eq!(ctx.expand_path("~other/x"), PathBuf::from("/opt/app/~other/x"));
    }

    #[test]
    fn missing_home_keeps_tilde_literal() {
        let mut ctx = test_context(Path::new("/opt/app"));
        ctx.home_dir = None;
        assert_eq!(ctx.expand_path("~/x"), PathBuf::from("/opt/app/~/x"));
    }
}
