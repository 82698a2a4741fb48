//! Log file placement.

use std::path::PathBuf;

use chrono::{DateTime, Local};

use crate::config::Configuration;
use crate::paths::RunContext;

/// Which setting decided an app's log directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDirSource {
    App,
    Global,
    Default,
}

impl LogDirSource {
    pub fn label(self) -> &'static str {
        match self {
            LogDirSource::App => "app-specific",
            LogDirSource::Global => "global",
            LogDirSource::Default => "default",
        }
    }
}

/// Resolves the log directory for `app`: app setting, then global, then `<install>/logs`.
pub fn log_dir_for(app: &str, config: &Configuration, ctx: &RunContext) -> (PathBuf, LogDirSource) {
    if let Some(raw) = config.app(app).and_then(|a| a.log_dir()) {
        return (ctx.expand_path(raw), LogDirSource::App);
    }
    if let Some(raw) = config.global_log_dir() {
        return (ctx.expand_path(raw), LogDirSource::Global);
    }
    (ctx.default_log_dir(), LogDirSource::Default)
}

/// `<YYYYMMDD_HHMMSS>_<app>_<action>.log`
pub fn log_file_name(app: &str, action: &str, at: DateTime<Local>) -> String {
    format!("{}_{}_{}.log", at.format("%Y%m%d_%H%M%S"), app, action)
}

/// Picks the log file for one run and makes sure its directory exists.
///
/// Never fails: if the directory cannot be created the file goes into the
/// install directory instead. Two allocations for the same pair within one
/// second return the same path.
pub fn allocate(app: &str, action: &str, config: &Configuration, ctx: &RunContext) -> PathBuf {
    let (dir, _) = log_dir_for(app, config, ctx);
    let name = log_file_name(app, action, Local::now());
    match std::fs::create_dir_all(&dir) {
        Ok(()) => dir.join(name),
        Err(err) => {
            tracing::warn!(
                dir = %dir.display(),
                error = %err,
                "cannot create log directory, falling back to install directory"
            );
            ctx.install_dir.join(name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::test_context;
    use chrono::TimeZone;

    fn config(text: &str) -> Configuration {
        Configuration::parse(text).unwrap()
    }

    #[test]
    fn file_name_uses_second_precision_timestamp() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 2).unwrap();
        assert_eq!(log_file_name("Web", "build", at), "20240309_070502_Web_build.log");
    }

    #[test]
    fn app_dir_beats_global_beats_default() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());

        let cfg = config("log_dir=/var/global\n[A]\nlog_dir=app-logs\nb=c\n[B]\nb=c\n");
        assert_eq!(
            log_dir_for("A", &cfg, &ctx),
            (dir.path().join("app-logs"), LogDirSource::App)
        );
        assert_eq!(
            log_dir_for("B", &cfg, &ctx),
            (PathBuf::from("/var/global"), LogDirSource::Global)
        );

        let cfg = config("[A]\nb=c\n");
        assert_eq!(
            log_dir_for("A", &cfg, &ctx),
            (dir.path().join("logs"), LogDirSource::Default)
        );
    }

    #[test]
    fn allocate_creates_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        let cfg = config("[A]\nlog_dir=deep/nested/logs\nbuild=make\n");
        let path = allocate("A", "build", &cfg, &ctx);
        let parent = dir.path().join("deep/nested/logs");
        assert!(parent.is_dir());
        assert_eq!(path.parent(), Some(parent.as_path()));
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("_A_build.log"), "{name}");
        // Repeat allocation tolerates the existing directory.
        let again = allocate("A", "build", &cfg, &ctx);
        assert_eq!(again.parent(), Some(parent.as_path()));
    }

    #[test]
    fn allocate_falls_back_to_install_dir() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_context(dir.path());
        // A regular file where the directory should go.
        std::fs::write(dir.path().join("blocked"), "").unwrap();
        let cfg = config("[A]\nlog_dir=blocked/logs\nbuild=make\n");
        let path = allocate("A", "build", &cfg, &ctx);
        assert_eq!(path.parent(), Some(dir.path()));
    }
}
