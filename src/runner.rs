//! Batch orchestration.
//!
//! Patterns are resolved into tagged work items, every item runs concurrently
//! on the tokio runtime, and results stream back over a channel in completion
//! order. Each result carries the index of the item that produced it, so no
//! positional bookkeeping is needed when completions arrive out of order.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::command::build_plan;
use crate::config::Configuration;
use crate::events::StatusEvent;
use crate::logfile;
use crate::matcher::{match_actions, match_apps};
use crate::output::{color_enabled, paint, print_line, Tone};
use crate::paths::RunContext;
use crate::process::{
    self, CancelSource, CancelToken, ExecutionResult, OutputMode, INTERRUPTED_EXIT,
};

const RULE: &str = "========================================";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("No applications found matching pattern '{pattern}'")]
    NoMatchingApps {
        pattern: String,
        available: Vec<String>,
    },
    #[error("No actions found matching pattern '{pattern}'")]
    NoMatchingActions { pattern: String },
}

/// One `(app, action)` unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub app: String,
    pub action: String,
}

impl WorkItem {
    pub fn new(app: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            action: action.into(),
        }
    }

    pub fn label(&self) -> String {
        format!("{} - {}", self.app, self.action)
    }
}

/// Work resolved from an app pattern and an action pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSelection {
    /// Apps matched by the app pattern, in configuration order.
    pub apps: Vec<String>,
    /// Matched apps that had no action matching the action pattern.
    pub apps_without_actions: Vec<String>,
    pub items: Vec<WorkItem>,
}

/// Resolves both patterns against the configuration.
pub fn select_work(
    config: &Configuration,
    app_pattern: &str,
    action_pattern: &str,
) -> Result<BatchSelection, PatternError> {
    let known_apps = config.app_names();
    let apps = match_apps(app_pattern, &known_apps);
    if apps.is_empty() {
        return Err(PatternError::NoMatchingApps {
            pattern: app_pattern.to_string(),
            available: known_apps.iter().map(|a| a.to_string()).collect(),
        });
    }

    let mut items = Vec::new();
    let mut apps_without_actions = Vec::new();
    for app in &apps {
        let known_actions = config.app(app).map(|a| a.action_names()).unwrap_or_default();
        let actions = match_actions(action_pattern, &known_actions);
        if actions.is_empty() {
            apps_without_actions.push(app.to_string());
        }
        items.extend(actions.into_iter().map(|action| WorkItem::new(*app, action)));
    }

    if items.is_empty() {
        return Err(PatternError::NoMatchingActions {
            pattern: action_pattern.to_string(),
        });
    }
    Ok(BatchSelection {
        apps: apps.iter().map(|a| a.to_string()).collect(),
        apps_without_actions,
        items,
    })
}

/// Results of running a set of work items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    items: Vec<WorkItem>,
    // (item index, result) in completion order.
    completed: Vec<(usize, ExecutionResult)>,
    interrupted: bool,
}

impl BatchReport {
    fn new(items: Vec<WorkItem>) -> Self {
        Self {
            items,
            completed: Vec::new(),
            interrupted: false,
        }
    }

    fn record(&mut self, index: usize, result: ExecutionResult) {
        self.completed.push((index, result));
    }

    // Items whose task died without reporting count as failures.
    fn fill_missing(&mut self) {
        for (index, item) in self.items.iter().enumerate() {
            if !self.completed.iter().any(|(idx, _)| *idx == index) {
                tracing::error!(app = %item.app, action = %item.action, "no result received");
                self.completed.push((
                    index,
                    ExecutionResult {
                        app: item.app.clone(),
                        action: item.action.clone(),
                        exit_code: 1,
                        log_path: None,
                    },
                ));
            }
        }
    }

    /// Results in completion order.
    pub fn results(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.completed.iter().map(|(_, result)| result)
    }

    /// Results in submission order.
    pub fn results_in_order(&self) -> Vec<&ExecutionResult> {
        let mut ordered: Vec<_> = self.completed.iter().collect();
        ordered.sort_by_key(|(idx, _)| *idx);
        ordered.into_iter().map(|(_, result)| result).collect()
    }

    pub fn succeeded(&self) -> usize {
        self.results().filter(|r| r.success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results().filter(|r| !r.success()).count()
    }

    /// Failed results in submission order.
    pub fn failures(&self) -> Vec<&ExecutionResult> {
        self.results_in_order()
            .into_iter()
            .filter(|r| !r.success())
            .collect()
    }

    /// Process exit code for a batch run.
    ///
    /// A single item passes its own code through; larger batches collapse to
    /// 0 or 1. Interrupted batches exit 130.
    pub fn exit_code(&self) -> i32 {
        if self.interrupted {
            return INTERRUPTED_EXIT;
        }
        if self.items.len() == 1 {
            return self.results().next().map(|r| r.exit_code).unwrap_or(1);
        }
        if self.failed() > 0 {
            1
        } else {
            0
        }
    }

    /// Summary block for batch mode; `None` when only one item ran.
    pub fn summary_lines(&self, color: bool) -> Option<Vec<String>> {
        if self.items.len() <= 1 {
            return None;
        }
        let mut lines = vec![
            String::new(),
            RULE.to_string(),
            "CI Execution Summary (Parallel):".to_string(),
            format!("Commands executed: {}", self.completed.len()),
            paint(
                &format!("✅ Successful operations: {}", self.succeeded()),
                Tone::Green,
                color,
            ),
        ];
        let failures = self.failures();
        if !failures.is_empty() {
            lines.push(paint(
                &format!("❌ Failed operations: {}", failures.len()),
                Tone::Red,
                color,
            ));
            lines.push("Failed commands:".to_string());
            lines.extend(failures.iter().map(|r| format!("  - {}", r.label())));
        } else if !self.interrupted {
            lines.push(paint("🎉 All operations completed successfully", Tone::Green, color));
        }
        if self.interrupted {
            lines.push(paint("⚠️  Interrupted before completion", Tone::Yellow, color));
        }
        Some(lines)
    }

    /// Per-item outcome and log file, for interactive parallel runs.
    pub fn selection_lines(&self, color: bool) -> Vec<String> {
        let mut lines = vec![
            String::new(),
            RULE.to_string(),
            format!(
                "Execution Summary: {} succeeded, {} failed",
                self.succeeded(),
                self.failed()
            ),
            RULE.to_string(),
        ];
        for result in self.results_in_order() {
            let (mark, tone) = if result.success() {
                ("✅", Tone::Green)
            } else {
                ("❌", Tone::Red)
            };
            lines.push(paint(&format!("{} {}", mark, result.label()), tone, color));
            if let Some(path) = &result.log_path {
                lines.push(format!("   Log: {}", path.display()));
            }
        }
        lines
    }
}

/// Batch ("CI") mode: resolve patterns, run everything, print the outcome.
///
/// Returns the process exit code.
pub async fn run_batch(
    config: Arc<Configuration>,
    ctx: Arc<RunContext>,
    app_pattern: &str,
    action_pattern: &str,
) -> i32 {
    let selection = match select_work(&config, app_pattern, action_pattern) {
        Ok(selection) => selection,
        Err(err) => {
            print_line(&format!("Error: {}", err), Tone::Red);
            if let PatternError::NoMatchingApps { available, .. } = &err {
                println!("Available applications: {}", available.join(", "));
            }
            return 1;
        }
    };

    for app in &selection.apps_without_actions {
        tracing::debug!(app = %app, pattern = %action_pattern, "no matching actions");
        let known = config.app(app).map(|a| a.action_names().join(", ")).unwrap_or_default();
        print_line(
            &format!(
                "Warning: No actions found for '{}' matching pattern '{}' (available: {})",
                app, action_pattern, known
            ),
            Tone::Yellow,
        );
    }

    if selection.items.len() > 1 {
        println!("Shell-Bun CI Mode: Fuzzy Pattern Execution (Parallel)");
        println!("App pattern: '{}'", app_pattern);
        println!("Action pattern: '{}'", action_pattern);
        println!("Matched apps: {}", selection.apps.join(", "));
        println!("{}", RULE);
        println!("Running {} actions in parallel...", selection.items.len());
        println!("{}", RULE);
    }

    let report = run_units(config, ctx, selection.items, OutputMode::Batch).await;
    if let Some(lines) = report.summary_lines(color_enabled()) {
        for line in lines {
            println!("{}", line);
        }
    }
    report.exit_code()
}

/// Interactive parallel run of a menu selection; output goes to log files only.
pub async fn run_selection(
    config: Arc<Configuration>,
    ctx: Arc<RunContext>,
    items: Vec<WorkItem>,
) -> BatchReport {
    print_line(
        &format!("📦 Executing {} selected items in parallel...", items.len()),
        Tone::Blue,
    );
    println!();
    run_units(config, ctx, items, OutputMode::LogOnly).await
}

/// Interactive single run: output is echoed and logged.
pub async fn run_one(
    config: Arc<Configuration>,
    ctx: Arc<RunContext>,
    item: WorkItem,
) -> ExecutionResult {
    print_line(&format!("📦 Executing: {}", item.label()), Tone::Blue);
    println!();
    let mut report = run_units(config, ctx, vec![item.clone()], OutputMode::Echo).await;
    match report.completed.pop() {
        Some((_, result)) => result,
        None => ExecutionResult {
            app: item.app,
            action: item.action,
            exit_code: 1,
            log_path: None,
        },
    }
}

/// Runs every item concurrently and waits for all of them.
///
/// Ctrl-C raises the shared cancellation flag; running children are then
/// terminated and the report is marked interrupted.
pub async fn run_units(
    config: Arc<Configuration>,
    ctx: Arc<RunContext>,
    items: Vec<WorkItem>,
    mode: OutputMode,
) -> BatchReport {
    let mut report = BatchReport::new(items.clone());
    let cancel = CancelSource::new();
    let (tx, mut rx) = mpsc::channel(items.len().max(1));

    for (index, item) in items.into_iter().enumerate() {
        let tx = tx.clone();
        let config = Arc::clone(&config);
        let ctx = Arc::clone(&ctx);
        let token = cancel.token();
        tokio::spawn(async move {
            let result = execute_unit(&config, &ctx, &item, mode, token).await;
            let _ = tx.send((index, result)).await;
        });
    }
    drop(tx);

    let mut watch_signal = true;
    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some((index, result)) => report.record(index, result),
                None => break,
            },
            signal = tokio::signal::ctrl_c(), if watch_signal => {
                watch_signal = false;
                match signal {
                    Ok(()) => {
                        print_line("Interrupted - stopping running commands...", Tone::Yellow);
                        tracing::debug!("interrupt received, cancelling running units");
                        report.interrupted = true;
                        cancel.cancel();
                    }
                    Err(err) => tracing::debug!(error = %err, "cannot listen for ctrl-c"),
                }
            }
        }
    }

    report.fill_missing();
    report
}

/// Plans and runs one item. Planning errors fail this item only.
pub async fn execute_unit(
    config: &Configuration,
    ctx: &RunContext,
    item: &WorkItem,
    mode: OutputMode,
    cancel: CancelToken,
) -> ExecutionResult {
    let plan = match build_plan(&item.app, &item.action, config, ctx) {
        Ok(plan) => plan,
        Err(err) => {
            tracing::debug!(
                app = %item.app,
                action = %item.action,
                error = %err,
                "cannot plan action"
            );
            StatusEvent::Error {
                app: &item.app,
                action: &item.action,
            }
            .emit();
            print_line(&format!("Error: {}", err), Tone::Red);
            return ExecutionResult {
                app: item.app.clone(),
                action: item.action.clone(),
                exit_code: 1,
                log_path: None,
            };
        }
    };

    let plan = match mode {
        OutputMode::Batch => plan,
        OutputMode::Echo | OutputMode::LogOnly => {
            let log = logfile::allocate(&item.app, &item.action, config, ctx);
            plan.with_log_path(log)
        }
    };
    process::run(&plan, mode, cancel).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::test_context;

    fn config(text: &str) -> Configuration {
        Configuration::parse(text).unwrap()
    }

    fn result(app: &str, action: &str, exit_code: i32) -> ExecutionResult {
        ExecutionResult {
            app: app.into(),
            action: action.into(),
            exit_code,
            log_path: None,
        }
    }

    #[test]
    fn selects_items_per_app_in_order() {
        let cfg = config("[Web]\nbuild=a\ntest=b\n[Api]\nbuild=c\nlint=d\n[Docs]\nserve=e\n");
        let selection = select_work(&cfg, "Web,Api,Docs", "build").unwrap();
        assert_eq!(selection.apps, vec!["Web", "Api", "Docs"]);
        assert_eq!(selection.apps_without_actions, vec!["Docs"]);
        assert_eq!(
            selection.items,
            vec![WorkItem::new("Web", "build"), WorkItem::new("Api", "build")]
        );

        let selection = select_work(&cfg, "web", "all").unwrap();
        assert_eq!(
            selection.items,
            vec![WorkItem::new("Web", "build"), WorkItem::new("Web", "test")]
        );
    }

    #[test]
    fn pattern_misses_are_errors() {
        let cfg = config("[Web]\nbuild=a\n[Api]\nbuild=c\n");
        assert_eq!(
            select_work(&cfg, "nothing", "build").unwrap_err(),
            PatternError::NoMatchingApps {
                pattern: "nothing".into(),
                available: vec!["Web".into(), "Api".into()],
            }
        );
        let err = select_work(&cfg, "*", "deploy").unwrap_err();
        assert_eq!(err.to_string(), "No actions found matching pattern 'deploy'");
    }

    #[test]
    fn single_item_report_has_no_summary_and_passes_code_through() {
        let mut report = BatchReport::new(vec![WorkItem::new("A", "build")]);
        report.record(0, result("A", "build", 3));
        assert!(report.summary_lines(false).is_none());
        assert_eq!(report.exit_code(), 3);
    }

    #[test]
    fn multi_item_report_summarises_failures() {
        let mut report =
            BatchReport::new(vec![WorkItem::new("A", "build"), WorkItem::new("B", "build")]);
        report.record(1, result("B", "build", 0));
        report.record(0, result("A", "build", 3));
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.exit_code(), 1);

        let lines = report.summary_lines(false).unwrap();
        assert!(lines.contains(&"Commands executed: 2".to_string()));
        assert!(lines.contains(&"❌ Failed operations: 1".to_string()));
        assert!(lines.contains(&"  - A - build".to_string()));
        // Completion order is kept; summaries use submission order.
        let completed: Vec<_> = report.results().map(|r| r.app.as_str()).collect();
        assert_eq!(completed, vec!["B", "A"]);
        let ordered: Vec<_> = report.results_in_order().iter().map(|r| r.app.as_str()).collect();
        assert_eq!(ordered, vec!["A", "B"]);
    }

    #[test]
    fn all_successful_report() {
        let mut report = BatchReport::new(vec![WorkItem::new("A", "x"), WorkItem::new("A", "y")]);
        report.record(0, result("A", "x", 0));
        report.record(1, result("A", "y", 0));
        assert_eq!(report.exit_code(), 0);
        let lines = report.summary_lines(false).unwrap();
        assert!(lines.contains(&"🎉 All operations completed successfully".to_string()));
        assert!(!lines.iter().any(|l| l.contains("Failed")));
    }

    #[test]
    fn missing_results_count_as_failures() {
        let mut report = BatchReport::new(vec![WorkItem::new("A", "x"), WorkItem::new("A", "y")]);
        report.record(1, result("A", "y", 0));
        report.fill_missing();
        assert_eq!(report.failures().len(), 1);
        assert_eq!(report.failures()[0].label(), "A - x");
    }

    #[test]
    fn interrupted_report_exits_130() {
        let mut report = BatchReport::new(vec![WorkItem::new("A", "x")]);
        report.record(0, result("A", "x", INTERRUPTED_EXIT));
        report.interrupted = true;
        assert_eq!(report.exit_code(), INTERRUPTED_EXIT);
    }

    #[tokio::test]
    async fn runs_units_concurrently_and_collects_all() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Arc::new(test_context(dir.path()));
        let cfg = Arc::new(config(
            "[A]\nbuild=sleep 1; exit 3\n[B]\nbuild=sleep 1; echo ok\n[C]\nbuild=sleep 1\n",
        ));
        let items = select_work(&cfg, "A,B,C", "build").unwrap().items;
        let started = std::time::Instant::now();
        let report = run_units(cfg, ctx, items, OutputMode::Batch).await;
        // Three one-second sleeps overlap rather than queue.
        assert!(started.elapsed() < std::time::Duration::from_millis(2500));
        assert_eq!(report.results().count(), 3);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.failures()[0].label(), "A - build");
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn planning_error_fails_only_that_unit() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Arc::new(test_context(dir.path()));
        let cfg = Arc::new(config("[A]\nworking_dir=missing\nbuild=true\n[B]\nbuild=true\n"));
        let items = vec![WorkItem::new("A", "build"), WorkItem::new("B", "build")];
        let report = run_units(cfg, ctx, items, OutputMode::Batch).await;
        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failures()[0].app, "A");
    }

    #[tokio::test]
    async fn selection_runs_write_log_files() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Arc::new(test_context(dir.path()));
        let cfg = Arc::new(config("log_dir=run-logs\n[A]\nbuild=echo built\ntest=echo tested\n"));
        let items = vec![WorkItem::new("A", "build"), WorkItem::new("A", "test")];
        let report = run_selection(cfg, ctx, items).await;
        assert_eq!(report.succeeded(), 2);
        for result in report.results() {
            let path = result.log_path.as_ref().unwrap();
            assert_eq!(path.parent(), Some(dir.path().join("run-logs").as_path()));
            let text = std::fs::read_to_string(path).unwrap();
            let expected = if result.action == "build" { "built" } else { "tested" };
            assert_eq!(text.trim(), expected);
        }
        let lines = report.selection_lines(false);
        assert!(lines.contains(&"✅ A - build".to_string()));
        assert!(lines.iter().any(|l| l.starts_with("   Log: ")));
    }

    #[tokio::test]
    async fn run_one_echoes_and_logs() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Arc::new(test_context(dir.path()));
        let cfg = Arc::new(config("[A]\nbuild=echo hello; exit 2\n"));
        let result = run_one(cfg, ctx, WorkItem::new("A", "build")).await;
        assert_eq!(result.exit_code, 2);
        let log = result.log_path.unwrap();
        assert!(log.starts_with(dir.path().join("logs")));
        assert_eq!(std::fs::read_to_string(log).unwrap(), "hello\n");
    }

    #[tokio::test]
    async fn batch_entry_point_returns_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Arc::new(test_context(dir.path()));
        let cfg = Arc::new(config("[A]\nbuild=exit 3\n[B]\nbuild=echo ok\n"));
        assert_eq!(run_batch(cfg.clone(), ctx.clone(), "A,B", "build").await, 1);
        assert_eq!(run_batch(cfg.clone(), ctx.clone(), "A", "build").await, 3);
        assert_eq!(run_batch(cfg.clone(), ctx.clone(), "B", "build").await, 0);
        assert_eq!(run_batch(cfg.clone(), ctx.clone(), "Z", "build").await, 1);
        assert_eq!(run_batch(cfg, ctx, "A", "deploy").await, 1);
    }
}
