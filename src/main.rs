//! Shell-Bun: a configuration-driven command runner.
//!
//! This is the entry point of the application. It parses command-line arguments,
//! loads the configuration, resolves the container wrapper and then either runs
//! a non-interactive batch (`--ci`) or the interactive menu loop.

mod app;
mod command;
mod config;
mod details;
mod events;
mod logfile;
mod matcher;
mod output;
mod paths;
mod process;
mod runner;
mod tui;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::builder::styling::{AnsiColor, Effects, Style};
use clap::builder::Styles;
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::app::{LogViewer, Menu, MenuChoice};
use crate::config::{Configuration, ContainerSource};
use crate::output::{color_enabled, print_line, Tone};
use crate::paths::RunContext;

const DEFAULT_CONFIG: &str = "shell-bun.cfg";
const LOG_ENV: &str = "SHELL_BUN_LOG";
const LOG_PROMPT: &str = "Press Enter to continue, or type 'l' and Enter to browse logs...";

/// Command-line interface definition.
#[derive(Debug, Parser)]
#[command(
    name = "shell-bun",
    version,
    about = "Run configured build and test actions interactively or in parallel batches",
    styles = help_styles(),
    disable_version_flag = true,
    after_help = "Patterns are comma separated. Each term matches exactly, as a '*' glob, \
                  or as a case-insensitive substring. The action pattern 'all' selects \
                  every action."
)]
struct Cli {
    /// Configuration file.
    #[arg(value_name = "CONFIG_FILE", default_value = DEFAULT_CONFIG)]
    config_file: PathBuf,
    /// Run matching actions non-interactively and exit with the batch status.
    #[arg(long, num_args = 2, value_names = ["APP_PATTERN", "ACTION_PATTERN"])]
    ci: Option<Vec<String>>,
    /// Container command wrapping every action. An empty value forces host execution.
    #[arg(long, value_name = "CMD", allow_hyphen_values = true)]
    container: Option<String>,
    /// Enable debug diagnostics on stderr.
    #[arg(long)]
    debug: bool,
    /// Print version.
    #[arg(short = 'v', long, action = clap::ArgAction::Version)]
    #[allow(dead_code)]
    version: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let ctx = RunContext::from_env();
    tracing::debug!(
        install_dir = %ctx.install_dir.display(),
        marker = %ctx.marker_file.display(),
        "context"
    );

    let mut config = config::load_config(&cli.config_file)
        .with_context(|| format!("failed to load config from {}", cli.config_file.display()))?;
    tracing::debug!(
        apps = config.applications.len(),
        actions = config.action_count(),
        "configuration loaded"
    );

    let resolution = config::resolve_container(
        config.configured_container.as_deref(),
        cli.container.as_deref(),
        &ctx.marker_file,
    );
    if resolution.source == ContainerSource::MarkerSuppressed {
        print_line(
            &format!(
                "Detected {} - ignoring configured container command: {}",
                ctx.marker_file.display(),
                config.configured_container.as_deref().unwrap_or_default()
            ),
            Tone::Yellow,
        );
    }
    tracing::debug!(
        container = %resolution.command,
        source = ?resolution.source,
        "container resolved"
    );
    config.apply_container(&resolution);

    let config = Arc::new(config);
    let ctx = Arc::new(ctx);

    if let Some(patterns) = cli.ci {
        let (app_pattern, action_pattern) = match patterns.as_slice() {
            [app, action] => (app.as_str(), action.as_str()),
            _ => anyhow::bail!("--ci expects APP_PATTERN and ACTION_PATTERN"),
        };
        let code = runner::run_batch(config, ctx, app_pattern, action_pattern).await;
        std::io::stdout().flush().ok();
        std::process::exit(code);
    }

    run_interactive(config, ctx).await
}

/// Menu loop: pick, run, show results, repeat until the user quits.
async fn run_interactive(config: Arc<Configuration>, ctx: Arc<RunContext>) -> Result<()> {
    let mut menu = Menu::from_config(&config);
    loop {
        match tui::run_menu(&mut menu)? {
            MenuChoice::Quit => return Ok(()),
            MenuChoice::ShowDetails(app) => {
                for line in details::render_details(&app, &config, &ctx, color_enabled()) {
                    println!("{}", line);
                }
                wait_for_enter()?;
            }
            MenuChoice::RunSelection(mut items) if items.len() == 1 => {
                let Some(item) = items.pop() else { continue };
                let result = runner::run_one(config.clone(), ctx.clone(), item).await;
                println!();
                if let Some(path) = &result.log_path {
                    print_line(&format!("📝 Log: {}", path.display()), Tone::Dim);
                }
                wait_for_enter()?;
            }
            MenuChoice::RunSelection(items) => {
                if items.is_empty() {
                    continue;
                }
                let report = runner::run_selection(config.clone(), ctx.clone(), items).await;
                for line in report.selection_lines(color_enabled()) {
                    println!("{}", line);
                }
                let results = report.results_in_order().into_iter().cloned().collect();
                let mut viewer = LogViewer::new(results);
                if viewer.is_empty() {
                    wait_for_enter()?;
                    continue;
                }
                let answer = prompt(LOG_PROMPT)?;
                if answer.eq_ignore_ascii_case("l") {
                    tui::run_log_viewer(&mut viewer)?;
                }
            }
        }
    }
}

fn wait_for_enter() -> Result<()> {
    prompt("Press Enter to continue...").map(|_| ())
}

fn prompt(message: &str) -> Result<String> {
    print_line(message, Tone::Dim);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read from stdin")?;
    Ok(answer.trim().to_string())
}

fn init_tracing(debug: bool) {
    let fallback = if debug { "warn,shell_bun=debug" } else { "warn" };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time(),
        )
        .init();
}

fn help_styles() -> Styles {
    Styles::styled()
        .header(
            Style::new()
                .fg_color(Some(AnsiColor::Cyan.into()))
                .effects(Effects::BOLD),
        )
        .usage(
            Style::new()
                .fg_color(Some(AnsiColor::Green.into()))
                .effects(Effects::BOLD),
        )
        .literal(Style::new().fg_color(Some(AnsiColor::Yellow.into())))
        .placeholder(Style::new().fg_color(Some(AnsiColor::Magenta.into())))
        .valid(Style::new().fg_color(Some(AnsiColor::Green.into())))
        .invalid(
            Style::new()
                .fg_color(Some(AnsiColor::Red.into()))
                .effects(Effects::BOLD),
        )
}
