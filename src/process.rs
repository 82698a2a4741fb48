//! Running one execution plan as a subprocess.
//!
//! Output handling depends on the caller: batch runs share the terminal with
//! the child, single interactive runs echo and log, and parallel interactive
//! runs only log so the console stays readable.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};

use crate::command::ExecutionPlan;
use crate::events::StatusEvent;
use crate::output::{print_line, Tone};

/// Exit code reported for runs abandoned on user interrupt.
pub const INTERRUPTED_EXIT: i32 = 130;

/// How a subprocess's output is routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Inherit stdout/stderr; no log file.
    Batch,
    /// Capture output, write it to the log file and echo it to the console.
    Echo,
    /// Redirect output to the log file only.
    LogOnly,
}

/// Outcome of one run. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub app: String,
    pub action: String,
    pub exit_code: i32,
    pub log_path: Option<PathBuf>,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// `app - action`
    pub fn label(&self) -> String {
        format!("{} - {}", self.app, self.action)
    }
}

/// Raises the cancellation flag observed by every [`CancelToken`].
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of a [`CancelSource`].
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that is never cancelled.
    #[cfg(test)]
    pub fn never() -> Self {
        CancelSource::new().token()
    }

    /// Resolves once cancellation is requested.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                // Source dropped without cancelling.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Runs `plan`, announcing start and outcome on the console.
///
/// Launch and wait failures never escape: they are reported and mapped to
/// exit code 1.
pub async fn run(plan: &ExecutionPlan, mode: OutputMode, cancel: CancelToken) -> ExecutionResult {
    let rendered = plan.rendered();
    StatusEvent::Start {
        app: &plan.app,
        action: &plan.action,
        command: &rendered,
    }
    .emit();
    tracing::debug!(
        app = %plan.app,
        action = %plan.action,
        argv = ?plan.argv,
        cwd = ?plan.cwd,
        log = ?plan.log_path,
        ?mode,
        "launching"
    );

    let exit_code = match execute(plan, mode, cancel).await {
        Ok(code) => code,
        Err(err) => {
            tracing::debug!(
                app = %plan.app,
                action = %plan.action,
                error = %format!("{err:#}"),
                "execution failed"
            );
            print_line(&format!("Error executing command: {err:#}"), Tone::Red);
            1
        }
    };
    tracing::debug!(app = %plan.app, action = %plan.action, exit_code, "finished");

    if exit_code == 0 {
        StatusEvent::Success {
            app: &plan.app,
            action: &plan.action,
        }
        .emit();
    } else {
        StatusEvent::Error {
            app: &plan.app,
            action: &plan.action,
        }
        .emit();
        if mode == OutputMode::Batch && exit_code != INTERRUPTED_EXIT {
            print_line(&format!("Command failed with exit code {}", exit_code), Tone::Red);
        }
    }

    ExecutionResult {
        app: plan.app.clone(),
        action: plan.action.clone(),
        exit_code,
        log_path: plan.log_path.clone(),
    }
}

async fn execute(plan: &ExecutionPlan, mode: OutputMode, mut cancel: CancelToken) -> Result<i32> {
    let mut command = command_for(plan, mode)?;
    match mode {
        OutputMode::Batch => {
            command.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }
        OutputMode::LogOnly => {
            command.stdin(Stdio::null());
            match &plan.log_path {
                Some(path) => {
                    let file = create_log(path)?;
                    let file2 = file.try_clone()?;
                    command.stdout(Stdio::from(file)).stderr(Stdio::from(file2));
                }
                None => {
                    command.stdout(Stdio::null()).stderr(Stdio::null());
                }
            }
        }
        OutputMode::Echo => {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        }
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("failed to spawn {}", plan.argv[0]))?;

    let finished = tokio::select! {
        status = wait_child(&mut child, mode, plan.log_path.as_deref()) => Some(status),
        _ = cancel.cancelled() => None,
    };
    match finished {
        Some(status) => Ok(exit_code(status?)),
        None => {
            terminate(&mut child, owns_group(mode)).await;
            Ok(INTERRUPTED_EXIT)
        }
    }
}

// Children sharing the terminal's stdin must stay in the foreground process
// group, or reading from the tty stops them with SIGTTIN.
fn owns_group(mode: OutputMode) -> bool {
    mode == OutputMode::LogOnly
}

fn command_for(plan: &ExecutionPlan, mode: OutputMode) -> Result<Command> {
    let (program, args) = plan
        .argv
        .split_first()
        .with_context(|| format!("empty command for {} - {}", plan.app, plan.action))?;
    let mut command = Command::new(program);
    command.args(args);
    if let Some(cwd) = &plan.cwd {
        command.current_dir(cwd);
    }
    command.kill_on_drop(true);

    // Detached runs get their own process group, so an interrupt can take
    // down the whole tree.
    #[cfg(unix)]
    if owns_group(mode) {
        unsafe {
            command.pre_exec(|| {
                let _ = libc::setpgid(0, 0);
                Ok(())
            });
        }
    }
    Ok(command)
}

fn create_log(path: &Path) -> Result<std::fs::File> {
    std::fs::File::create(path)
        .with_context(|| format!("failed to create log file {}", path.display()))
}

async fn wait_child(
    child: &mut Child,
    mode: OutputMode,
    log_path: Option<&Path>,
) -> Result<ExitStatus> {
    if mode == OutputMode::Echo {
        let log = match log_path {
            Some(path) => Some(tokio::fs::File::from_std(create_log(path)?)),
            None => None,
        };
        tee_output(child, &mut std::io::stdout(), &mut std::io::stderr(), log).await;
    }
    Ok(child.wait().await?)
}

#[derive(Debug)]
enum Chunk {
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

// Copies the child's output bytes, unchanged and in arrival order, to the
// console streams and the log. Both pipes are drained to EOF even when a sink
// fails, so the child never sees a closed pipe.
async fn tee_output<O, E>(
    child: &mut Child,
    out: &mut O,
    err: &mut E,
    mut log: Option<tokio::fs::File>,
) where
    O: Write + Send,
    E: Write + Send,
{
    let (tx, mut rx) = mpsc::channel::<Chunk>(256);
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(read_stream(stdout, tx.clone(), Chunk::Stdout));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(read_stream(stderr, tx.clone(), Chunk::Stderr));
    }
    drop(tx);

    while let Some(chunk) = rx.recv().await {
        let bytes = match &chunk {
            Chunk::Stdout(bytes) => {
                let _ = out.write_all(bytes).and_then(|_| out.flush());
                bytes
            }
            Chunk::Stderr(bytes) => {
                let _ = err.write_all(bytes).and_then(|_| err.flush());
                bytes
            }
        };
        if let Some(file) = log.as_mut() {
            if let Err(error) = file.write_all(bytes).await {
                tracing::warn!(%error, "cannot write log file, continuing without it");
                log = None;
            }
        }
    }
    if let Some(file) = log.as_mut() {
        if let Err(error) = file.flush().await {
            tracing::warn!(%error, "cannot flush log file");
        }
    }
}

async fn read_stream<R>(mut reader: R, tx: mpsc::Sender<Chunk>, wrap: fn(Vec<u8>) -> Chunk)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(wrap(buf[..n].to_vec())).await.is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => {
                tracing::debug!(error = %err, "reading child output failed");
                break;
            }
        }
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

// SIGTERM to the child (and its process group when it owns one), then a
// hard kill if it lingers.
async fn terminate(child: &mut Child, group: bool) {
    if let Some(pid) = child.id() {
        send_sigterm(pid, group);
        match tokio::time::timeout(Duration::from_millis(500), child.wait()).await {
            Ok(Ok(_)) => return,
            Ok(Err(err)) => tracing::debug!(pid, error = %err, "wait after SIGTERM failed"),
            Err(_) => tracing::debug!(pid, "child ignored SIGTERM, killing"),
        }
    }
    let _ = child.kill().await;
}

#[cfg(unix)]
fn send_sigterm(pid: u32, group: bool) {
    let pid = pid as i32;
    unsafe {
        if group {
            let _ = libc::kill(-pid, libc::SIGTERM);
        }
        let _ = libc::kill(pid, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32, _group: bool) {}
