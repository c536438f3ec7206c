//! Transfer tool executor.
//!
//! # Design
//! - The child runs in its own process group so helpers it forks die with it.
//! - stdout and stderr are merged into one stream, split on `\r` and `\n`, and fed
//!   to an [`OutputRecognizer`]. Reported progress never decreases.
//! - Cancellation sends `SIGKILL` to the whole group and returns [`FsOpsError::Canceled`].
//! - Reading stops when the output closes, or a short grace period after the
//!   primary exits or the completion summary arrives. Helpers that keep the pipe
//!   open (e.g. an ssh control master) cannot hold the transfer hostage.
//! - A reaper polls the group with `WNOHANG` while the child runs; after exit a
//!   blocking reap drains whatever is left. Losing the primary's status to the
//!   reaper (`ECHILD` from the direct wait) is not an error.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::error::{FsOpsError, FsOpsResult};
use crate::progress::{OutputRecognizer, ProgressSignal};

const READ_CHUNK: usize = 8 * 1024;
const OUTPUT_CHANNEL_CAPACITY: usize = 64;
const FAILURE_TAIL_LINES: usize = 8;
const DEFAULT_REAP_INTERVAL: Duration = Duration::from_millis(250);
const DEFAULT_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Program and arguments for one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to run.
    pub program: PathBuf,
    /// Arguments, excluding the program name.
    pub args: Vec<OsString>,
    /// Working directory for the child.
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    /// Build a spec without a working-directory override.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
            current_dir: None,
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionSummary {
    /// Final byte count reported alongside 100%.
    pub total_bytes: u64,
    /// Exit code the tool returned.
    pub exit_code: i32,
}

/// Runs transfer tools with progress streaming and group-wide cancellation.
#[derive(Debug, Clone)]
pub struct TransferExecutor {
    reap_interval: Duration,
    drain_grace: Duration,
}

impl Default for TransferExecutor {
    fn default() -> Self {
        Self {
            reap_interval: DEFAULT_REAP_INTERVAL,
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }
}

impl TransferExecutor {
    /// Override how often the background reaper polls the process group.
    #[must_use]
    pub const fn with_reap_interval(mut self, interval: Duration) -> Self {
        self.reap_interval = interval;
        self
    }

    /// Override how long output is still read once the tool exited or reported completion.
    #[must_use]
    pub const fn with_drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }

    /// Run `spec` to completion, reporting `(percent, bytes)` through `on_progress`.
    ///
    /// A successful run always ends with a `(100, total)` report.
    ///
    /// # Errors
    ///
    /// Returns [`FsOpsError::Canceled`] when `cancel` fires, [`FsOpsError::TransferFailed`]
    /// for unsuccessful exits and [`FsOpsError::Spawn`] when the tool cannot be started.
    pub async fn execute<R, F>(
        &self,
        cancel: &CancellationToken,
        spec: &CommandSpec,
        mut recognizer: R,
        mut on_progress: F,
    ) -> FsOpsResult<ExecutionSummary>
    where
        R: OutputRecognizer,
        F: FnMut(u8, u64) + Send,
    {
        if cancel.is_cancelled() {
            return Err(FsOpsError::Canceled);
        }

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }
        let mut child = command.spawn().map_err(|source| FsOpsError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
        let raw_pid = child.id().ok_or_else(|| FsOpsError::InvalidInput {
            field: "pid",
            reason: "child_already_reaped",
            value: None,
        })?;
        let pgid = Pid::from_raw(i32::try_from(raw_pid).map_err(|_| FsOpsError::InvalidInput {
            field: "pid",
            reason: "out_of_range",
            value: Some(raw_pid.to_string()),
        })?);
        debug!(program = %spec.program.display(), pid = raw_pid, "transfer tool started");

        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(OUTPUT_CHANNEL_CAPACITY);
        let mut pumps = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            pumps.push(tokio::spawn(pump(stdout, tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(tokio::spawn(pump(stderr, tx.clone())));
        }
        drop(tx);

        let reaper = GroupReaper::spawn(pgid, self.reap_interval);
        let mut output = OutputState::default();
        let mut splitter = LineSplitter::default();
        let mut wait_result = None;
        let mut drain_until: Option<Instant> = None;

        let mut canceled = loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break true,
                chunk = rx.recv() => match chunk {
                    Some(bytes) => {
                        for line in splitter.push(&bytes) {
                            output.handle_line(&line, &mut recognizer, &mut on_progress);
                        }
                        if output.completed {
                            drain_until.get_or_insert_with(|| Instant::now() + self.drain_grace);
                        }
                    }
                    None => break false,
                },
                status = child.wait(), if wait_result.is_none() => {
                    wait_result = Some(status);
                    drain_until.get_or_insert_with(|| Instant::now() + self.drain_grace);
                }
                () = sleep_until(drain_until.unwrap_or_else(Instant::now)), if drain_until.is_some() => {
                    debug!(pid = raw_pid, "tool output still open; detaching from it");
                    break false;
                }
            }
        };
        drop(rx);
        for pump in &pumps {
            pump.abort();
        }
        if let Some(line) = splitter.finish() {
            output.handle_line(&line, &mut recognizer, &mut on_progress);
        }

        if !canceled && wait_result.is_none() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => canceled = true,
                status = child.wait() => wait_result = Some(status),
            }
        }

        if canceled {
            kill_group(pgid);
            if let Err(err) = child.wait().await {
                trace!(error = %err, "primary wait after kill");
            }
            reaper.finish().await;
            final_reap(pgid).await;
            debug!(program = %spec.program.display(), pid = raw_pid, "transfer tool killed");
            return Err(FsOpsError::Canceled);
        }

        let reaped_primary = reaper.finish().await;
        final_reap(pgid).await;

        let exit = match wait_result {
            Some(Ok(status)) => ExitKind::from_status(status),
            Some(Err(err)) if err.raw_os_error() == Some(Errno::ECHILD as i32) => {
                trace!(pid = raw_pid, "primary reaped by group reaper");
                reaped_primary.map_or(ExitKind::Code(0), ExitKind::from_wait)
            }
            Some(Err(source)) => {
                return Err(FsOpsError::io("executor.wait", spec.program.clone(), source));
            }
            None => ExitKind::Code(0),
        };

        match exit {
            ExitKind::Code(code) if code == 0 || recognizer.is_benign_exit(code) => {
                if code != 0 {
                    debug!(code, "tolerated transfer tool exit code");
                }
                let total_bytes = output.finish(&mut on_progress);
                Ok(ExecutionSummary {
                    total_bytes,
                    exit_code: code,
                })
            }
            ExitKind::Code(code) => Err(FsOpsError::TransferFailed {
                program: spec.program.clone(),
                code: Some(code),
                detail: output.failure_detail(),
            }),
            ExitKind::Signal => Err(FsOpsError::TransferFailed {
                program: spec.program.clone(),
                code: None,
                detail: output.failure_detail(),
            }),
        }
    }
}

enum ExitKind {
    Code(i32),
    Signal,
}

impl ExitKind {
    fn from_status(status: ExitStatus) -> Self {
        status.code().map_or(Self::Signal, Self::Code)
    }

    fn from_wait(status: WaitStatus) -> Self {
        match status {
            WaitStatus::Exited(_, code) => Self::Code(code),
            _ => Self::Signal,
        }
    }
}

#[derive(Default)]
struct OutputState {
    percent: u8,
    bytes: u64,
    completed: bool,
    tail: VecDeque<String>,
}

impl OutputState {
    fn handle_line<R, F>(&mut self, line: &str, recognizer: &mut R, on_progress: &mut F)
    where
        R: OutputRecognizer,
        F: FnMut(u8, u64),
    {
        if recognizer.is_benign(line) {
            trace!(line, "benign tool warning");
            return;
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            if self.tail.len() == FAILURE_TAIL_LINES {
                self.tail.pop_front();
            }
            self.tail.push_back(trimmed.to_string());
        }
        if self.completed {
            return;
        }
        match recognizer.recognize(line) {
            Some(ProgressSignal::Progress {
                percent,
                bytes_transferred,
            }) => {
                let percent = percent.max(self.percent);
                let bytes = bytes_transferred.max(self.bytes);
                if percent != self.percent || bytes != self.bytes {
                    self.percent = percent;
                    self.bytes = bytes;
                    on_progress(percent, bytes);
                }
            }
            Some(ProgressSignal::Completed { total_bytes }) => {
                self.completed = true;
                self.percent = 100;
                self.bytes = total_bytes.max(self.bytes);
                on_progress(100, self.bytes);
            }
            None => {}
        }
    }

    fn finish<F: FnMut(u8, u64)>(&mut self, on_progress: &mut F) -> u64 {
        if !self.completed {
            self.completed = true;
            self.percent = 100;
            on_progress(100, self.bytes);
        }
        self.bytes
    }

    fn failure_detail(&self) -> String {
        self.tail.iter().cloned().collect::<Vec<_>>().join("\n")
    }
}

/// Splits a byte stream into lines on `\r` or `\n`, carrying partial lines between chunks.
#[derive(Debug, Default)]
struct LineSplitter {
    pending: Vec<u8>,
}

impl LineSplitter {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if !self.pending.is_empty() {
                    lines.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
            } else {
                self.pending.push(byte);
            }
        }
        lines
    }

    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            None
        } else {
            let line = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            Some(line)
        }
    }
}

async fn pump<S>(mut stream: S, tx: mpsc::Sender<Vec<u8>>)
where
    S: AsyncRead + Unpin,
{
    let mut buf = vec![0_u8; READ_CHUNK];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(read) => {
                if tx.send(buf[..read].to_vec()).await.is_err() {
                    break;
                }
            }
            Err(err) => {
                trace!(error = %err, "tool output stream closed");
                break;
            }
        }
    }
}

fn kill_group(pgid: Pid) {
    match killpg(pgid, Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => warn!(pgid = pgid.as_raw(), error = %err, "failed to kill process group"),
    }
}

/// Reap every exited member of the group without blocking.
/// Returns `true` once the group has no children left.
fn reap_group_nonblocking(pgid: Pid, primary: &mut Option<WaitStatus>) -> bool {
    let group = Pid::from_raw(-pgid.as_raw());
    loop {
        match waitpid(group, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => return false,
            Ok(status) => {
                if status.pid() == Some(pgid) {
                    *primary = Some(status);
                }
                trace!(pgid = pgid.as_raw(), ?status, "reaped group member");
            }
            Err(Errno::ECHILD) => return true,
            Err(Errno::EINTR) => {}
            Err(err) => {
                debug!(pgid = pgid.as_raw(), error = %err, "group reap failed");
                return false;
            }
        }
    }
}

struct GroupReaper {
    stop: CancellationToken,
    handle: JoinHandle<Option<WaitStatus>>,
}

impl GroupReaper {
    fn spawn(pgid: Pid, interval: Duration) -> Self {
        let stop = CancellationToken::new();
        let token = stop.clone();
        let handle = tokio::spawn(async move {
            let mut primary = None;
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if reap_group_nonblocking(pgid, &mut primary) {
                    break;
                }
            }
            primary
        });
        Self { stop, handle }
    }

    /// Stop polling and return the primary's status if the reaper collected it.
    async fn finish(self) -> Option<WaitStatus> {
        self.stop.cancel();
        match self.handle.await {
            Ok(primary) => primary,
            Err(err) => {
                warn!(error = %err, "group reaper task failed");
                None
            }
        }
    }
}

/// Blocking reap of all remaining group members; returns once the group is empty.
async fn final_reap(pgid: Pid) {
    let group = Pid::from_raw(-pgid.as_raw());
    let joined = tokio::task::spawn_blocking(move || {
        loop {
            match waitpid(group, None) {
                Ok(status) => trace!(?status, "final reap"),
                Err(Errno::EINTR) => {}
                Err(Errno::ECHILD) => break,
                Err(err) => {
                    debug!(error = %err, "final reap stopped");
                    break;
                }
            }
        }
    })
    .await;
    if let Err(err) = joined {
        warn!(error = %err, "final reap task failed");
    }
}
