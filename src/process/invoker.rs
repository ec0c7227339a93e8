use std::borrow::Cow;
use std::ffi::{OsStr, OsString};
use std::io::{self, Read};
use std::process::{Child, ChildStderr, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::classify::classify;
use crate::error::{Result, TesseractError};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Everything a finished child left behind.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Raw bytes; a PDF when `pdf` output was requested.
    pub stdout: Vec<u8>,
    pub stderr: String,
    pub status: ExitStatus,
    /// Quoted command line, for diagnostics.
    pub command: String,
}

impl ExecutionResult {
    /// Clean exit and nothing on stderr.
    pub fn is_success(&self) -> bool {
        self.status.success() && self.stderr.is_empty()
    }

    pub fn stdout_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    /// Apply the success criteria, turning a failed run into a classified error.
    pub fn check(self) -> Result<Self> {
        if !self.is_success() {
            let kind = classify(&self.stderr);
            warn!(
                "Command failed ({}, status {:?}): {}",
                kind,
                self.status.code(),
                self.command
            );
            return Err(TesseractError::ExecutionFailed {
                kind,
                command: self.command,
                status: self.status.code(),
                stderr: self.stderr,
            });
        }

        if self.stdout.iter().all(is_blank) {
            return Err(TesseractError::EmptyResult {
                command: self.command,
            });
        }

        Ok(self)
    }
}

/// ASCII whitespace including vertical tab, which `u8::is_ascii_whitespace` skips.
fn is_blank(byte: &u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\x0b' | b'\x0c' | b'\r')
}

/// Run `argv` (program first) and require a clean, non-empty result.
pub fn run(argv: &[OsString], timeout: Duration) -> Result<ExecutionResult> {
    capture(argv, timeout)?.check()
}

/// Run `argv` and collect its output without judging it.
///
/// Blocks until the child exits or `timeout` passes; on timeout the child is
/// killed.
pub fn capture(argv: &[OsString], timeout: Duration) -> Result<ExecutionResult> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| TesseractError::Argument("empty argument vector".to_string()))?;
    let command = render_command_line(argv);
    debug!("Running: {}", command);

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| TesseractError::Spawn {
            program: program.to_string_lossy().into_owned(),
            source,
        })?;

    // Drain both pipes concurrently so a chatty child never blocks on a full pipe.
    let pipes = Pipes::drain(child.stdout.take(), child.stderr.take());

    let started = Instant::now();
    let status = loop {
        let polled = match child.try_wait() {
            Ok(polled) => polled,
            Err(e) => {
                stop(&mut child);
                return Err(e.into());
            }
        };
        if let Some(status) = polled {
            break status;
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            stop(&mut child);
            // Reader threads are left to finish on their own; a grandchild may
            // still hold the pipes open.
            return Err(TesseractError::Timeout { command, timeout });
        }

        thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
    };

    // The child is gone, but anything it left running in the background still
    // holds the pipes; the deadline covers that wait too.
    let remaining = timeout.saturating_sub(started.elapsed());
    let Some((stdout, stderr)) = pipes.collect(remaining)? else {
        warn!("Output still open after exit, a descendant holds the pipes: {}", command);
        return Err(TesseractError::Timeout { command, timeout });
    };
    debug!(
        "Finished with {:?} ({} bytes stdout, {} bytes stderr)",
        status.code(),
        stdout.len(),
        stderr.len()
    );

    Ok(ExecutionResult {
        stdout,
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        status,
        command,
    })
}

/// Kill and reap `child`, logging instead of failing.
fn stop(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!("Failed to kill child {}: {}", child.id(), e);
    }
    let _ = child.wait();
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

/// Reader threads for the child's output, reporting over a channel.
struct Pipes {
    rx: Receiver<(Stream, io::Result<Vec<u8>>)>,
    pending: usize,
}

impl Pipes {
    fn drain(stdout: Option<ChildStdout>, stderr: Option<ChildStderr>) -> Self {
        let (tx, rx) = mpsc::channel();
        let pending = spawn_reader(stdout, Stream::Stdout, &tx)
            + spawn_reader(stderr, Stream::Stderr, &tx);
        Self { rx, pending }
    }

    /// Wait at most `budget` for every reader; `None` if they are still blocked.
    fn collect(self, budget: Duration) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let started = Instant::now();
        let (mut stdout, mut stderr) = (Vec::new(), Vec::new());

        for _ in 0..self.pending {
            let remaining = budget.saturating_sub(started.elapsed());
            let (stream, bytes) = match self.rx.recv_timeout(remaining) {
                Ok(report) => report,
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    let lost = io::Error::new(io::ErrorKind::Other, "pipe reader exited without output");
                    return Err(lost.into());
                }
            };
            match stream {
                Stream::Stdout => stdout = bytes?,
                Stream::Stderr => stderr = bytes?,
            }
        }

        Ok(Some((stdout, stderr)))
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    pipe: Option<R>,
    stream: Stream,
    tx: &Sender<(Stream, io::Result<Vec<u8>>)>,
) -> usize {
    let Some(mut pipe) = pipe else {
        return 0;
    };
    let tx = tx.clone();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let read = pipe.read_to_end(&mut buf).map(|_| buf);
        // The receiver is gone once the call has timed out.
        let _ = tx.send((stream, read));
    });
    1
}

/// Join arguments into a copy-pasteable shell line.
pub fn render_command_line(argv: &[OsString]) -> String {
    argv.iter()
        .map(|arg| quote(arg))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote(arg: &OsStr) -> String {
    let arg = arg.to_string_lossy();
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=+:,@%".contains(c));

    if plain {
        arg.into_owned()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
