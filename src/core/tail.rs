//! Live serial log viewer
//!
//! Waits for the radio's serial endpoint to appear, opens it with bounded
//! retries and streams newline-delimited text until cancelled. Endpoints on
//! composite USB devices can vanish while drivers rebind, so a "not found"
//! during open triggers a fresh lookup before the next attempt.

use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use super::config::DeployConfig;
use super::locator::SerialLocator;
use crate::config::defaults;
use crate::infra::retry::RetryPolicy;
use crate::infra::serial::{OpenError, PortEnumerator, PortOpener, SerialStream};

/// Why a tail session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailExit {
    /// Cancelled by the user
    StoppedByUser,
    /// No matching endpoint appeared
    NoPortFound,
    /// Endpoint found but never opened
    OpenFailed(String),
    /// Stream failed after opening
    ReadFailed(String),
}

impl TailExit {
    /// Process exit code for this outcome
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::StoppedByUser => 0,
            Self::NoPortFound => 3,
            Self::OpenFailed(_) | Self::ReadFailed(_) => 4,
        }
    }
}

/// What to look for and how hard to try
#[derive(Debug, Clone, PartialEq)]
pub struct TailRequest {
    pub vid: Option<String>,
    pub pid: Option<String>,
    pub name_hint: Option<String>,
    pub baud: u32,
    /// Discovery attempts
    pub retries: u32,
    pub retry_delay: Duration,
}

impl TailRequest {
    /// Request built from the serial settings of a config document
    pub fn from_config(config: &DeployConfig) -> Self {
        let non_empty = |s: &str| (!s.trim().is_empty()).then(|| s.to_string());
        Self {
            vid: non_empty(&config.serial_vid),
            pid: non_empty(&config.serial_pid),
            name_hint: non_empty(&config.serial_name_hint),
            baud: config.serial_baud,
            retries: config.serial_retries,
            retry_delay: config.serial_delay(),
        }
    }
}

/// An endpoint selected for reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSession {
    pub port: String,
    pub baud: u32,
    /// Open attempts
    pub retry_budget: u32,
    pub retry_delay: Duration,
}

/// Streams serial output to a line sink
pub struct SerialTailer<'a> {
    enumerator: &'a dyn PortEnumerator,
    opener: &'a dyn PortOpener,
    settle: Duration,
    open_attempts: u32,
}

impl<'a> SerialTailer<'a> {
    /// Tailer with the standard settle time and open budget
    pub fn new(enumerator: &'a dyn PortEnumerator, opener: &'a dyn PortOpener) -> Self {
        Self {
            enumerator,
            opener,
            settle: defaults::TAIL_SETTLE_DELAY,
            open_attempts: defaults::PORT_OPEN_ATTEMPTS,
        }
    }

    /// Override the wait before the first lookup
    #[must_use]
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    fn locate(&self, request: &TailRequest) -> Option<String> {
        SerialLocator::new(self.enumerator).find_port(
            request.vid.as_deref(),
            request.pid.as_deref(),
            request.name_hint.as_deref(),
        )
    }

    /// Find, open and read the endpoint until `token` is cancelled
    ///
    /// Each decoded line (without its terminator) is passed to `sink`.
    pub fn tail<F>(&self, request: &TailRequest, token: &CancellationToken, mut sink: F) -> TailExit
    where
        F: FnMut(&str),
    {
        if !sleep_unless_cancelled(token, self.settle) {
            return TailExit::StoppedByUser;
        }

        let session = match self.discover(request, token) {
            Discovery::Found(port) => SerialSession {
                port,
                baud: request.baud,
                retry_budget: self.open_attempts,
                retry_delay: request.retry_delay,
            },
            Discovery::Cancelled => return TailExit::StoppedByUser,
            Discovery::Missing => {
                tracing::warn!("No serial port matched after {} attempts", request.retries);
                return TailExit::NoPortFound;
            }
        };

        let stream = match self.open(request, session, token) {
            Opened::Stream(stream) => stream,
            Opened::Cancelled => return TailExit::StoppedByUser,
            Opened::Failed(reason) => return TailExit::OpenFailed(reason),
        };

        println!("[SERIAL] Connected. Press Ctrl+C to stop.");
        read_lines(stream, token, &mut sink)
    }

    fn discover(&self, request: &TailRequest, token: &CancellationToken) -> Discovery {
        let policy = RetryPolicy::new(request.retries, request.retry_delay);
        let outcome = policy.run_with_sleep(
            |attempt| {
                if token.is_cancelled() {
                    return Ok(None);
                }
                match self.locate(request) {
                    Some(port) => Ok(Some(port)),
                    None => {
                        println!(
                            "[SERIAL] Waiting for port (attempt {attempt}/{})…",
                            policy.max_attempts()
                        );
                        Err(())
                    }
                }
            },
            |delay| {
                sleep_unless_cancelled(token, delay);
            },
        );
        match outcome {
            Ok(Some(port)) => Discovery::Found(port),
            Ok(None) => Discovery::Cancelled,
            Err(_) if token.is_cancelled() => Discovery::Cancelled,
            Err(_) => Discovery::Missing,
        }
    }

    fn open(
        &self,
        request: &TailRequest,
        mut session: SerialSession,
        token: &CancellationToken,
    ) -> Opened {
        let policy = RetryPolicy::new(session.retry_budget, session.retry_delay);
        let outcome = policy.run_with_sleep(
            |attempt| {
                if token.is_cancelled() {
                    return Ok(None);
                }
                println!(
                    "[SERIAL] Opening {} @ {} (attempt {attempt}/{})",
                    session.port,
                    session.baud,
                    policy.max_attempts()
                );
                match self.opener.open(&session.port, session.baud) {
                    Ok(stream) => Ok(Some(stream)),
                    Err(OpenError::NotFound(msg)) => {
                        tracing::debug!("{} vanished during open: {msg}", session.port);
                        if let Some(port) = self.locate(request) {
                            if port != session.port {
                                println!("[SERIAL] Port changed to {port}");
                            }
                            session.port = port;
                        }
                        Err(msg)
                    }
                    Err(OpenError::Other(msg)) => {
                        tracing::debug!("Open {} failed: {msg}", session.port);
                        Err(msg)
                    }
                }
            },
            |delay| {
                sleep_unless_cancelled(token, delay);
            },
        );
        match outcome {
            Ok(Some(stream)) => Opened::Stream(stream),
            Ok(None) => Opened::Cancelled,
            Err(_) if token.is_cancelled() => Opened::Cancelled,
            Err(exhausted) => Opened::Failed(format!(
                "could not open after {} attempts: {}",
                exhausted.attempts, exhausted.last_error
            )),
        }
    }
}

enum Discovery {
    Found(String),
    Missing,
    Cancelled,
}

enum Opened {
    Stream(SerialStream),
    Failed(String),
    Cancelled,
}

/// Read until cancelled or a non-timeout error
fn read_lines<F>(mut stream: SerialStream, token: &CancellationToken, sink: &mut F) -> TailExit
where
    F: FnMut(&str),
{
    let mut chunk = [0u8; defaults::SERIAL_READ_CHUNK];
    let mut pending: Vec<u8> = Vec::new();

    while !token.is_cancelled() {
        match stream.read(&mut chunk) {
            Ok(0) => std::thread::sleep(IDLE_POLL),
            Ok(n) => {
                pending.extend_from_slice(&chunk[..n]);
                emit_complete_lines(&mut pending, sink);
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                tracing::debug!("Serial read failed: {e}");
                return TailExit::ReadFailed(e.to_string());
            }
        }
    }
    TailExit::StoppedByUser
}

/// Back-off when a read returns no bytes without timing out
const IDLE_POLL: Duration = Duration::from_millis(50);

/// Drain every `\n`-terminated line from `pending`
fn emit_complete_lines<F>(pending: &mut Vec<u8>, sink: &mut F)
where
    F: FnMut(&str),
{
    while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = pending.drain(..=pos).collect();
        let text = String::from_utf8_lossy(&line[..pos]);
        sink(text.strip_suffix('\r').unwrap_or(&*text));
    }
}

/// Sleep in short slices; false when cancelled first
fn sleep_unless_cancelled(token: &CancellationToken, duration: Duration) -> bool {
    const SLICE: Duration = Duration::from_millis(50);
    let deadline = Instant::now() + duration;
    loop {
        if token.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep(SLICE.min(deadline - now));
    }
}
