//! Tailing a growing log and tracking a chunked process through its output
//!
//! A [`LogTail`] keeps one read lock open across polls so each line is seen
//! once. [`ProcessMonitor`] feeds those lines through [`OutputEvent::parse`]
//! and folds the events into a [`MonitorState`].

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::lock::LockId;
use crate::log_file::LogFile;

const SHELL_PID_PREFIX: &str = "Shell PID:";
const REASSEMBLING_SUFFIX: &str = "to reassemble";
const FINISHED_LINE: &str = "Finished reassembling";
const KILLED_LINE: &str = "When you rerun with a different set of machines, be sure to use";
const PAUSED_LINE: &str = "All previously running chunks are done - exiting as requested";
const BAD_COMMAND: &str = "BAD COMMAND IGNORED";

/// Shell failures that make the process exit without a final status line
const SHELL_ERRORS: &[&str] = &[
    "Syntax Error",
    "Subscript error",
    "Undefined variable",
    "Expression Syntax",
    "Subscript out of range",
    "Illegal variable name",
    "Variable syntax",
    "Badly placed (",
    "Badly formed number",
];

static SHELL_PID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Shell PID:\s+(\d+)$").expect("Invalid regex pattern")
});

/// `5 OF 10 DONE SO FAR` or `5 DONE SO FAR, 10 TOTAL`
static PROGRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d+)\s+OF\s+(\d+)\s+DONE SO FAR|(\d+)\s+DONE SO FAR,\s*(\d+)\s+TOTAL)$")
        .expect("Invalid regex pattern")
});

/// Reads whatever a log has gained since the last poll
pub struct LogTail {
    log: Arc<LogFile>,
    read_id: Option<LockId>,
    /// Start of a line whose terminator has not been written yet
    pending: String,
}

impl LogTail {
    pub fn new(log: Arc<LogFile>) -> Self {
        Self {
            log,
            read_id: None,
            pending: String::new(),
        }
    }

    pub fn log(&self) -> &Arc<LogFile> {
        &self.log
    }

    pub fn is_open(&self) -> bool {
        self.read_id.is_some()
    }

    /// Every complete line appended since the previous poll.
    ///
    /// Returns nothing while the file does not exist yet. A trailing piece
    /// without a line terminator is held back and joined with the rest of
    /// its line on a later poll.
    pub fn poll(&mut self) -> Result<Vec<String>> {
        let read_id = match self.read_id {
            Some(id) => id,
            None => {
                if !self.log.exists() {
                    return Ok(Vec::new());
                }
                match self.log.open_reader() {
                    Ok(id) => {
                        self.read_id = Some(id);
                        id
                    }
                    Err(e) if e.is_read() && !self.log.exists() => {
                        debug!("{} disappeared before it could be opened", self.log.name());
                        return Ok(Vec::new());
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let mut lines = Vec::new();
        while let Some((piece, terminated)) = self.log.read_line_with_end(read_id)? {
            self.pending.push_str(&piece);
            if terminated {
                lines.push(std::mem::take(&mut self.pending));
            }
        }
        Ok(lines)
    }

    /// Release the reader; a later poll starts again from the top
    pub fn close(&mut self) {
        self.pending.clear();
        if let Some(read_id) = self.read_id.take() {
            self.log.close_reader(read_id);
        }
    }
}

impl Drop for LogTail {
    fn drop(&mut self) {
        self.close();
    }
}

/// Something a chunked process reported in its output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputEvent {
    ShellPid(u32),
    Progress { done: u32, total: u32 },
    /// All chunks are done and the results are being put back together
    Reassembling,
    Finished,
    Killed,
    Paused,
    /// A shell or command error; the process may still be running chunks
    Error(String),
}

impl OutputEvent {
    /// Recognize one output line. Surrounding whitespace is ignored.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();

        if line.starts_with(SHELL_PID_PREFIX) {
            return SHELL_PID
                .captures(line)
                .and_then(|caps| caps[1].parse().ok())
                .map(OutputEvent::ShellPid);
        }
        if line.ends_with(REASSEMBLING_SUFFIX) {
            return Some(OutputEvent::Reassembling);
        }
        if line.contains(BAD_COMMAND) {
            return Some(OutputEvent::Error(line.to_string()));
        }
        match line {
            FINISHED_LINE => return Some(OutputEvent::Finished),
            KILLED_LINE => return Some(OutputEvent::Killed),
            PAUSED_LINE => return Some(OutputEvent::Paused),
            _ => {}
        }
        if SHELL_ERRORS.iter().any(|marker| line.contains(marker)) {
            return Some(OutputEvent::Error(line.to_string()));
        }

        let caps = PROGRESS.captures(line)?;
        let done = caps.get(1).or_else(|| caps.get(3))?.as_str().parse().ok()?;
        let total = caps.get(2).or_else(|| caps.get(4))?.as_str().parse().ok()?;
        Some(OutputEvent::Progress { done, total })
    }
}

/// How a monitored process stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndState {
    Done,
    Killed,
    Paused,
}

/// What is known about the process so far
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorState {
    /// First shell pid reported
    pub pid: Option<u32>,
    pub done: u32,
    pub total: u32,
    pub reassembling: bool,
    pub end: Option<EndState>,
    pub errors: Vec<String>,
    pub lines_seen: usize,
}

impl MonitorState {
    pub fn apply(&mut self, event: &OutputEvent) {
        match event {
            OutputEvent::ShellPid(pid) => {
                self.pid.get_or_insert(*pid);
            }
            OutputEvent::Progress { done, total } => {
                self.done = *done;
                self.total = *total;
            }
            OutputEvent::Reassembling => {
                self.reassembling = true;
                // Every chunk finished, so a pause request no longer applies
                if self.end == Some(EndState::Paused) {
                    self.end = None;
                }
            }
            OutputEvent::Finished => self.end = Some(EndState::Done),
            OutputEvent::Killed => self.end = Some(EndState::Killed),
            OutputEvent::Paused => self.end = Some(EndState::Paused),
            OutputEvent::Error(line) => self.errors.push(line.clone()),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.end.is_some()
    }
}

/// Follows a process log until the process reports how it ended
pub struct ProcessMonitor {
    tail: LogTail,
    state: MonitorState,
    interval: Duration,
}

impl ProcessMonitor {
    pub fn new(log: Arc<LogFile>, interval: Duration) -> Self {
        Self {
            tail: LogTail::new(log),
            state: MonitorState::default(),
            interval,
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Read new output once and return the events it contained
    pub fn update(&mut self) -> Result<Vec<OutputEvent>> {
        let lines = self.tail.poll()?;
        let mut events = Vec::new();
        for line in lines {
            self.state.lines_seen += 1;
            if let Some(event) = OutputEvent::parse(&line) {
                debug!("{}: {:?}", self.tail.log().name(), event);
                self.state.apply(&event);
                events.push(event);
            }
        }
        Ok(events)
    }

    /// Poll every interval until the process ends or `timeout` passes.
    ///
    /// Read failures are logged and retried on the next poll. Returns `None`
    /// on timeout.
    pub fn run_until_finished(&mut self, timeout: Option<Duration>) -> Option<EndState> {
        let started = Instant::now();
        loop {
            if let Err(e) = self.update() {
                warn!("{}", e);
            }
            if let Some(end) = self.state.end {
                info!("{} ended: {:?}", self.tail.log().name(), end);
                self.tail.close();
                return Some(end);
            }
            if timeout.map_or(false, |limit| started.elapsed() >= limit) {
                self.tail.close();
                return None;
            }
            thread::sleep(self.interval);
        }
    }

    /// Run the monitor on its own thread, streaming events as they arrive
    pub fn spawn(mut self) -> MonitorHandle {
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);

        let thread = thread::spawn(move || {
            loop {
                match self.update() {
                    Ok(events) => {
                        for event in events {
                            // The receiver may have been dropped; keep monitoring
                            let _ = event_tx.send(event);
                        }
                    }
                    Err(e) => warn!("{}", e),
                }
                if self.state.is_finished() {
                    break;
                }
                match stop_rx.recv_timeout(self.interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            self.tail.close();
            self.state
        });

        MonitorHandle {
            events: event_rx,
            stop: stop_tx,
            thread,
        }
    }
}

/// A monitor running on a background thread
pub struct MonitorHandle {
    events: Receiver<OutputEvent>,
    stop: Sender<()>,
    thread: JoinHandle<MonitorState>,
}

impl MonitorHandle {
    pub fn events(&self) -> &Receiver<OutputEvent> {
        &self.events
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the process to end on its own
    pub fn join(self) -> thread::Result<MonitorState> {
        self.thread.join()
    }

    /// Stop polling and return the state reached so far
    pub fn stop(self) -> thread::Result<MonitorState> {
        let _ = self.stop.try_send(());
        self.thread.join()
    }
}
