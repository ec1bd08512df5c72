//! Watch command implementation - follows a chunked process log

use anyhow::{anyhow, bail, Result};
use crossbeam_channel::RecvTimeoutError;
use logwarden_logs::{EndState, OutputEvent, ProcessMonitor, Registry};
use std::time::{Duration, Instant};

use crate::cli::WatchArgs;
use crate::output::{
    end_state_name, format_progress, is_json_mode, print_error, print_info, print_success,
    WatchJson,
};

pub fn execute(registry: &Registry, args: WatchArgs) -> Result<()> {
    let log = registry.get(&args.file)?;
    let interval = args
        .interval_ms
        .map(Duration::from_millis)
        .unwrap_or_else(|| registry.config().poll_interval());
    let deadline = args
        .timeout_secs
        .map(|secs| Instant::now() + Duration::from_secs(secs));

    if !is_json_mode() {
        print_info(&format!("Watching {}", log.absolute_path().display()));
    }

    let handle = ProcessMonitor::new(log, interval).spawn();
    let mut timed_out = false;
    loop {
        match handle.events().recv_timeout(Duration::from_millis(100)) {
            Ok(event) => print_event(&event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if past_deadline(deadline, Instant::now()) {
            timed_out = true;
            break;
        }
    }

    let state = if timed_out {
        handle.stop()
    } else {
        handle.join()
    }
    .map_err(|_| anyhow!("Monitor thread panicked"))?;

    if is_json_mode() {
        println!("{}", serde_json::to_string_pretty(&WatchJson::from(&state))?);
    } else {
        match state.end {
            Some(EndState::Done) => print_success("Process finished"),
            Some(end) => print_info(&format!("Process ended: {}", end_state_name(end))),
            None => {}
        }
    }

    if timed_out {
        bail!(
            "Timed out after {}s ({})",
            args.timeout_secs.unwrap_or_default(),
            format_progress(state.done, state.total)
        );
    }
    Ok(())
}

fn past_deadline(deadline: Option<Instant>, now: Instant) -> bool {
    deadline.map_or(false, |deadline| now >= deadline)
}

fn print_event(event: &OutputEvent) {
    if is_json_mode() {
        return;
    }
    match event {
        OutputEvent::ShellPid(pid) => print_info(&format!("Shell PID {}", pid)),
        OutputEvent::Progress { done, total } => println!("{}", format_progress(*done, *total)),
        OutputEvent::Reassembling => print_info("Reassembling"),
        OutputEvent::Error(line) => print_error(line),
        OutputEvent::Finished | OutputEvent::Killed | OutputEvent::Paused => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_past_deadline() {
        let now = Instant::now();
        assert!(!past_deadline(None, now));
        assert!(!past_deadline(Some(now + Duration::from_secs(1)), now));
        assert!(past_deadline(Some(now), now));
    }
}
