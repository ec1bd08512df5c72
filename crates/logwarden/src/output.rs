//! Terminal and JSON output formatting

use colored::Colorize;
use logwarden_logs::{EndState, MonitorState};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

/// Global flag for JSON output mode
static JSON_MODE: AtomicBool = AtomicBool::new(false);

/// Enable or disable JSON output mode
pub fn set_json_mode(enabled: bool) {
    JSON_MODE.store(enabled, Ordering::SeqCst);
}

/// Check if JSON output mode is enabled
pub fn is_json_mode() -> bool {
    JSON_MODE.load(Ordering::SeqCst)
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue(), message);
}

/// Print log lines, as a JSON array if enabled
pub fn print_logs(lines: &[String]) {
    if is_json_mode() {
        match serde_json::to_string_pretty(&lines) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serializing to JSON: {}", e),
        }
        return;
    }

    for line in lines {
        println!("{}", line);
    }
}

/// JSON wrapper for generic responses
#[derive(Serialize)]
pub struct ResponseJson<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// Print a success message in JSON format if enabled
pub fn print_success_json<T: Serialize>(message: &str, data: Option<T>) {
    if is_json_mode() {
        let response = ResponseJson {
            success: true,
            message: Some(message.to_string()),
            data,
        };
        if let Ok(json) = serde_json::to_string_pretty(&response) {
            println!("{}", json);
        }
    } else {
        print_success(message);
    }
}

/// Print an informational message in JSON format if enabled
pub fn print_info_json(message: &str) {
    if is_json_mode() {
        let response: ResponseJson<()> = ResponseJson {
            success: true,
            message: Some(message.to_string()),
            data: None,
        };
        if let Ok(json) = serde_json::to_string_pretty(&response) {
            println!("{}", json);
        }
    } else {
        print_info(message);
    }
}

/// Final state of a watched process
#[derive(Debug, Serialize)]
pub struct WatchJson {
    pub end: Option<String>,
    pub pid: Option<u32>,
    pub done: u32,
    pub total: u32,
    pub reassembling: bool,
    pub lines: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl From<&MonitorState> for WatchJson {
    fn from(state: &MonitorState) -> Self {
        WatchJson {
            end: state.end.map(end_state_name).map(str::to_string),
            pid: state.pid,
            done: state.done,
            total: state.total,
            reassembling: state.reassembling,
            lines: state.lines_seen,
            errors: state.errors.clone(),
        }
    }
}

pub fn end_state_name(end: EndState) -> &'static str {
    match end {
        EndState::Done => "done",
        EndState::Killed => "killed",
        EndState::Paused => "paused",
    }
}

/// Progress line like `chunks 5/10`
pub fn format_progress(done: u32, total: u32) -> String {
    if total == 0 {
        "chunks -".to_string()
    } else {
        format!("chunks {}/{}", done, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_mode_toggle() {
        set_json_mode(false);
        assert!(!is_json_mode());

        set_json_mode(true);
        assert!(is_json_mode());

        set_json_mode(false);
        assert!(!is_json_mode());
    }

    #[test]
    fn test_watch_json_from_state() {
        let state = MonitorState {
            pid: Some(4211),
            done: 10,
            total: 10,
            reassembling: true,
            end: Some(EndState::Done),
            errors: Vec::new(),
            lines_seen: 14,
        };
        let json = WatchJson::from(&state);

        assert_eq!(json.end.as_deref(), Some("done"));
        assert_eq!(json.pid, Some(4211));
        assert_eq!(json.lines, 14);

        let text = serde_json::to_string(&json).unwrap();
        assert!(!text.contains("errors"));
    }

    #[test]
    fn test_format_progress() {
        assert_eq!(format_progress(0, 0), "chunks -");
        assert_eq!(format_progress(5, 10), "chunks 5/10");
    }
}
