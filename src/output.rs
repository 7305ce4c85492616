// ABOUTME: Output formatting for CLI feedback and streamed command output.
// ABOUTME: Supports normal, quiet (raw output only), and JSON lines modes.

use serde::Serialize;
use std::io::Write;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Progress messages plus host-prefixed output
    Normal,
    /// Raw command output only
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
#[derive(Debug, Clone)]
pub struct Output {
    mode: OutputMode,
    start_time: Instant,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: Instant::now(),
        }
    }

    /// Get elapsed time since this output was created.
    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print one chunk of remote output.
    pub fn chunk(&self, host: &str, data: &str) {
        match self.mode {
            OutputMode::Normal => {
                for line in data.lines() {
                    println!("[{host}] {line}");
                }
            }
            OutputMode::Quiet => {
                print!("{data}");
                let _ = std::io::stdout().flush();
            }
            OutputMode::Json => emit(&JsonEvent {
                event: "output",
                host: Some(host),
                data: Some(data),
                ..JsonEvent::default()
            }),
        }
    }

    /// Report how a command ended on a host.
    pub fn exit(&self, host: &str, status: Option<u32>) {
        match self.mode {
            OutputMode::Normal => match status {
                Some(0) => println!("  ✓ {host} exited 0 ({:.1}s)", self.elapsed_secs()),
                Some(code) => println!("  ✗ {host} exited {code}"),
                None => println!("  ? {host} exit status unavailable"),
            },
            OutputMode::Quiet => {}
            OutputMode::Json => emit(&JsonEvent {
                event: "exit",
                host: Some(host),
                status,
                duration_secs: Some(self.elapsed_secs()),
                ..JsonEvent::default()
            }),
        }
    }

    /// Print a warning message.
    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {message}"),
            OutputMode::Json => emit_err(&JsonEvent {
                event: "warning",
                message: Some(message),
                ..JsonEvent::default()
            }),
        }
    }

    /// Print an error message, optionally attributed to a host.
    pub fn error(&self, host: Option<&str>, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => match host {
                Some(host) => eprintln!("Error: {host}: {message}"),
                None => eprintln!("Error: {message}"),
            },
            OutputMode::Json => emit_err(&JsonEvent {
                event: "error",
                host,
                message: Some(message),
                ..JsonEvent::default()
            }),
        }
    }
}

#[derive(Serialize, Default)]
struct JsonEvent<'a> {
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

fn emit(event: &JsonEvent<'_>) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    }
}

fn emit_err(event: &JsonEvent<'_>) {
    if let Ok(json) = serde_json::to_string(event) {
        eprintln!("{json}");
    }
}
