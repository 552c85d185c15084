// ABOUTME: Output formatting for CLI feedback.
// ABOUTME: Supports normal, quiet (CI), and JSON output modes, including streamed remote log chunks.

use crate::logs::{LogChunk, LogStream};
use serde::Serialize;
use std::io::Write;
use std::time::Instant;

/// Output mode for CLI feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with progress messages and remote logs
    Normal,
    /// Minimal output for CI (only final result)
    Quiet,
    /// JSON lines for scripting
    Json,
}

/// Handles CLI output based on the configured mode.
#[derive(Debug, Clone)]
pub struct Output {
    mode: OutputMode,
    start_time: Option<Instant>,
}

impl Output {
    pub fn new(mode: OutputMode) -> Self {
        Self {
            mode,
            start_time: None,
        }
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn start_timer(&mut self) {
        self.start_time = Some(Instant::now());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }

    fn duration_secs(&self) -> Option<f64> {
        self.start_time.map(|_| self.elapsed_secs())
    }

    /// Print a progress message (suppressed in quiet/json mode).
    pub fn progress(&self, message: &str) {
        if self.mode == OutputMode::Normal {
            println!("{message}");
        }
    }

    /// Print one streamed chunk as it arrived, without adding newlines.
    pub fn chunk(&self, chunk: &LogChunk) {
        match self.mode {
            OutputMode::Normal => {
                let written = match chunk.stream {
                    LogStream::Stderr => {
                        let mut err = std::io::stderr().lock();
                        err.write_all(chunk.text.as_bytes()).and_then(|()| err.flush())
                    }
                    LogStream::Stdout | LogStream::Info => {
                        let mut out = std::io::stdout().lock();
                        out.write_all(chunk.text.as_bytes()).and_then(|()| out.flush())
                    }
                };
                if let Err(e) = written {
                    tracing::debug!("failed to write log chunk: {}", e);
                }
            }
            OutputMode::Quiet => {}
            OutputMode::Json => print_json(&LogEvent {
                event: "log",
                stream: chunk.stream,
                text: &chunk.text,
            }),
        }
    }

    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Warning: {message}"),
            OutputMode::Json => print_json(&JsonEvent {
                event: "warning",
                message,
                duration_secs: None,
            }),
        }
    }

    /// Print a success message with optional timing.
    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Normal => match self.duration_secs() {
                Some(elapsed) => println!("{message} ({:.1}s)", elapsed),
                None => println!("{message}"),
            },
            OutputMode::Quiet => println!("{message}"),
            OutputMode::Json => print_json(&JsonEvent {
                event: "success",
                message,
                duration_secs: self.duration_secs(),
            }),
        }
    }

    pub fn error(&self, message: &str) {
        match self.mode {
            OutputMode::Normal | OutputMode::Quiet => eprintln!("Error: {message}"),
            OutputMode::Json => {
                let event = JsonEvent {
                    event: "error",
                    message,
                    duration_secs: self.duration_secs(),
                };
                if let Ok(json) = serde_json::to_string(&event) {
                    eprintln!("{json}");
                }
            }
        }
    }

    /// Emit a structured result record. Only JSON mode prints it; the other
    /// modes report results through `success`/`error`.
    pub fn record<T: Serialize>(&self, kind: &str, value: &T) {
        if self.mode == OutputMode::Json {
            print_json(&RecordEvent {
                event: kind,
                data: value,
            });
        }
    }
}

fn print_json<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    event: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<f64>,
}

#[derive(Serialize)]
struct LogEvent<'a> {
    event: &'a str,
    stream: LogStream,
    text: &'a str,
}

#[derive(Serialize)]
struct RecordEvent<'a, T> {
    event: &'a str,
    data: &'a T,
}
