//! Build progress reporting.
//!
//! Reports observable progress during `lkc build` so users see how many
//! batches are done and how many words are cached. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for a cache build.
#[derive(Clone, Debug, PartialEq)]
pub enum LookupProgressEvent {
    /// Emitted after every batch, successful or not.
    BatchCompleted {
        batches_done: usize,
        batches_total: usize,
        words_queued: usize,
        words_cached: usize,
        llm_calls: u64,
    },
    /// A whole-batch attempt failed and may be retried.
    BatchRetry {
        batch: usize,
        attempt: u32,
        max_attempts: u32,
        error: String,
    },
}

/// Receives build progress. Called from the batch orchestrator.
pub trait LookupProgressReporter: Send + Sync {
    fn report(&self, event: LookupProgressEvent);
}

/// Human-friendly progress on stderr: "lookup  batch 3 / 12  (27 / 118 words cached)".
pub struct StderrProgress;

impl LookupProgressReporter for StderrProgress {
    fn report(&self, event: LookupProgressEvent) {
        let line = match &event {
            LookupProgressEvent::BatchCompleted {
                batches_done,
                batches_total,
                words_queued,
                words_cached,
                ..
            } => format!(
                "lookup  batch {} / {}  ({} / {} words cached)\n",
                format_number(*batches_done as u64),
                format_number(*batches_total as u64),
                format_number(*words_cached as u64),
                format_number(*words_queued as u64)
            ),
            LookupProgressEvent::BatchRetry {
                batch,
                attempt,
                max_attempts,
                error,
            } => format!(
                "lookup  batch {}  attempt {}/{} failed: {}\n",
                batch, attempt, max_attempts, error
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl LookupProgressReporter for JsonProgress {
    fn report(&self, event: LookupProgressEvent) {
        let obj = match &event {
            LookupProgressEvent::BatchCompleted {
                batches_done,
                batches_total,
                words_queued,
                words_cached,
                llm_calls,
            } => serde_json::json!({
                "event": "progress",
                "phase": "lookup",
                "batches_done": batches_done,
                "batches_total": batches_total,
                "words_queued": words_queued,
                "words_cached": words_cached,
                "llm_calls": llm_calls
            }),
            LookupProgressEvent::BatchRetry {
                batch,
                attempt,
                max_attempts,
                error,
            } => serde_json::json!({
                "event": "retry",
                "phase": "lookup",
                "batch": batch,
                "attempt": attempt,
                "max_attempts": max_attempts,
                "error": error
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl LookupProgressReporter for NoProgress {
    fn report(&self, _event: LookupProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse `off`, `human` or `json`; anything else falls back to the TTY default.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("off") => ProgressMode::Off,
            Some("human") => ProgressMode::Human,
            Some("json") => ProgressMode::Json,
            _ => Self::default_for_tty(),
        }
    }

    pub fn reporter(&self) -> Box<dyn LookupProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn parse_progress_mode() {
        assert_eq!(ProgressMode::parse(Some("off")), ProgressMode::Off);
        assert_eq!(ProgressMode::parse(Some("json")), ProgressMode::Json);
        assert_eq!(ProgressMode::parse(Some("human")), ProgressMode::Human);
    }
}
