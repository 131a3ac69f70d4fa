//! Merge progress reporting.
//!
//! Reports per-category progress during `lmerge run` so users can see which
//! source file each worker is on and how far into it. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event from a category worker.
#[derive(Clone, Debug)]
pub enum MergeProgressEvent {
    /// A worker opened a source file: `total` records to standardize.
    Loading {
        category: String,
        source: String,
        total: u64,
    },
    /// `n` of `total` records from `source` processed.
    Processing {
        category: String,
        source: String,
        n: u64,
        total: u64,
    },
    /// Output written.
    Finished { category: String, written: u64 },
}

/// Reports merge progress. Shared by all workers, hence `Send + Sync`.
pub trait MergeProgressReporter: Send + Sync {
    fn report(&self, event: MergeProgressEvent);
}

/// Human-friendly progress on stderr: "merge casa_venda  olx  120 / 1,534 records".
pub struct StderrProgress;

impl MergeProgressReporter for StderrProgress {
    fn report(&self, event: MergeProgressEvent) {
        let line = match &event {
            MergeProgressEvent::Loading {
                category,
                source,
                total,
            } => format!(
                "merge {}  {}  loading {} records\n",
                category,
                source,
                format_number(*total)
            ),
            MergeProgressEvent::Processing {
                category,
                source,
                n,
                total,
            } => format!(
                "merge {}  {}  {} / {} records\n",
                category,
                source,
                format_number(*n),
                format_number(*total)
            ),
            MergeProgressEvent::Finished { category, written } => format!(
                "merge {}  done  {} listings\n",
                category,
                format_number(*written)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl MergeProgressReporter for JsonProgress {
    fn report(&self, event: MergeProgressEvent) {
        let obj = match &event {
            MergeProgressEvent::Loading {
                category,
                source,
                total,
            } => serde_json::json!({
                "event": "progress",
                "category": category,
                "source": source,
                "phase": "loading",
                "total": total
            }),
            MergeProgressEvent::Processing {
                category,
                source,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "category": category,
                "source": source,
                "phase": "processing",
                "n": n,
                "total": total
            }),
            MergeProgressEvent::Finished { category, written } => serde_json::json!({
                "event": "finished",
                "category": category,
                "written": written
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl MergeProgressReporter for NoProgress {
    fn report(&self, _event: MergeProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
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

    pub fn reporter(&self) -> Box<dyn MergeProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
