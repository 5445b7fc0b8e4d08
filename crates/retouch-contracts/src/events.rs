use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Something that happened to an edit session. Serialised with its variant
/// name as the `type` field; never carries image bytes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SourceUploaded {
        mime_type: String,
        bytes: usize,
    },
    SourceRejected {
        mime_type: String,
        error_kind: &'static str,
        error: String,
    },
    EditStarted {
        ticket: Uuid,
        instruction: String,
        high_quality: bool,
        mime_type: String,
    },
    EditSucceeded {
        ticket: Uuid,
        record_id: String,
        high_quality: bool,
        mime_type: String,
        bytes: usize,
        history_len: usize,
    },
    EditFailed {
        ticket: Option<Uuid>,
        error_kind: &'static str,
        error: String,
    },
    EditCancelled {
        ticket: Uuid,
    },
    HistorySelected {
        record_id: String,
    },
    RevertedToSource {
        history_len: usize,
    },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::SourceUploaded { .. } => "source_uploaded",
            SessionEvent::SourceRejected { .. } => "source_rejected",
            SessionEvent::EditStarted { .. } => "edit_started",
            SessionEvent::EditSucceeded { .. } => "edit_succeeded",
            SessionEvent::EditFailed { .. } => "edit_failed",
            SessionEvent::EditCancelled { .. } => "edit_cancelled",
            SessionEvent::HistorySelected { .. } => "history_selected",
            SessionEvent::RevertedToSource { .. } => "reverted_to_source",
        }
    }
}

#[derive(Serialize)]
struct LogLine<'a> {
    #[serde(flatten)]
    event: &'a SessionEvent,
    session_id: &'a str,
    ts: String,
}

/// Appends session events to a JSONL file, one compact object per line.
/// Clones share the file lock, so lines from clones never interleave.
#[derive(Debug, Clone)]
pub struct EventWriter {
    path: PathBuf,
    session_id: String,
    lock: Arc<Mutex<()>>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            session_id: session_id.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn record(&self, event: &SessionEvent) -> Result<()> {
        let line = serde_json::to_string(&LogLine {
            event,
            session_id: &self.session_id,
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
        })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow!("event log lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open {}", self.path.display()))?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}
