//! Workflow event log for analysis sessions.
//!
//! Stages report `started`, `completed` and `failed` events to an
//! [`EventSink`]. Sinks are observers only: the pipeline logs a sink failure
//! and carries on.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const WORKFLOW_LOG: &str = "workflow_execution.json";
pub const ERROR_LOG: &str = "error_log.json";

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("event log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("event log is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("event buffer lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Started,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub workflow: String,
    pub status: WorkflowStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub artifacts_created: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl WorkflowEvent {
    pub fn started(workflow: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            workflow: workflow.to_string(),
            status: WorkflowStatus::Started,
            timestamp,
            artifacts_created: Vec::new(),
            error_message: None,
        }
    }

    pub fn completed(workflow: &str, timestamp: DateTime<Utc>, artifacts: Vec<String>) -> Self {
        Self {
            artifacts_created: artifacts,
            status: WorkflowStatus::Completed,
            ..Self::started(workflow, timestamp)
        }
    }

    pub fn failed(workflow: &str, timestamp: DateTime<Utc>, message: String) -> Self {
        Self {
            error_message: Some(message),
            status: WorkflowStatus::Failed,
            ..Self::started(workflow, timestamp)
        }
    }
}

pub trait EventSink: Send + Sync {
    fn record(&self, event: &WorkflowEvent) -> Result<(), SinkError>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct WorkflowLog {
    #[serde(default)]
    workflows: Vec<WorkflowEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WorkflowEntry {
    workflow: String,
    status: WorkflowStatus,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    artifacts_created: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ErrorLog {
    #[serde(default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorEntry {
    workflow: String,
    error_message: String,
    timestamp: DateTime<Utc>,
    status: String,
}

/// JSON logs kept in a session's artifact directory. The workflow log holds
/// the latest state of each workflow; the error log only grows.
#[derive(Debug)]
pub struct ArtifactLog {
    session_dir: PathBuf,
    lock: Mutex<()>,
}

impl ArtifactLog {
    pub fn new(session_dir: impl Into<PathBuf>) -> Self {
        Self {
            session_dir: session_dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    fn update_workflows(&self, event: &WorkflowEvent) -> Result<(), SinkError> {
        let path = self.session_dir.join(WORKFLOW_LOG);
        let mut log: WorkflowLog = read_or_default(&path)?;

        log.workflows.retain(|entry| entry.workflow != event.workflow);
        log.workflows.push(WorkflowEntry {
            workflow: event.workflow.clone(),
            status: event.status,
            timestamp: event.timestamp,
            artifacts_created: event.artifacts_created.clone(),
        });

        write_pretty(&path, &log)
    }

    fn append_error(&self, event: &WorkflowEvent) -> Result<(), SinkError> {
        let path = self.session_dir.join(ERROR_LOG);
        let mut log: ErrorLog = read_or_default(&path)?;

        log.errors.push(ErrorEntry {
            workflow: event.workflow.clone(),
            error_message: event.error_message.clone().unwrap_or_default(),
            timestamp: event.timestamp,
            status: "unresolved".to_string(),
        });

        write_pretty(&path, &log)
    }
}

impl EventSink for ArtifactLog {
    fn record(&self, event: &WorkflowEvent) -> Result<(), SinkError> {
        let _guard = self.lock.lock().map_err(|_| SinkError::Poisoned)?;
        fs::create_dir_all(&self.session_dir)?;

        self.update_workflows(event)?;
        if event.status == WorkflowStatus::Failed {
            self.append_error(event)?;
        }

        debug!(
            workflow = %event.workflow,
            status = ?event.status,
            dir = %self.session_dir.display(),
            "workflow event logged"
        );
        Ok(())
    }
}

fn read_or_default<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> Result<T, SinkError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

fn write_pretty<T: Serialize>(path: &Path, value: &T) -> Result<(), SinkError> {
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Keeps events in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<WorkflowEvent>>,
}

impl MemorySink {
    pub fn events(&self) -> Vec<WorkflowEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: &WorkflowEvent) -> Result<(), SinkError> {
        self.events
            .lock()
            .map_err(|_| SinkError::Poisoned)?
            .push(event.clone());
        Ok(())
    }
}
