//! Job state and progress emission.
//!
//! Persistence belongs to the job-queue collaborator; the core only emits
//! `(job_id, status, progress, error?)` updates through a [`ProgressSink`].
//! Progress is clamped to [0, 1] and forced monotonic here so replays and
//! out-of-order emission cannot walk a progress bar backwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Lifecycle states of an optimize job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Failed,
    Cancelled,
}

/// Snapshot persisted by the collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobState {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<String>,
}

impl JobState {
    pub fn new(job_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            status: JobStatus::Pending,
            progress: 0.0,
            error: None,
            created_at: now,
            updated_at: now,
            result_ref: None,
        }
    }

    /// Fresh job with a generated id.
    pub fn with_generated_id() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn apply(&mut self, update: &JobUpdate) {
        self.status = update.status;
        self.progress = self.progress.max(update.progress.clamp(0.0, 1.0));
        if update.error.is_some() {
            self.error = update.error.clone();
        }
        self.updated_at = Utc::now();
    }
}

/// One progress emission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobUpdate {
    pub job_id: String,
    pub status: JobStatus,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Where job updates go. Implemented by the queue collaborator; the
/// in-crate implementations cover tests and fire-and-forget CLI runs.
pub trait ProgressSink: Send + Sync {
    fn update(&self, update: JobUpdate);
}

/// Discards updates.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn update(&self, _update: JobUpdate) {}
}

/// Records updates in memory, enforcing monotonic progress.
#[derive(Debug, Default)]
pub struct MemorySink {
    updates: Mutex<Vec<JobUpdate>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<JobUpdate> {
        self.updates.lock().expect("sink poisoned").clone()
    }
}

impl ProgressSink for MemorySink {
    fn update(&self, mut update: JobUpdate) {
        let mut updates = self.updates.lock().expect("sink poisoned");
        let last = updates.last().map(|u| u.progress).unwrap_or(0.0);
        update.progress = update.progress.clamp(0.0, 1.0).max(last);
        updates.push(update);
    }
}

/// Helper that stamps a fixed job id onto updates and keeps progress
/// monotonic before forwarding to the real sink.
pub struct JobProgress<'a> {
    job_id: String,
    sink: &'a dyn ProgressSink,
    last: Mutex<f64>,
}

impl<'a> JobProgress<'a> {
    pub fn new(job_id: impl Into<String>, sink: &'a dyn ProgressSink) -> Self {
        Self {
            job_id: job_id.into(),
            sink,
            last: Mutex::new(0.0),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn emit(&self, status: JobStatus, progress: f64, error: Option<String>) {
        let mut last = self.last.lock().expect("progress poisoned");
        let progress = progress.clamp(0.0, 1.0).max(*last);
        *last = progress;
        self.sink.update(JobUpdate {
            job_id: self.job_id.clone(),
            status,
            progress,
            error,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_never_regresses() {
        let sink = MemorySink::new();
        let progress = JobProgress::new("job-1", &sink);
        progress.emit(JobStatus::Running, 0.4, None);
        progress.emit(JobStatus::Running, 0.2, None);
        progress.emit(JobStatus::Complete, 1.0, None);
        let updates = sink.updates();
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[1].progress, 0.4);
        assert_eq!(updates[2].progress, 1.0);
    }

    #[test]
    fn state_applies_updates_monotonically() {
        let mut state = JobState::new("job-2");
        state.apply(&JobUpdate {
            job_id: "job-2".into(),
            status: JobStatus::Running,
            progress: 0.7,
            error: None,
        });
        state.apply(&JobUpdate {
            job_id: "job-2".into(),
            status: JobStatus::Running,
            progress: 0.3,
            error: None,
        });
        assert_eq!(state.progress, 0.7);
        assert_eq!(state.status, JobStatus::Running);
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(
            JobState::with_generated_id().job_id,
            JobState::with_generated_id().job_id
        );
    }
}
