/// Task status and the progress document polled by external observers
///
/// The progress document is fully replaced on every update, so a poller
/// either sees the previous state or the next one, never a mix.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a download task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    // ===== Active States =====
    /// Task accepted, total not yet known
    Starting,

    /// Sub-range resolved, chapters are being fetched
    Downloading,

    // ===== Terminal States =====
    /// Pool drained without a stop signal
    Completed,

    /// Unrecoverable error (catalog missing, exhaustion, timeout)
    Failed,

    /// External stop signal received, in-flight work drained
    Stopped,
}

impl TaskStatus {
    /// Returns true if no further transition is allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }

    /// Returns true if `next` is a legal successor of this status
    ///
    /// `starting -> downloading -> {completed | failed | stopped}`, plus
    /// `starting -> {failed | stopped}` for jobs that never dispatch.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match self {
            Self::Starting => matches!(next, Self::Downloading | Self::Failed | Self::Stopped),
            Self::Downloading => next.is_terminal(),
            Self::Completed | Self::Failed | Self::Stopped => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Progress document for one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressState {
    pub task_id: String,
    pub current: usize,
    pub total: usize,
    pub percentage: u8,
    pub status: TaskStatus,
    /// URLs of degraded chapters, in the order they were first seen
    pub failed_chapters: Vec<String>,
    /// Human-readable reason for a failed task
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProgressState {
    /// Fresh state for a task that has not resolved its range yet
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            current: 0,
            total: 0,
            percentage: 0,
            status: TaskStatus::Starting,
            failed_chapters: Vec::new(),
            message: None,
        }
    }

    /// Adds a failed chapter URL unless it is already listed
    pub fn push_failed(&mut self, url: &str) {
        if !self.failed_chapters.iter().any(|u| u == url) {
            self.failed_chapters.push(url.to_string());
        }
    }
}

/// ⌊current / total × 100⌋, or 0 when total is 0
pub fn compute_percentage(current: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let current = current.min(total) as u128;
    (current * 100 / total as u128) as u8
}
