//! Progress tracker
//!
//! Owned by the single loop that consumes pool records, which makes that
//! loop the one serialization point for progress updates. Every change is
//! published as a full replacement of the task's progress document.

use crate::state::{compute_percentage, ChapterRecord, ProgressState, TaskStatus};
use crate::storage::ProgressPublisher;
use std::sync::Arc;

pub struct ProgressTracker<P: ProgressPublisher + ?Sized> {
    state: ProgressState,
    publisher: Arc<P>,
}

impl<P: ProgressPublisher + ?Sized> ProgressTracker<P> {
    /// Creates a tracker in `starting` and publishes it
    pub fn new(task_id: impl Into<String>, publisher: Arc<P>) -> Self {
        let tracker = Self {
            state: ProgressState::new(task_id),
            publisher,
        };
        tracker.publish();
        tracker
    }

    pub fn state(&self) -> &ProgressState {
        &self.state
    }

    pub fn into_state(self) -> ProgressState {
        self.state
    }

    /// Sub-range resolved: `starting -> downloading`
    pub fn begin(&mut self, total: usize) {
        if !self.transition(TaskStatus::Downloading) {
            return;
        }
        self.state.total = total;
        self.state.current = 0;
        self.state.percentage = 0;
        self.publish();
    }

    /// Counts one emitted record
    pub fn record(&mut self, record: &ChapterRecord) {
        if self.state.status != TaskStatus::Downloading {
            tracing::debug!(
                task_id = %self.state.task_id,
                "Ignoring record {} in status {}",
                record.index,
                self.state.status
            );
            return;
        }

        self.state.current = (self.state.current + 1).min(self.state.total);
        self.state.percentage = compute_percentage(self.state.current, self.state.total);
        if record.is_degraded() {
            self.state.push_failed(&record.url);
        }

        tracing::info!(
            task_id = %self.state.task_id,
            index = record.index,
            "Progress {}/{} ({}%)",
            self.state.current,
            self.state.total,
            self.state.percentage
        );
        self.publish();
    }

    /// Pool drained without a stop signal
    pub fn complete(&mut self) {
        if self.transition(TaskStatus::Completed) {
            self.publish();
        }
    }

    /// External stop signal honored
    pub fn stop(&mut self) {
        if self.transition(TaskStatus::Stopped) {
            self.publish();
        }
    }

    /// Unrecoverable error
    pub fn fail(&mut self, reason: &str) {
        if self.transition(TaskStatus::Failed) {
            self.state.message = Some(reason.to_string());
            self.publish();
        }
    }

    fn transition(&mut self, next: TaskStatus) -> bool {
        let current = self.state.status;
        if !current.can_transition_to(next) {
            tracing::debug!(
                task_id = %self.state.task_id,
                "Ignoring transition {} -> {}",
                current,
                next
            );
            return false;
        }

        tracing::info!(task_id = %self.state.task_id, "Task {} -> {}", current, next);
        self.state.status = next;
        true
    }

    fn publish(&self) {
        if let Err(e) = self.publisher.publish(&self.state) {
            tracing::warn!(
                task_id = %self.state.task_id,
                "Failed to publish progress: {}",
                e
            );
        }
    }
}
