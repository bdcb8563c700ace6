use crate::model::RelationshipEntity;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::trace;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Cancelling,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Cancelled | RunStatus::Failed
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Idle => "idle",
            RunStatus::Running => "running",
            RunStatus::Cancelling => "cancelling",
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// What a running run is doing right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Paginating,
    Mutating,
    Waiting,
}

/// Snapshot pushed to subscribers on every change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunState {
    pub run_id: Option<Uuid>,
    pub status: RunStatus,
    pub phase: Phase,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub remaining: usize,
    pub current_entity: Option<RelationshipEntity>,
    pub last_error: Option<String>,
    pub message: String,
    pub next_action_in: Option<Duration>,
}

/// Partial update merged into the current [`RunState`]. `None` leaves a
/// field untouched.
#[derive(Debug, Clone, Default)]
pub struct RunUpdate {
    pub status: Option<RunStatus>,
    pub phase: Option<Phase>,
    pub total: Option<usize>,
    pub completed: Option<usize>,
    pub failed: Option<usize>,
    pub current_entity: Option<Option<RelationshipEntity>>,
    pub last_error: Option<Option<String>>,
    pub message: Option<String>,
    pub next_action_in: Option<Option<Duration>>,
}

impl RunUpdate {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn status(mut self, status: RunStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn phase(mut self, phase: Phase) -> Self {
        self.phase = Some(phase);
        self
    }
}

type Subscriber = Arc<dyn Fn(&RunState) + Send + Sync>;

/// Single source of truth for the live run, observed through push callbacks.
#[derive(Default)]
pub struct ProgressTracker {
    state: Mutex<RunState>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. It is called synchronously after every change.
    pub fn subscribe<F>(&self, f: F)
    where
        F: Fn(&RunState) + Send + Sync + 'static,
    {
        self.lock_subscribers().push(Arc::new(f));
    }

    pub fn snapshot(&self) -> RunState {
        self.lock_state().clone()
    }

    /// Reinitialize for a new run with `total` entities enqueued.
    pub fn reset(&self, run_id: Uuid, total: usize) {
        let snapshot = {
            let mut state = self.lock_state();
            *state = RunState {
                run_id: Some(run_id),
                total,
                remaining: total,
                ..RunState::default()
            };
            state.clone()
        };
        self.notify(&snapshot);
    }

    pub fn update(&self, patch: RunUpdate) {
        let snapshot = {
            let mut state = self.lock_state();
            merge(&mut state, patch);
            state.clone()
        };
        trace!(
            status = %snapshot.status,
            completed = snapshot.completed,
            failed = snapshot.failed,
            remaining = snapshot.remaining,
            "{}",
            snapshot.message
        );
        self.notify(&snapshot);
    }

    fn notify(&self, snapshot: &RunState) {
        // Cloned so a subscriber may itself trigger an update.
        let subscribers: Vec<Subscriber> = self.lock_subscribers().clone();
        for subscriber in subscribers {
            subscriber(snapshot);
        }
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn merge(state: &mut RunState, patch: RunUpdate) {
    if let Some(status) = patch.status {
        state.status = status;
    }
    if let Some(phase) = patch.phase {
        state.phase = phase;
    }
    if let Some(total) = patch.total {
        state.total = total;
    }
    if let Some(completed) = patch.completed {
        state.completed = completed;
    }
    if let Some(failed) = patch.failed {
        state.failed = failed;
    }
    if let Some(entity) = patch.current_entity {
        state.current_entity = entity;
    }
    if let Some(error) = patch.last_error {
        state.last_error = error;
    }
    if let Some(message) = patch.message {
        state.message = message;
    }
    if let Some(next) = patch.next_action_in {
        state.next_action_in = next;
    }

    debug_assert!(
        state.completed + state.failed <= state.total,
        "completed + failed exceeds total"
    );
    state.remaining = state
        .total
        .saturating_sub(state.completed + state.failed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_initializes_counts() {
        let tracker = ProgressTracker::new();
        tracker.reset(Uuid::new_v4(), 10);

        let state = tracker.snapshot();
        assert_eq!(state.total, 10);
        assert_eq!(state.remaining, 10);
        assert_eq!(state.status, RunStatus::Idle);
    }

    #[test]
    fn test_update_recomputes_remaining() {
        let tracker = ProgressTracker::new();
        tracker.reset(Uuid::new_v4(), 10);

        tracker.update(RunUpdate {
            completed: Some(4),
            failed: Some(1),
            ..RunUpdate::default()
        });

        let state = tracker.snapshot();
        assert_eq!(state.remaining, 5);
    }

    #[test]
    fn test_update_keeps_unset_fields() {
        let tracker = ProgressTracker::new();
        tracker.reset(Uuid::new_v4(), 3);
        tracker.update(RunUpdate {
            last_error: Some(Some("boom".into())),
            ..RunUpdate::default()
        });
        tracker.update(RunUpdate::message("Unfollowing @x…").status(RunStatus::Running));

        let state = tracker.snapshot();
        assert_eq!(state.last_error.as_deref(), Some("boom"));
        assert_eq!(state.message, "Unfollowing @x…");
        assert_eq!(state.status, RunStatus::Running);
    }

    #[test]
    fn test_subscribers_receive_every_change() {
        let tracker = ProgressTracker::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        tracker.subscribe(move |state| sink.lock().unwrap().push(state.remaining));

        tracker.reset(Uuid::new_v4(), 2);
        tracker.update(RunUpdate {
            completed: Some(1),
            ..RunUpdate::default()
        });
        tracker.update(RunUpdate {
            completed: Some(2),
            ..RunUpdate::default()
        });

        assert_eq!(*seen.lock().unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn test_subscriber_may_update_reentrantly() {
        let tracker = Arc::new(ProgressTracker::new());
        let inner = Arc::downgrade(&tracker);
        tracker.subscribe(move |state| {
            if state.status == RunStatus::Cancelling {
                if let Some(tracker) = inner.upgrade() {
                    tracker.update(RunUpdate::default().status(RunStatus::Cancelled));
                }
            }
        });

        tracker.update(RunUpdate::default().status(RunStatus::Cancelling));
        assert_eq!(tracker.snapshot().status, RunStatus::Cancelled);
    }
}
