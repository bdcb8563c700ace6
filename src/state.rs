use crate::error::StateError;
use crate::model::MutationKind;
use crate::runner::{RunStatus, RunSummary};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const STATE_FILE: &str = "runs.json";

/// Last finished run per account and kind.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RunJournal {
    pub runs: HashMap<String, RunRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub last_run: DateTime<Utc>,
    pub status: String,
    pub completed: usize,
    pub failed: usize,
}

impl RunJournal {
    /// Load the journal, falling back to an empty one when missing or unreadable
    pub fn load(state_dir: &Path) -> Self {
        let path = Self::path(state_dir);
        match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, state_dir: &Path) -> Result<(), StateError> {
        let write_err = |source| StateError::Write {
            path: Self::path(state_dir),
            source,
        };
        fs::create_dir_all(state_dir).map_err(write_err)?;

        let json = serde_json::to_string_pretty(self)?;
        fs::write(Self::path(state_dir), json).map_err(write_err)
    }

    /// Most recent run for `account`/`kind` that is younger than `cooldown`.
    pub fn recent(&self, account: &str, kind: MutationKind, cooldown: Duration) -> Option<&RunRecord> {
        self.runs
            .get(&Self::key(account, kind))
            .filter(|record| Utc::now().signed_duration_since(record.last_run) < cooldown)
    }

    /// Record a finished run. Cancelled or failed runs with no progress are
    /// not kept so they don't block a retry.
    pub fn record(&mut self, account: &str, summary: &RunSummary) {
        let state = &summary.state;
        let stopped_early = matches!(state.status, RunStatus::Cancelled | RunStatus::Failed);
        if stopped_early && state.completed == 0 {
            return;
        }

        self.runs.insert(
            Self::key(account, summary.kind),
            RunRecord {
                last_run: Utc::now(),
                status: state.status.to_string(),
                completed: state.completed,
                failed: state.failed,
            },
        );
    }

    fn key(account: &str, kind: MutationKind) -> String {
        format!("{}:{}", account, kind)
    }

    fn path(state_dir: &Path) -> PathBuf {
        state_dir.join(STATE_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RunState;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn summary(kind: MutationKind, status: RunStatus, completed: usize) -> RunSummary {
        RunSummary {
            run_id: Uuid::new_v4(),
            kind,
            state: RunState {
                status,
                total: completed,
                completed,
                ..RunState::default()
            },
            failed_entities: Vec::new(),
            duration: std::time::Duration::from_secs(1),
        }
    }

    #[test]
    fn test_round_trip_and_cooldown() {
        let dir = TempDir::new().unwrap();
        let mut journal = RunJournal::load(dir.path());
        assert!(journal.runs.is_empty());

        journal.record("me", &summary(MutationKind::Unfollow, RunStatus::Completed, 12));
        journal.save(dir.path()).unwrap();

        let loaded = RunJournal::load(dir.path());
        let record = loaded
            .recent("me", MutationKind::Unfollow, Duration::hours(24))
            .unwrap();
        assert_eq!(record.completed, 12);
        assert_eq!(record.status, "completed");

        assert!(loaded
            .recent("me", MutationKind::Follow, Duration::hours(24))
            .is_none());
        assert!(loaded
            .recent("me", MutationKind::Unfollow, Duration::zero())
            .is_none());
    }

    #[test]
    fn test_empty_cancelled_run_not_recorded() {
        let mut journal = RunJournal::default();
        journal.record("me", &summary(MutationKind::Follow, RunStatus::Cancelled, 0));
        assert!(journal.runs.is_empty());
    }

    #[test]
    fn test_failed_run_recorded_only_with_progress() {
        let mut journal = RunJournal::default();
        journal.record("me", &summary(MutationKind::Unfollow, RunStatus::Failed, 0));
        assert!(journal
            .recent("me", MutationKind::Unfollow, Duration::hours(24))
            .is_none());

        journal.record("me", &summary(MutationKind::Unfollow, RunStatus::Failed, 5));
        let record = journal
            .recent("me", MutationKind::Unfollow, Duration::hours(24))
            .unwrap();
        assert_eq!(record.status, "failed");
        assert_eq!(record.completed, 5);
    }

    #[test]
    fn test_corrupt_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(STATE_FILE), "{not json").unwrap();
        assert!(RunJournal::load(dir.path()).runs.is_empty());
    }
}
