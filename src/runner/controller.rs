use crate::client::RelationshipClient;
use crate::config::Config;
use crate::error::{ClientError, RunError};
use crate::model::{MutationKind, PageToken, RelationshipEntity, Tier};
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::cursor::PaginationCursor;
use super::limiter::{RateLimiter, WaitOutcome};
use super::progress::{Phase, ProgressTracker, RunState, RunStatus, RunUpdate};
use super::retry::{retry_with_policy, RetryFailure, RetryPolicy};

/// Knobs for one controller. Built from [`Config`] for a given kind.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub retry: RetryPolicy,
    pub limiter: RateLimiter,
    /// Fetch the next page once this many entities remain queued
    pub low_water_mark: usize,
    /// Deadline around every remote call
    pub request_timeout: Duration,
    /// Only enqueue entities of this tier
    pub tier_filter: Option<Tier>,
    pub max_entities: Option<usize>,
}

impl RunSettings {
    pub fn from_config(config: &Config, kind: MutationKind) -> Self {
        let tier_filter = match kind {
            MutationKind::Follow if config.follow.members_only => Some(Tier::Privileged),
            _ => None,
        };

        Self {
            retry: RetryPolicy::from_config(&config.retry),
            limiter: RateLimiter::from_config(&config.rate_limit(kind), config.tick_ms),
            low_water_mark: config.low_water_mark,
            request_timeout: config.request_timeout(),
            tier_filter,
            max_entities: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub kind: MutationKind,
    pub state: RunState,
    pub failed_entities: Vec<RelationshipEntity>,
    pub duration: Duration,
}

impl RunSummary {
    pub fn status(&self) -> RunStatus {
        self.state.status
    }
}

/// Drives one bulk follow/unfollow run at a time.
///
/// Entities are mutated strictly one after another with a randomized pause in
/// between; more pages are pulled in as the queue drains.
pub struct BulkRunController {
    client: Arc<dyn RelationshipClient>,
    settings: RunSettings,
    tracker: Arc<ProgressTracker>,
    running: AtomicBool,
    cancel: Mutex<CancellationToken>,
}

impl BulkRunController {
    pub fn new(client: Arc<dyn RelationshipClient>, settings: RunSettings) -> Self {
        Self {
            client,
            settings,
            tracker: Arc::new(ProgressTracker::new()),
            running: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn tracker(&self) -> Arc<ProgressTracker> {
        self.tracker.clone()
    }

    /// Request cooperative cancellation. An in-flight remote call finishes and
    /// is recorded; nothing new starts. The run itself publishes `Cancelling`.
    pub fn cancel(&self) {
        debug!("Cancellation requested");
        self.lock_cancel().cancel();
    }

    /// Run over `candidates` the caller already loaded, continuing with the
    /// pages that follow `next`.
    pub async fn start(
        &self,
        candidates: Vec<RelationshipEntity>,
        next: PageToken,
        kind: MutationKind,
    ) -> Result<RunSummary, RunError> {
        // Taken before the guard so a cancel() that sees this run is never lost.
        let token = self.fresh_token();
        let _guard = RunGuard::acquire(&self.running)?;
        let mut run = Run::new(self, kind, token, PaginationCursor::resume(next));
        let span = info_span!("run", run_id = %run.run_id, kind = %kind);

        if candidates.is_empty() {
            return Ok(run.finish(RunStatus::Completed, None));
        }
        run.enqueue(candidates);
        Ok(run.drive().instrument(span).await)
    }

    fn fresh_token(&self) -> CancellationToken {
        let mut token = self.lock_cancel();
        if token.is_cancelled() {
            *token = CancellationToken::new();
        }
        token.clone()
    }

    fn lock_cancel(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.cancel.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, RunError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| RunError::AlreadyRunning)?;
        Ok(Self(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

enum EntityOutcome {
    Done,
    Failed,
    Fatal(ClientError),
    Cancelled,
}

/// State private to one run.
struct Run<'a> {
    ctl: &'a BulkRunController,
    kind: MutationKind,
    run_id: Uuid,
    token: CancellationToken,
    queue: VecDeque<RelationshipEntity>,
    seen: HashSet<String>,
    cursor: PaginationCursor,
    total: usize,
    completed: usize,
    failed: usize,
    failed_entities: Vec<RelationshipEntity>,
    started: Instant,
}

impl<'a> Run<'a> {
    fn new(
        ctl: &'a BulkRunController,
        kind: MutationKind,
        token: CancellationToken,
        cursor: PaginationCursor,
    ) -> Self {
        let run_id = Uuid::new_v4();
        ctl.tracker.reset(run_id, 0);

        Self {
            ctl,
            kind,
            run_id,
            token,
            queue: VecDeque::new(),
            seen: HashSet::new(),
            cursor,
            total: 0,
            completed: 0,
            failed: 0,
            failed_entities: Vec::new(),
            started: Instant::now(),
        }
    }

    fn tracker(&self) -> &'a ProgressTracker {
        &self.ctl.tracker
    }

    fn settings(&self) -> &'a RunSettings {
        &self.ctl.settings
    }

    fn cap_reached(&self) -> bool {
        self.settings()
            .max_entities
            .map_or(false, |cap| self.total >= cap)
    }

    /// Append entities in fetch order, skipping ones already seen this run or
    /// filtered out by tier. Returns how many were added.
    fn enqueue(&mut self, entities: Vec<RelationshipEntity>) -> usize {
        let settings = self.settings();
        let mut added = 0;

        for entity in entities {
            if self.cap_reached() {
                break;
            }
            if settings.tier_filter.map_or(false, |tier| entity.tier != tier) {
                continue;
            }
            if !self.seen.insert(entity.id.clone()) {
                debug!("Skipping {} - already queued", entity.label());
                continue;
            }
            self.queue.push_back(entity);
            self.total += 1;
            added += 1;
        }
        if self.cap_reached() {
            self.cursor.finish();
        }

        self.tracker().update(RunUpdate {
            total: Some(self.total),
            ..RunUpdate::default()
        });
        added
    }

    async fn drive(mut self) -> RunSummary {
        info!("Starting bulk {}", self.kind);
        self.tracker().update(
            RunUpdate::message("Starting...")
                .status(RunStatus::Running)
                .phase(Phase::Mutating),
        );

        loop {
            if self.token.is_cancelled() {
                return self.stop();
            }

            if self.queue.len() <= self.settings().low_water_mark && self.cursor.has_more() {
                match self.fetch_next().await {
                    Ok(()) => continue,
                    Err(RetryFailure::Cancelled) => return self.stop(),
                    Err(failure) => {
                        let error = failure.error().map(ToString::to_string);
                        return self.finish(RunStatus::Failed, error);
                    }
                }
            }

            let Some(entity) = self.queue.pop_front() else {
                return self.finish(RunStatus::Completed, None);
            };

            match self.process(&entity).await {
                EntityOutcome::Done | EntityOutcome::Failed => {}
                EntityOutcome::Fatal(error) => {
                    return self.finish(RunStatus::Failed, Some(error.to_string()))
                }
                EntityOutcome::Cancelled => return self.stop(),
            }

            if !self.queue.is_empty() || self.cursor.has_more() {
                if self.pause().await == WaitOutcome::Cancelled {
                    return self.stop();
                }
            }
        }
    }

    async fn fetch_next(&mut self) -> Result<(), RetryFailure> {
        let ctl = self.ctl;
        let tracker = self.tracker();
        let settings = self.settings();
        let max_attempts = settings.retry.attempt().max_attempts;

        tracker.update(RunUpdate::message("Loading more users...").phase(Phase::Paginating));

        let cursor = self.cursor.take();
        debug!("Fetching page after {:?}", cursor);

        let fetch = retry_with_policy(
            &settings.retry,
            &self.token,
            |attempt, err| {
                tracker.update(RunUpdate {
                    message: Some(format!(
                        "Retrying page fetch ({}/{})…",
                        attempt.attempts + 1,
                        max_attempts
                    )),
                    last_error: Some(Some(err.to_string())),
                    ..RunUpdate::default()
                })
            },
            || with_deadline(settings.request_timeout, ctl.client.list_page(cursor.as_deref())),
        );
        let page = watch_cancel(&self.token, tracker, fetch)
            .await
            .map_err(|failure| {
                warn!("Page fetch failed: {:?}", failure);
                failure
            })?;

        if page.entities.is_empty() {
            self.cursor.finish();
        } else {
            self.cursor.advance(page.next);
        }

        let fetched = page.entities.len();
        let added = self.enqueue(page.entities);
        info!(
            "Fetched page: {} entities, {} queued, more: {}",
            fetched,
            added,
            self.cursor.has_more()
        );

        tracker.update(RunUpdate::default().phase(Phase::Mutating));
        Ok(())
    }

    async fn process(&mut self, entity: &RelationshipEntity) -> EntityOutcome {
        let ctl = self.ctl;
        let tracker = self.tracker();
        let settings = self.settings();
        let kind = self.kind;
        let label = entity.label();
        let max_attempts = settings.retry.attempt().max_attempts;

        tracker.update(RunUpdate {
            current_entity: Some(Some(entity.clone())),
            ..RunUpdate::message(format!("{} {}…", kind.progressive(), label)).phase(Phase::Mutating)
        });

        let attempts = retry_with_policy(
            &settings.retry,
            &self.token,
            |attempt, err| {
                tracker.update(RunUpdate {
                    message: Some(format!(
                        "Retrying {} ({}/{})…",
                        label,
                        attempt.attempts + 1,
                        max_attempts
                    )),
                    last_error: Some(Some(err.to_string())),
                    ..RunUpdate::default()
                })
            },
            || async move {
                match with_deadline(settings.request_timeout, ctl.client.mutate(entity, kind)).await
                {
                    Err(ClientError::Rejected(reason)) => {
                        debug!("{} already in requested state: {}", entity.id, reason);
                        Ok(())
                    }
                    other => other,
                }
            },
        );
        let result = watch_cancel(&self.token, tracker, attempts).await;

        match result {
            Ok(()) => {
                self.completed += 1;
                debug!(entity = %entity.id, "{} {} done", kind.progressive(), label);
                tracker.update(RunUpdate {
                    completed: Some(self.completed),
                    message: Some(format!("{} {} done", kind.progressive(), label)),
                    ..RunUpdate::default()
                });
                EntityOutcome::Done
            }
            Err(RetryFailure::Cancelled) => EntityOutcome::Cancelled,
            Err(failure) => {
                self.failed += 1;
                self.failed_entities.push(entity.clone());
                let error = failure.error().map(ToString::to_string);
                warn!(entity = %entity.id, "Failed to {} {}: {:?}", kind, label, error);
                tracker.update(RunUpdate {
                    failed: Some(self.failed),
                    last_error: Some(error),
                    message: Some(format!("Failed to {} {}", kind, label)),
                    ..RunUpdate::default()
                });

                match failure {
                    RetryFailure::Fatal(error) => EntityOutcome::Fatal(error),
                    _ => EntityOutcome::Failed,
                }
            }
        }
    }

    /// Randomized inter-entity wait with a live countdown.
    async fn pause(&self) -> WaitOutcome {
        let tracker = self.tracker();
        let limiter = &self.settings().limiter;
        let delay = limiter.next_delay();
        debug!("Waiting {:?} before next {}", delay, self.kind);

        tracker.update(RunUpdate::default().phase(Phase::Waiting));
        let outcome = limiter
            .await_with_countdown(delay, &self.token, |left| {
                tracker.update(RunUpdate {
                    next_action_in: Some(Some(left)),
                    ..RunUpdate::default()
                })
            })
            .await;
        tracker.update(RunUpdate {
            next_action_in: Some(None),
            ..RunUpdate::default()
        });
        outcome
    }

    fn stop(self) -> RunSummary {
        announce_stop(self.tracker());
        self.finish(RunStatus::Cancelled, None)
    }

    fn finish(self, status: RunStatus, error: Option<String>) -> RunSummary {
        let message = match status {
            RunStatus::Completed => "Completed!".to_string(),
            RunStatus::Cancelled => "Stopped".to_string(),
            _ => match &error {
                Some(e) => format!("Failed: {}", e),
                None => "Failed".to_string(),
            },
        };

        let mut update = RunUpdate {
            current_entity: Some(None),
            next_action_in: Some(None),
            ..RunUpdate::message(message).status(status).phase(Phase::Idle)
        };
        if error.is_some() {
            update.last_error = Some(error);
        }
        self.tracker().update(update);

        let state = self.tracker().snapshot();
        info!(
            "Run finished {}: {} done, {} failed, {} not attempted",
            status, state.completed, state.failed, state.remaining
        );

        RunSummary {
            run_id: self.run_id,
            kind: self.kind,
            state,
            failed_entities: self.failed_entities,
            duration: self.started.elapsed(),
        }
    }
}

/// Drive `call` to completion, publishing `Cancelling` as soon as `token`
/// fires. The call itself is never aborted.
async fn watch_cancel<F: Future>(
    token: &CancellationToken,
    tracker: &ProgressTracker,
    call: F,
) -> F::Output {
    tokio::pin!(call);
    tokio::select! {
        biased;
        out = &mut call => out,
        _ = token.cancelled() => {
            announce_stop(tracker);
            call.await
        }
    }
}

// Only the run task writes to the tracker, so this read-then-write is not racy.
fn announce_stop(tracker: &ProgressTracker) {
    if tracker.snapshot().status == RunStatus::Running {
        tracker.update(RunUpdate::message("Stopping…").status(RunStatus::Cancelling));
    }
}

async fn with_deadline<T, F>(limit: Duration, call: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(ClientError::Timeout(limit)))
}
