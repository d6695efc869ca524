//! Coalescing cache for asynchronous rating jobs.
//!
//! The first request for a resource id creates a job and schedules exactly one
//! background computation. Every later request is a read of the job's current
//! state until the job fails, in which case the next request schedules a retry.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

use crate::upstream::{Rating, Upstream};

/// Observable state of a rating job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Accepted,
    InProgress,
    Completed(Rating),
    Failed(String),
}

impl JobStatus {
    fn rank(&self) -> u8 {
        match self {
            JobStatus::Accepted => 0,
            JobStatus::InProgress => 1,
            JobStatus::Completed(_) | JobStatus::Failed(_) => 2,
        }
    }

    /// Transitions only ever move forward.
    fn can_advance_to(&self, next: &JobStatus) -> bool {
        next.rank() > self.rank()
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, JobStatus::Failed(_))
    }
}

/// One enrichment computation for a resource id.
pub struct Job {
    resource_id: u64,
    attempt: u32,
    created_at: DateTime<Utc>,
    state: watch::Sender<JobStatus>,
}

impl Job {
    fn new(resource_id: u64, attempt: u32) -> Self {
        let (state, _) = watch::channel(JobStatus::Accepted);
        Self {
            resource_id,
            attempt,
            created_at: Utc::now(),
            state,
        }
    }

    pub fn resource_id(&self) -> u64 {
        self.resource_id
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> JobStatus {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.state.subscribe()
    }

    fn advance(&self, next: JobStatus) -> bool {
        self.state.send_if_modified(|current| {
            if current.can_advance_to(&next) {
                *current = next;
                true
            } else {
                false
            }
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub total: usize,
    pub accepted: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub computations_started: u64,
}

/// Rating jobs by resource id, retained for the lifetime of the process.
#[derive(Clone)]
pub struct JobCache {
    jobs: Arc<DashMap<u64, Arc<Job>>>,
    upstream: Arc<dyn Upstream>,
    computations_started: Arc<AtomicU64>,
}

impl JobCache {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self {
            jobs: Arc::new(DashMap::new()),
            upstream,
            computations_started: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Report the job for `id`, creating and scheduling it if needed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn request_job(&self, id: u64) -> JobStatus {
        // Creation and retry both happen under the entry's shard lock, so two
        // racing callers can never both schedule a computation.
        let job = match self.jobs.entry(id) {
            Entry::Occupied(mut entry) => {
                let status = entry.get().status();
                if !status.is_failed() {
                    return status;
                }
                let job = Arc::new(Job::new(id, entry.get().attempt + 1));
                entry.insert(job.clone());
                job
            }
            Entry::Vacant(entry) => {
                let job = Arc::new(Job::new(id, 1));
                entry.insert(job.clone());
                job
            }
        };

        tracing::info!(resource_id = id, attempt = job.attempt, "Rating job accepted");
        self.spawn_computation(job);

        JobStatus::Accepted
    }

    fn spawn_computation(&self, job: Arc<Job>) {
        let upstream = self.upstream.clone();
        self.computations_started.fetch_add(1, Ordering::SeqCst);

        tokio::spawn(async move {
            job.advance(JobStatus::InProgress);
            tracing::debug!(resource_id = job.resource_id, "Rating job started");

            let resource_id = job.resource_id;
            let computation =
                tokio::spawn(async move { upstream.genre_rating(resource_id).await });

            let next = match computation.await {
                Ok(Ok(rating)) => JobStatus::Completed(rating),
                Ok(Err(e)) => {
                    tracing::error!(resource_id, error = %e, "Rating job failed");
                    JobStatus::Failed(e.to_string())
                }
                Err(e) => {
                    tracing::error!(resource_id, error = %e, "Rating computation aborted");
                    JobStatus::Failed(format!("rating computation aborted: {}", e))
                }
            };

            if matches!(next, JobStatus::Completed(_)) {
                tracing::info!(
                    resource_id,
                    duration_secs = (Utc::now() - job.created_at).num_seconds(),
                    "Rating job completed"
                );
            }
            job.advance(next);
        });
    }

    /// Current status for `id` without scheduling anything
    pub fn status(&self, id: u64) -> Option<JobStatus> {
        self.jobs.get(&id).map(|job| job.status())
    }

    pub fn subscribe(&self, id: u64) -> Option<watch::Receiver<JobStatus>> {
        self.jobs.get(&id).map(|job| job.subscribe())
    }

    pub fn job(&self, id: u64) -> Option<Arc<Job>> {
        self.jobs.get(&id).map(|job| job.clone())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn stats(&self) -> JobStats {
        let mut stats = JobStats {
            computations_started: self.computations_started.load(Ordering::SeqCst),
            ..JobStats::default()
        };

        for job in self.jobs.iter() {
            stats.total += 1;
            match job.status() {
                JobStatus::Accepted => stats.accepted += 1,
                JobStatus::InProgress => stats.in_progress += 1,
                JobStatus::Completed(_) => stats.completed += 1,
                JobStatus::Failed(_) => stats.failed += 1,
            }
        }

        stats
    }
}
