use std::collections::HashSet;

use analysis_core::{AnalysisError, Instrument, JointEntry};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of one analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// One entry per instrument in a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub symbol: String,
    pub name: String,
    pub state: JobState,
    pub retries: u8,
    pub last_attempt: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl AnalysisJob {
    fn new(instrument: Instrument) -> Self {
        Self {
            symbol: instrument.symbol,
            name: instrument.name,
            state: JobState::Pending,
            retries: 0,
            result: None,
            error: None,
            last_attempt: None,
        }
    }

    /// Failed with retries left but still inside its backoff window —
    /// the transient "waiting for retry" condition shown to callers.
    pub fn awaiting_retry(&self, now: DateTime<Utc>, backoff: Duration, max_retries: u8) -> bool {
        self.state == JobState::Failed
            && self.retries < max_retries
            && self.last_attempt.is_some_and(|t| now - t < backoff)
    }

    /// Completed, or failed with no retries left.
    pub fn is_settled(&self, max_retries: u8) -> bool {
        match self.state {
            JobState::Completed => true,
            JobState::Failed => self.retries >= max_retries,
            _ => false,
        }
    }
}

/// Insertion-ordered job list for one run. All state transitions funnel
/// through the `mark_*` operations.
#[derive(Debug, Clone)]
pub struct JobQueue {
    jobs: Vec<AnalysisJob>,
    max_retries: u8,
}

impl JobQueue {
    pub fn new(instruments: Vec<Instrument>, max_retries: u8) -> Result<Self, AnalysisError> {
        if instruments.is_empty() {
            return Err(AnalysisError::Config(
                "Cannot start a run without instruments".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut jobs = Vec::with_capacity(instruments.len());
        for instrument in instruments {
            if !seen.insert(instrument.symbol.clone()) {
                return Err(AnalysisError::Config(format!(
                    "Duplicate symbol in run: {}",
                    instrument.symbol
                )));
            }
            jobs.push(AnalysisJob::new(instrument));
        }

        Ok(Self { jobs, max_retries })
    }

    pub fn jobs(&self) -> &[AnalysisJob] {
        &self.jobs
    }

    pub fn max_retries(&self) -> u8 {
        self.max_retries
    }

    /// First job in insertion order that is ready for an attempt.
    /// Pending jobs qualify outright; failed jobs only with retries
    /// left and their own backoff elapsed — so a just-failed job never
    /// jumps ahead of an untried one reached earlier in the scan.
    pub fn next_eligible(&self, now: DateTime<Utc>, retry_backoff: Duration) -> Option<&AnalysisJob> {
        self.jobs.iter().find(|job| match job.state {
            JobState::Pending => true,
            JobState::Failed => {
                job.retries < self.max_retries
                    && job.last_attempt.is_none_or(|t| now - t >= retry_backoff)
            }
            _ => false,
        })
    }

    /// Earliest instant a currently-waiting failed job becomes
    /// retryable. `None` when nothing is waiting on its backoff.
    pub fn next_retry_at(&self, retry_backoff: Duration) -> Option<DateTime<Utc>> {
        self.jobs
            .iter()
            .filter(|job| job.state == JobState::Failed && job.retries < self.max_retries)
            .filter_map(|job| job.last_attempt)
            .map(|t| t + retry_backoff)
            .min()
    }

    /// True iff every job is completed or terminally failed.
    pub fn all_settled(&self) -> bool {
        self.jobs.iter().all(|job| job.is_settled(self.max_retries))
    }

    /// Completed jobs' reports, in insertion order, for the joint call.
    pub fn completed_entries(&self) -> Vec<JointEntry> {
        self.jobs
            .iter()
            .filter(|job| job.state == JobState::Completed)
            .map(|job| JointEntry {
                symbol: job.symbol.clone(),
                content: job.result.clone().unwrap_or_default(),
            })
            .collect()
    }

    pub fn mark_processing(
        &mut self,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Result<(), AnalysisError> {
        let job = self.job_mut(symbol)?;
        job.state = JobState::Processing;
        job.last_attempt = Some(now);
        Ok(())
    }

    pub fn mark_completed(&mut self, symbol: &str, result: String) -> Result<(), AnalysisError> {
        let job = self.job_mut(symbol)?;
        job.state = JobState::Completed;
        job.result = Some(result);
        job.error = None;
        Ok(())
    }

    pub fn mark_failed(
        &mut self,
        symbol: &str,
        error: String,
        now: DateTime<Utc>,
    ) -> Result<(), AnalysisError> {
        let job = self.job_mut(symbol)?;
        job.state = JobState::Failed;
        job.retries = job.retries.saturating_add(1);
        job.last_attempt = Some(now);
        job.error = Some(error);
        Ok(())
    }

    fn job_mut(&mut self, symbol: &str) -> Result<&mut AnalysisJob, AnalysisError> {
        self.jobs
            .iter_mut()
            .find(|job| job.symbol == symbol)
            .ok_or_else(|| AnalysisError::Config(format!("Unknown job: {symbol}")))
    }
}
