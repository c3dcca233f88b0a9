use ai_client::JointReport;
use serde::{Deserialize, Serialize};

use crate::queue::JobState;
use crate::ranking::RankEntry;

/// Overall state of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// No run has been started.
    Idle,
    /// Jobs are being driven to completion.
    Running,
    /// All jobs settled; leaderboard (and joint report, when any job
    /// completed) are available.
    Completed,
    /// All jobs settled but the joint-analysis call itself failed.
    JointFailed,
}

/// Read-only view of one job for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub symbol: String,
    pub name: String,
    pub state: JobState,
    pub retries: u8,
    /// Failed with retries left, still waiting out its backoff window.
    pub awaiting_retry: bool,
    pub result: Option<String>,
    pub error: Option<String>,
}

/// Point-in-time view of a run. Always renderable: partial leaderboards
/// and failed jobs are normal outcomes, not exceptional ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub phase: RunPhase,
    pub jobs: Vec<JobView>,
    pub cooldown_seconds_remaining: u64,
    pub leaderboard: Vec<RankEntry>,
    pub joint: Option<JointReport>,
}

impl RunSnapshot {
    pub fn completed_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|job| job.state == JobState::Completed)
            .count()
    }

    pub fn failed_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|job| job.state == JobState::Failed)
            .count()
    }
}
