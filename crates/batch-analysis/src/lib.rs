//! The multi-asset sequential analysis pipeline: a job queue with
//! bounded retries, a single-flight cooldown-gated scheduler driving
//! one external analysis call per instrument, and the consolidated
//! multi-period ranking computed once the queue drains.

pub mod clock;
pub mod config;
pub mod queue;
pub mod ranking;
pub mod scheduler;
pub mod snapshot;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::BatchConfig;
pub use queue::{AnalysisJob, JobQueue, JobState};
pub use ranking::{multi_period_return, rank, MultiPeriodReturn, RankEntry, LEADERBOARD_SIZE, POINTS_TABLE};
pub use scheduler::{BatchScheduler, TickOutcome};
pub use snapshot::{JobView, RunPhase, RunSnapshot};
