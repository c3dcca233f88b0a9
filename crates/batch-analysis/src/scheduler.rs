use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ai_client::parse_joint_response;
use ai_client::JointReport;
use analysis_core::{
    AnalysisError, HistoryRange, Instrument, JointEntry, MarketDataProvider, NarrativeProvider,
};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::config::BatchConfig;
use crate::queue::{JobQueue, JobState};
use crate::ranking::{self, MultiPeriodReturn, RankEntry};
use crate::snapshot::{JobView, RunPhase, RunSnapshot};

/// What one tick of the drive loop did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No active run to drive.
    Idle,
    /// A call is already in flight — this tick was a no-op.
    Busy,
    /// Waited out (part of) the post-call cooldown.
    CooldownWait,
    /// No job eligible yet; waited for the next retry window.
    RetryWait,
    /// Dispatched exactly one analysis call.
    Dispatched { symbol: String, completed: bool },
    /// All jobs settled and the joint call was issued.
    Aggregated,
    /// All jobs settled with nothing to aggregate.
    Finished,
    /// The run was restarted while this tick was underway.
    Stale,
}

enum WaitKind {
    Cooldown,
    Retry,
}

enum Action {
    Wait(Duration, WaitKind),
    Dispatch { symbol: String },
    Aggregate { entries: Vec<JointEntry> },
    Finish,
}

/// Mutable state of the current run. Owned by the scheduler; the
/// display layer only ever reads snapshots.
struct RunState {
    /// Bumped on every restart. External-call responses carrying a
    /// stale generation are discarded, so a late response can never
    /// resurrect a job of a dead run.
    generation: u64,
    phase: RunPhase,
    queue: Option<JobQueue>,
    cooldown_until: Option<DateTime<Utc>>,
    in_flight: bool,
    performances: HashMap<String, MultiPeriodReturn>,
    leaderboard: Vec<RankEntry>,
    joint: Option<JointReport>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            generation: 0,
            phase: RunPhase::Idle,
            queue: None,
            cooldown_until: None,
            in_flight: false,
            performances: HashMap::new(),
            leaderboard: Vec::new(),
            joint: None,
        }
    }
}

/// Single-flight, cooldown-gated driver for a batch of per-instrument
/// analysis jobs. At most one external call is in flight at any
/// instant; a fixed cooldown follows every call regardless of outcome.
#[derive(Clone)]
pub struct BatchScheduler {
    market_data: Arc<dyn MarketDataProvider>,
    narrative: Arc<dyn NarrativeProvider>,
    clock: Arc<dyn Clock>,
    config: BatchConfig,
    state: Arc<Mutex<RunState>>,
}

impl BatchScheduler {
    pub fn new(
        market_data: Arc<dyn MarketDataProvider>,
        narrative: Arc<dyn NarrativeProvider>,
        config: BatchConfig,
    ) -> Self {
        Self {
            market_data,
            narrative,
            clock: Arc::new(SystemClock),
            config,
            state: Arc::new(Mutex::new(RunState::default())),
        }
    }

    /// Swap the time source (manual clock in tests).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Reset all run state and start a fresh run over `instruments`.
    /// Idempotent: starting while a run is active abandons it — any
    /// response still in flight for the old run is discarded when it
    /// lands. Fails fast on an empty instrument list.
    pub async fn start_run(&self, instruments: Vec<Instrument>) -> Result<u64, AnalysisError> {
        let queue = JobQueue::new(instruments, self.config.max_retries)?;
        let mut state = self.state.lock().await;

        state.generation += 1;
        state.phase = RunPhase::Running;
        state.cooldown_until = None;
        state.in_flight = false;
        state.performances.clear();
        state.leaderboard.clear();
        state.joint = None;

        tracing::info!(
            "Run {} started with {} instruments",
            state.generation,
            queue.jobs().len()
        );
        state.queue = Some(queue);
        Ok(state.generation)
    }

    /// Drive the current run by one step. Safe to call from several
    /// tasks: ticks that land while a call is in flight are no-ops.
    pub async fn tick(&self) -> TickOutcome {
        let generation = self.state.lock().await.generation;
        self.step(generation).await
    }

    /// Drive the current run until it settles, then report the phase.
    pub async fn run_to_completion(&self) -> RunPhase {
        let generation = self.state.lock().await.generation;
        loop {
            match self.step(generation).await {
                TickOutcome::Idle
                | TickOutcome::Stale
                | TickOutcome::Aggregated
                | TickOutcome::Finished => break,
                TickOutcome::Busy => {
                    // Another driver owns the in-flight call.
                    self.clock.sleep(Duration::from_millis(100)).await;
                }
                _ => {}
            }
        }
        self.state.lock().await.phase
    }

    /// Start a run and drive it to its end.
    pub async fn run(&self, instruments: Vec<Instrument>) -> Result<RunSnapshot, AnalysisError> {
        self.start_run(instruments).await?;
        self.run_to_completion().await;
        Ok(self.snapshot().await)
    }

    /// Read-only view of the run, always renderable.
    pub async fn snapshot(&self) -> RunSnapshot {
        let state = self.state.lock().await;
        let now = self.clock.now();
        let backoff = ChronoDuration::seconds(self.config.retry_backoff_secs as i64);

        let cooldown_seconds_remaining = state
            .cooldown_until
            .filter(|until| *until > now)
            .map(|until| (until - now).num_seconds().max(0) as u64)
            .unwrap_or(0);

        let jobs = state
            .queue
            .as_ref()
            .map(|queue| {
                queue
                    .jobs()
                    .iter()
                    .map(|job| JobView {
                        symbol: job.symbol.clone(),
                        name: job.name.clone(),
                        state: job.state,
                        retries: job.retries,
                        awaiting_retry: job.awaiting_retry(now, backoff, queue.max_retries()),
                        result: job.result.clone(),
                        error: job.error.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        RunSnapshot {
            phase: state.phase,
            jobs,
            cooldown_seconds_remaining,
            leaderboard: state.leaderboard.clone(),
            joint: state.joint.clone(),
        }
    }

    /// One step of the drive loop for a specific run generation.
    async fn step(&self, generation: u64) -> TickOutcome {
        let backoff = ChronoDuration::seconds(self.config.retry_backoff_secs as i64);

        let action = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            if state.generation != generation {
                return TickOutcome::Stale;
            }
            if state.phase != RunPhase::Running {
                return TickOutcome::Idle;
            }
            if state.in_flight {
                return TickOutcome::Busy;
            }

            let Some(queue) = state.queue.as_mut() else {
                return TickOutcome::Idle;
            };

            let now = self.clock.now();
            if let Some(remaining) = state
                .cooldown_until
                .filter(|until| *until > now)
                .map(|until| until - now)
            {
                Action::Wait(
                    remaining.to_std().unwrap_or(Duration::from_secs(1)),
                    WaitKind::Cooldown,
                )
            } else if let Some(symbol) = queue.next_eligible(now, backoff).map(|j| j.symbol.clone())
            {
                if let Err(e) = queue.mark_processing(&symbol, now) {
                    tracing::error!("Could not mark {} as processing: {}", symbol, e);
                    return TickOutcome::Idle;
                }
                state.in_flight = true;
                Action::Dispatch { symbol }
            } else if queue.all_settled() {
                let entries = queue.completed_entries();
                if entries.is_empty() {
                    tracing::info!("Run {} finished with no completed jobs", generation);
                    state.phase = RunPhase::Completed;
                    Action::Finish
                } else {
                    // The leaderboard is computed before the joint call
                    // so it survives a joint failure.
                    let ordered: Vec<(String, MultiPeriodReturn)> = queue
                        .jobs()
                        .iter()
                        .filter(|job| job.state == JobState::Completed)
                        .map(|job| {
                            let returns = state
                                .performances
                                .get(&job.symbol)
                                .copied()
                                .unwrap_or_default();
                            (job.symbol.clone(), returns)
                        })
                        .collect();
                    state.leaderboard = ranking::rank(&ordered);
                    state.in_flight = true;
                    Action::Aggregate { entries }
                }
            } else {
                // Jobs are waiting out their retry windows.
                let wait = queue
                    .next_retry_at(backoff)
                    .filter(|at| *at > now)
                    .map(|at| (at - now).to_std().unwrap_or(Duration::from_secs(1)))
                    .unwrap_or(Duration::from_secs(1));
                Action::Wait(wait, WaitKind::Retry)
            }
        };

        match action {
            Action::Wait(duration, kind) => {
                self.clock.sleep(duration).await;
                match kind {
                    WaitKind::Cooldown => TickOutcome::CooldownWait,
                    WaitKind::Retry => TickOutcome::RetryWait,
                }
            }
            Action::Dispatch { symbol } => self.dispatch(generation, symbol).await,
            Action::Aggregate { entries } => self.aggregate(generation, entries).await,
            Action::Finish => TickOutcome::Finished,
        }
    }

    /// Issue the single analysis call for one job and record its
    /// outcome. The cooldown is reset after every attempt — it guards
    /// the provider's rate limit, not errors.
    async fn dispatch(&self, generation: u64, symbol: String) -> TickOutcome {
        tracing::info!("Dispatching analysis for {}", symbol);
        let result = self
            .narrative
            .request_narrative(&symbol, self.config.analysis_kind)
            .await;
        let completed = result.is_ok();

        {
            let mut state = self.state.lock().await;
            if state.generation != generation {
                tracing::debug!(
                    "Discarding response for {} from a restarted run",
                    symbol
                );
                return TickOutcome::Stale;
            }

            let now = self.clock.now();
            state.cooldown_until =
                Some(now + ChronoDuration::seconds(self.config.call_cooldown_secs as i64));
            state.in_flight = false;

            let Some(queue) = state.queue.as_mut() else {
                return TickOutcome::Idle;
            };
            let outcome = match &result {
                Ok(text) => {
                    tracing::info!("Analysis completed for {}", symbol);
                    queue.mark_completed(&symbol, text.clone())
                }
                Err(e) => {
                    tracing::warn!("Analysis failed for {}: {}", symbol, e);
                    queue.mark_failed(&symbol, e.to_string(), now)
                }
            };
            if let Err(e) = outcome {
                tracing::error!("Could not record outcome for {}: {}", symbol, e);
            }
        }

        if completed {
            self.collect_performance(generation, &symbol).await;
        }

        TickOutcome::Dispatched { symbol, completed }
    }

    /// Fetch the completed job's price history and derive its
    /// multi-period return for the ranking. A missing series
    /// contributes zero — it never disqualifies the instrument.
    async fn collect_performance(&self, generation: u64, symbol: &str) {
        let returns = match self
            .market_data
            .fetch_price_series(symbol, HistoryRange::OneYear)
            .await
        {
            Ok(series) => {
                ranking::multi_period_return(&series, self.config.ranking_notional, self.clock.now())
            }
            Err(e) => {
                tracing::warn!(
                    "Price series unavailable for {}; ranking contribution is zero: {}",
                    symbol,
                    e
                );
                MultiPeriodReturn::default()
            }
        };

        let mut state = self.state.lock().await;
        if state.generation == generation {
            state.performances.insert(symbol.to_string(), returns);
        }
    }

    /// Issue the one joint-analysis call over all completed reports.
    async fn aggregate(&self, generation: u64, entries: Vec<JointEntry>) -> TickOutcome {
        tracing::info!("Aggregating {} completed reports", entries.len());
        let result = self.narrative.request_joint(&entries).await;

        let mut state = self.state.lock().await;
        if state.generation != generation {
            tracing::debug!("Discarding joint response from a restarted run");
            return TickOutcome::Stale;
        }
        state.in_flight = false;

        match result {
            Ok(text) => {
                state.joint = Some(parse_joint_response(&text));
                state.phase = RunPhase::Completed;
                tracing::info!("Run {} completed", generation);
            }
            Err(e) => {
                // Nothing further to attempt: the run ends failed, but
                // the leaderboard and per-job reports stay readable.
                state.phase = RunPhase::JointFailed;
                tracing::error!("Joint analysis failed, run {} ends: {}", generation, e);
            }
        }

        TickOutcome::Aggregated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use analysis_core::{AnalysisKind, PricePoint};
    use chrono::TimeZone;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn instrument(symbol: &str) -> Instrument {
        Instrument::new(symbol, format!("{symbol} SA"))
    }

    /// A year of flat prices ending ten percent up last month.
    fn growth_series(now: DateTime<Utc>) -> Vec<PricePoint> {
        [(400, 100), (200, 100), (35, 100), (1, 110)]
            .into_iter()
            .map(|(days_ago, close)| PricePoint {
                date: now - ChronoDuration::days(days_ago),
                close: rust_decimal::Decimal::from(close),
                dividend: None,
            })
            .collect()
    }

    struct StaticMarket {
        series: Vec<PricePoint>,
    }

    #[async_trait::async_trait]
    impl MarketDataProvider for StaticMarket {
        async fn fetch_price_series(
            &self,
            _symbol: &str,
            _range: HistoryRange,
        ) -> Result<Vec<PricePoint>, AnalysisError> {
            if self.series.is_empty() {
                Err(AnalysisError::NotFound("no data".to_string()))
            } else {
                Ok(self.series.clone())
            }
        }
    }

    /// Scripted narrative provider: per-symbol reply queues, call
    /// recording, optional gate to hold a call in flight.
    struct ScriptedNarrative {
        replies: StdMutex<HashMap<String, VecDeque<Result<String, String>>>>,
        calls: StdMutex<Vec<String>>,
        joint_calls: StdMutex<Vec<Vec<JointEntry>>>,
        joint_reply: Result<String, String>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedNarrative {
        fn new() -> Self {
            Self {
                replies: StdMutex::new(HashMap::new()),
                calls: StdMutex::new(Vec::new()),
                joint_calls: StdMutex::new(Vec::new()),
                joint_reply: Ok("Portfolio looks balanced.".to_string()),
                gate: None,
            }
        }

        fn script(self, symbol: &str, replies: Vec<Result<&str, &str>>) -> Self {
            let owned = replies
                .into_iter()
                .map(|r| r.map(str::to_string).map_err(str::to_string))
                .collect();
            self.replies
                .lock()
                .unwrap()
                .insert(symbol.to_string(), owned);
            self
        }

        fn with_joint_reply(mut self, reply: Result<&str, &str>) -> Self {
            self.joint_reply = reply.map(str::to_string).map_err(str::to_string);
            self
        }

        fn with_gate(mut self, gate: Arc<Notify>) -> Self {
            self.gate = Some(gate);
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn joint_calls(&self) -> Vec<Vec<JointEntry>> {
            self.joint_calls.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl NarrativeProvider for ScriptedNarrative {
        async fn request_narrative(
            &self,
            symbol: &str,
            _kind: AnalysisKind,
        ) -> Result<String, AnalysisError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.calls.lock().unwrap().push(symbol.to_string());
            let reply = self
                .replies
                .lock()
                .unwrap()
                .get_mut(symbol)
                .and_then(|queue| queue.pop_front())
                .unwrap_or_else(|| Ok(format!("report for {symbol}")));
            reply.map_err(AnalysisError::Upstream)
        }

        async fn request_joint(
            &self,
            entries: &[JointEntry],
        ) -> Result<String, AnalysisError> {
            self.joint_calls.lock().unwrap().push(entries.to_vec());
            self.joint_reply.clone().map_err(AnalysisError::Upstream)
        }
    }

    fn scheduler(
        narrative: Arc<ScriptedNarrative>,
        market: Arc<StaticMarket>,
        clock: Arc<ManualClock>,
    ) -> BatchScheduler {
        BatchScheduler::new(market, narrative, BatchConfig::default()).with_clock(clock)
    }

    #[tokio::test]
    async fn run_completes_with_one_retry_and_a_single_joint_call() {
        let clock = Arc::new(ManualClock::new(t0()));
        let market = Arc::new(StaticMarket {
            series: growth_series(t0()),
        });
        let narrative = Arc::new(
            ScriptedNarrative::new()
                .script("PETR4", vec![Ok("report A")])
                .script("VALE3", vec![Err("upstream hiccup"), Ok("report B")])
                .with_joint_reply(Ok(
                    "Strategy summary\n### JSON_DATA_START\n[{\"symbol\":\"PETR4\",\"signal\":\"BUY\",\"score\":8}]\n### JSON_DATA_END",
                )),
        );
        let scheduler = scheduler(narrative.clone(), market, clock);

        let snapshot = scheduler
            .run(vec![instrument("PETR4"), instrument("VALE3")])
            .await
            .unwrap();

        assert_eq!(snapshot.phase, RunPhase::Completed);
        assert_eq!(snapshot.jobs[0].state, JobState::Completed);
        assert_eq!(snapshot.jobs[0].retries, 0);
        assert_eq!(snapshot.jobs[1].state, JobState::Completed);
        assert_eq!(snapshot.jobs[1].retries, 1);

        // First attempts in insertion order, then the one retry.
        assert_eq!(narrative.calls(), ["PETR4", "VALE3", "VALE3"]);

        // Exactly one joint call, with both reports in insertion order.
        let joint_calls = narrative.joint_calls();
        assert_eq!(joint_calls.len(), 1);
        let symbols: Vec<&str> = joint_calls[0].iter().map(|e| e.symbol.as_str()).collect();
        assert_eq!(symbols, ["PETR4", "VALE3"]);

        let joint = snapshot.joint.unwrap();
        assert_eq!(joint.narrative(), "Strategy summary");
        assert_eq!(joint.ranking().len(), 1);

        // Identical series tie on returns: insertion order breaks it.
        assert_eq!(snapshot.leaderboard[0].symbol, "PETR4");
        assert_eq!(snapshot.leaderboard[0].score, 45);
        assert_eq!(snapshot.leaderboard[1].symbol, "VALE3");
        assert_eq!(snapshot.leaderboard[1].score, 36);
    }

    #[tokio::test]
    async fn exhausted_retries_end_the_run_without_aggregation() {
        let clock = Arc::new(ManualClock::new(t0()));
        let market = Arc::new(StaticMarket {
            series: growth_series(t0()),
        });
        let narrative = Arc::new(
            ScriptedNarrative::new().script("PETR4", vec![Err("down"), Err("still down")]),
        );
        let scheduler = scheduler(narrative.clone(), market, clock);

        let snapshot = scheduler.run(vec![instrument("PETR4")]).await.unwrap();

        assert_eq!(snapshot.phase, RunPhase::Completed);
        assert_eq!(snapshot.jobs[0].state, JobState::Failed);
        assert_eq!(snapshot.jobs[0].retries, 2);
        assert!(!snapshot.jobs[0].awaiting_retry);
        assert!(snapshot.leaderboard.is_empty());
        assert!(snapshot.joint.is_none());
        assert!(narrative.joint_calls().is_empty());
        assert_eq!(narrative.calls().len(), 2);
    }

    #[tokio::test]
    async fn cooldown_follows_a_failed_attempt_too() {
        let clock = Arc::new(ManualClock::new(t0()));
        let market = Arc::new(StaticMarket {
            series: growth_series(t0()),
        });
        let narrative =
            Arc::new(ScriptedNarrative::new().script("PETR4", vec![Err("boom"), Ok("ok")]));
        let scheduler = scheduler(narrative, market, clock.clone());

        scheduler.start_run(vec![instrument("PETR4")]).await.unwrap();
        let outcome = scheduler.tick().await;
        assert_eq!(
            outcome,
            TickOutcome::Dispatched {
                symbol: "PETR4".to_string(),
                completed: false,
            }
        );

        let snapshot = scheduler.snapshot().await;
        assert_eq!(snapshot.cooldown_seconds_remaining, 30);
        assert!(snapshot.jobs[0].awaiting_retry);

        // The countdown tracks the clock.
        clock.advance(Duration::from_secs(10));
        let snapshot = scheduler.snapshot().await;
        assert_eq!(snapshot.cooldown_seconds_remaining, 20);
    }

    #[tokio::test]
    async fn ticks_during_an_in_flight_call_are_no_ops() {
        let clock = Arc::new(ManualClock::new(t0()));
        let market = Arc::new(StaticMarket {
            series: growth_series(t0()),
        });
        let gate = Arc::new(Notify::new());
        let narrative = Arc::new(ScriptedNarrative::new().with_gate(gate.clone()));
        let scheduler = scheduler(narrative, market, clock);

        scheduler
            .start_run(vec![instrument("PETR4"), instrument("VALE3")])
            .await
            .unwrap();

        let driver = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.tick().await })
        };

        // Wait for the driver to take the in-flight slot.
        let mut processing = 0;
        for _ in 0..1000 {
            let snapshot = scheduler.snapshot().await;
            processing = snapshot
                .jobs
                .iter()
                .filter(|j| j.state == JobState::Processing)
                .count();
            if processing == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(processing, 1);

        // Any tick fired during the in-flight call must be a no-op.
        assert_eq!(scheduler.tick().await, TickOutcome::Busy);
        let snapshot = scheduler.snapshot().await;
        let still_processing = snapshot
            .jobs
            .iter()
            .filter(|j| j.state == JobState::Processing)
            .count();
        assert_eq!(still_processing, 1);

        gate.notify_one();
        let outcome = driver.await.unwrap();
        assert_eq!(
            outcome,
            TickOutcome::Dispatched {
                symbol: "PETR4".to_string(),
                completed: true,
            }
        );
    }

    #[tokio::test]
    async fn restart_discards_the_stale_in_flight_response() {
        let clock = Arc::new(ManualClock::new(t0()));
        let market = Arc::new(StaticMarket {
            series: growth_series(t0()),
        });
        let gate = Arc::new(Notify::new());
        let narrative = Arc::new(ScriptedNarrative::new().with_gate(gate.clone()));
        let scheduler = scheduler(narrative, market, clock);

        scheduler.start_run(vec![instrument("PETR4")]).await.unwrap();

        let driver = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.tick().await })
        };

        let mut in_flight = false;
        for _ in 0..1000 {
            let snapshot = scheduler.snapshot().await;
            if snapshot.jobs[0].state == JobState::Processing {
                in_flight = true;
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(in_flight);

        // Restart while the old call is still out.
        scheduler.start_run(vec![instrument("PETR4")]).await.unwrap();
        gate.notify_one();

        assert_eq!(driver.await.unwrap(), TickOutcome::Stale);

        // The late response must not resurrect the new run's job.
        let snapshot = scheduler.snapshot().await;
        assert_eq!(snapshot.jobs[0].state, JobState::Pending);
        assert_eq!(snapshot.cooldown_seconds_remaining, 0);
    }

    #[tokio::test]
    async fn joint_failure_is_a_distinct_terminal_state() {
        let clock = Arc::new(ManualClock::new(t0()));
        let market = Arc::new(StaticMarket {
            series: growth_series(t0()),
        });
        let narrative = Arc::new(
            ScriptedNarrative::new()
                .script("PETR4", vec![Ok("report A")])
                .with_joint_reply(Err("summarizer is down")),
        );
        let scheduler = scheduler(narrative, market, clock);

        let snapshot = scheduler.run(vec![instrument("PETR4")]).await.unwrap();

        assert_eq!(snapshot.phase, RunPhase::JointFailed);
        assert!(snapshot.joint.is_none());
        // The leaderboard survives the failed aggregation.
        assert_eq!(snapshot.leaderboard.len(), 1);
        assert_eq!(snapshot.leaderboard[0].symbol, "PETR4");
    }

    #[tokio::test]
    async fn missing_price_series_contributes_zero_but_never_disqualifies() {
        let clock = Arc::new(ManualClock::new(t0()));
        let market = Arc::new(StaticMarket { series: Vec::new() });
        let narrative = Arc::new(ScriptedNarrative::new());
        let scheduler = scheduler(narrative, market, clock);

        let snapshot = scheduler.run(vec![instrument("PETR4")]).await.unwrap();

        assert_eq!(snapshot.phase, RunPhase::Completed);
        assert_eq!(snapshot.leaderboard.len(), 1);
        assert_eq!(snapshot.leaderboard[0].score, 45);
        assert_eq!(snapshot.leaderboard[0].returns, MultiPeriodReturn::default());
    }

    #[tokio::test]
    async fn starting_with_no_instruments_fails_fast() {
        let clock = Arc::new(ManualClock::new(t0()));
        let market = Arc::new(StaticMarket { series: Vec::new() });
        let narrative = Arc::new(ScriptedNarrative::new());
        let scheduler = scheduler(narrative, market, clock);

        assert!(matches!(
            scheduler.start_run(Vec::new()).await,
            Err(AnalysisError::Config(_))
        ));
        assert_eq!(scheduler.snapshot().await.phase, RunPhase::Idle);
    }

    #[tokio::test]
    async fn concurrent_drivers_preserve_single_flight_and_a_single_joint() {
        let clock = Arc::new(ManualClock::new(t0()));
        let market = Arc::new(StaticMarket {
            series: growth_series(t0()),
        });
        let narrative = Arc::new(ScriptedNarrative::new());
        let scheduler = scheduler(narrative.clone(), market, clock);

        scheduler
            .start_run(vec![instrument("PETR4"), instrument("VALE3")])
            .await
            .unwrap();

        let drivers: Vec<_> = (0..3)
            .map(|_| {
                let scheduler = scheduler.clone();
                tokio::spawn(async move { scheduler.run_to_completion().await })
            })
            .collect();
        for driver in drivers {
            driver.await.unwrap();
        }

        let snapshot = scheduler.snapshot().await;
        assert_eq!(snapshot.phase, RunPhase::Completed);
        assert!(snapshot
            .jobs
            .iter()
            .all(|job| job.state == JobState::Completed));
        // Each job analyzed once, one aggregation in total.
        assert_eq!(narrative.calls().len(), 2);
        assert_eq!(narrative.joint_calls().len(), 1);
    }
}
