use analysis_core::AnalysisKind;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Tuning knobs for a batch run.
///
/// The cooldown is a provider rate-limit guard applied after every
/// external call, success or failure — the limit is on call volume, not
/// error volume. The retry backoff separately gates when a failed job
/// may be attempted again, measured against that job's own last
/// attempt.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Seconds to wait after every analysis call.
    pub call_cooldown_secs: u64,
    /// Seconds a failed job waits before becoming eligible again.
    pub retry_backoff_secs: u64,
    /// Failed attempts after which a job is terminal.
    pub max_retries: u8,
    /// Notional investment used for the ranking backtests.
    pub ranking_notional: Decimal,
    /// Report flavor requested for every job.
    pub analysis_kind: AnalysisKind,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            call_cooldown_secs: 30,
            retry_backoff_secs: 60,
            max_retries: 2,
            ranking_notional: dec!(1000),
            analysis_kind: AnalysisKind::Full,
        }
    }
}
