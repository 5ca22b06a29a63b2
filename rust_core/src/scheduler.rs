//! Refresh scheduling
//!
//! Two phases, Idle and Fetching. The first fetch starts immediately; each
//! following one is scheduled only after the previous cycle has resolved,
//! using `update_interval` after success and `retry_delay` after a fatal
//! failure. Cycles never overlap.

use crate::aggregator::Aggregator;
use crate::clients::SourceError;
use crate::config::WidgetConfig;
use crate::debug::DebugChannel;
use crate::models::OrderedRow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerPhase {
    Idle,
    Fetching,
}

/// Result of one cycle as seen by the presentation side
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    Rows(Vec<OrderedRow>),
    Failed(String),
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Rows(_))
    }
}

impl From<Result<Vec<OrderedRow>, SourceError>> for CycleOutcome {
    fn from(result: Result<Vec<OrderedRow>, SourceError>) -> Self {
        match result {
            Ok(rows) => Self::Rows(rows),
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

/// Delay before the next cycle, chosen once the current one has resolved
pub fn next_delay(
    outcome: &CycleOutcome,
    update_interval: Duration,
    retry_delay: Duration,
) -> Duration {
    match outcome {
        CycleOutcome::Rows(_) => update_interval,
        CycleOutcome::Failed(_) => retry_delay,
    }
}

/// Everything the presentation side needs, published as a whole on every
/// transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetState {
    pub phase: SchedulerPhase,
    /// At least one cycle has resolved
    pub loaded: bool,
    pub rows: Vec<OrderedRow>,
    /// Fatal error of the last cycle; `rows` is empty when set
    pub error: Option<String>,
    pub last_success: Option<DateTime<Utc>>,
    pub cycles: u64,
}

impl WidgetState {
    pub fn initial() -> Self {
        Self {
            phase: SchedulerPhase::Idle,
            loaded: false,
            rows: Vec::new(),
            error: None,
            last_success: None,
            cycles: 0,
        }
    }

    /// Same content, fetch in flight
    fn fetching(&self) -> Self {
        Self {
            phase: SchedulerPhase::Fetching,
            ..self.clone()
        }
    }

    /// State after a cycle resolved; the previous table is never carried over
    fn resolved(&self, outcome: CycleOutcome, now: DateTime<Utc>) -> Self {
        match outcome {
            CycleOutcome::Rows(rows) => Self {
                phase: SchedulerPhase::Idle,
                loaded: true,
                rows,
                error: None,
                last_success: Some(now),
                cycles: self.cycles + 1,
            },
            CycleOutcome::Failed(message) => Self {
                phase: SchedulerPhase::Idle,
                loaded: true,
                rows: Vec::new(),
                error: Some(message),
                last_success: self.last_success,
                cycles: self.cycles + 1,
            },
        }
    }
}

impl Default for WidgetState {
    fn default() -> Self {
        Self::initial()
    }
}

pub struct RefreshScheduler {
    aggregator: Arc<Aggregator>,
    update_interval: Duration,
    retry_delay: Duration,
}

impl RefreshScheduler {
    pub fn new(aggregator: Aggregator, update_interval: Duration, retry_delay: Duration) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            update_interval,
            retry_delay,
        }
    }

    pub fn from_config(config: &WidgetConfig, debug: DebugChannel) -> Result<Self, SourceError> {
        let aggregator = Aggregator::from_config(config, debug)?;
        Ok(Self::new(aggregator, config.update_interval, config.retry_delay))
    }

    /// Run a single cycle without scheduling anything
    pub async fn run_once(&self) -> CycleOutcome {
        self.aggregator.run_cycle().await.into()
    }

    /// Start the refresh loop on the current tokio runtime
    pub fn spawn(self) -> SchedulerHandle {
        let (state_tx, state_rx) = watch::channel(WidgetState::initial());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(self.run(state_tx, shutdown_rx));

        SchedulerHandle {
            state_rx,
            shutdown_tx,
            task,
        }
    }

    async fn run(
        self,
        state_tx: watch::Sender<WidgetState>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        info!(
            "Refresh scheduler started ({} coins, update every {:?}, retry after {:?})",
            self.aggregator.coins().len(),
            self.update_interval,
            self.retry_delay
        );

        let mut state = WidgetState::initial();
        let mut delay = Duration::ZERO;

        loop {
            // Idle: wait for the timer or a shutdown request
            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            state = state.fetching();
            state_tx.send_replace(state.clone());

            // Fetching: a shutdown abandons the in-flight cycle
            let outcome = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                outcome = self.run_once() => outcome,
            };

            delay = next_delay(&outcome, self.update_interval, self.retry_delay);
            if let CycleOutcome::Failed(message) = &outcome {
                warn!("Fetch cycle failed, retrying in {:?}: {}", delay, message);
            } else {
                debug!("Next fetch in {:?}", delay);
            }

            state = state.resolved(outcome, Utc::now());
            state_tx.send_replace(state.clone());
        }

        info!("Refresh scheduler stopped after {} cycles", state.cycles);
    }
}

/// Owner's handle on a running scheduler
///
/// Dropping the handle also stops the loop.
pub struct SchedulerHandle {
    state_rx: watch::Receiver<WidgetState>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Receiver that is notified on every state transition
    pub fn subscribe(&self) -> watch::Receiver<WidgetState> {
        self.state_rx.clone()
    }

    pub fn current(&self) -> WidgetState {
        self.state_rx.borrow().clone()
    }

    /// Stop the loop, waiting for it to exit
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.task.await {
            warn!("Refresh scheduler task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{BatchPriceSource, TokenPriceSource};
    use crate::models::{ChangePeriod, Changes, CoinSpec, NormalizedRow, SourceKind, XrplToken};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// CoinGecko stand-in; counts calls and can fail or stall
    #[derive(Default)]
    struct FakeGecko {
        calls: AtomicUsize,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        fail: AtomicBool,
        stall: Option<Duration>,
    }

    #[async_trait]
    impl BatchPriceSource for FakeGecko {
        fn provider_name(&self) -> &'static str {
            "CoinGecko"
        }

        async fn fetch_markets(
            &self,
            ids: &[String],
            _vs_currency: &str,
            _periods: &[ChangePeriod],
        ) -> Result<Vec<NormalizedRow>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            if let Some(stall) = self.stall {
                tokio::time::sleep(stall).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail.load(Ordering::SeqCst) {
                return Err(SourceError::http("CoinGecko", 500, "down", 250));
            }
            Ok(ids
                .iter()
                .map(|id| NormalizedRow {
                    source: SourceKind::CoinGecko,
                    id: id.clone(),
                    name: id.clone(),
                    symbol: id.clone(),
                    price: Some(1.0),
                    changes: Changes::new(),
                    error: None,
                })
                .collect())
        }
    }

    struct NoTokens;

    #[async_trait]
    impl TokenPriceSource for NoTokens {
        fn provider_name(&self) -> &'static str {
            "XPMarket"
        }

        async fn fetch_token(
            &self,
            _token: &XrplToken,
            _periods: &[ChangePeriod],
        ) -> Result<NormalizedRow, SourceError> {
            Err(SourceError::http("XPMarket", 404, "", 200))
        }
    }

    fn scheduler(gecko: Arc<FakeGecko>) -> RefreshScheduler {
        let aggregator = Aggregator::new(
            vec![CoinSpec::gecko("bitcoin", Some("BTC"))],
            "usd",
            vec![ChangePeriod::new("24h")],
            gecko,
            Arc::new(NoTokens),
        );
        RefreshScheduler::new(aggregator, Duration::from_secs(300), Duration::from_secs(30))
    }

    #[test]
    fn test_next_delay() {
        let update = Duration::from_secs(300);
        let retry = Duration::from_secs(30);
        assert_eq!(next_delay(&CycleOutcome::Rows(vec![]), update, retry), update);
        assert_eq!(next_delay(&CycleOutcome::Failed("x".into()), update, retry), retry);
    }

    #[test]
    fn test_failed_cycle_clears_table() {
        let now = Utc::now();
        let ok = WidgetState::initial().resolved(CycleOutcome::Rows(vec![]), now);
        assert!(ok.loaded);
        assert_eq!(ok.last_success, Some(now));

        let failed = ok.fetching().resolved(CycleOutcome::Failed("boom".into()), now);
        assert_eq!(failed.phase, SchedulerPhase::Idle);
        assert_eq!(failed.error.as_deref(), Some("boom"));
        assert!(failed.rows.is_empty());
        assert_eq!(failed.last_success, Some(now));
        assert_eq!(failed.cycles, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_waits_update_interval() {
        let gecko = Arc::new(FakeGecko::default());
        let handle = scheduler(gecko.clone()).spawn();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(gecko.calls.load(Ordering::SeqCst), 1);
        let state = handle.current();
        assert!(state.loaded);
        assert_eq!(state.rows.len(), 1);
        assert_eq!(state.rows[0].label, "BTC");

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(gecko.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(gecko.calls.load(Ordering::SeqCst), 2);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_waits_retry_delay() {
        let gecko = Arc::new(FakeGecko::default());
        gecko.fail.store(true, Ordering::SeqCst);
        let handle = scheduler(gecko.clone()).spawn();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let state = handle.current();
        assert_eq!(state.error.as_deref(), Some("CoinGecko HTTP 500: down"));
        assert!(state.rows.is_empty());

        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(gecko.calls.load(Ordering::SeqCst), 2);

        // Recovery switches back to the long interval
        gecko.fail.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(gecko.calls.load(Ordering::SeqCst), 3);
        assert!(handle.current().error.is_none());

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(gecko.calls.load(Ordering::SeqCst), 3);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycles_never_overlap() {
        let gecko = Arc::new(FakeGecko {
            stall: Some(Duration::from_secs(600)),
            ..FakeGecko::default()
        });
        let handle = scheduler(gecko.clone()).spawn();

        tokio::time::sleep(Duration::from_secs(3500)).await;
        assert_eq!(gecko.max_in_flight.load(Ordering::SeqCst), 1);
        // 600s fetch + 300s idle per cycle
        assert_eq!(gecko.calls.load(Ordering::SeqCst), 4);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_fetch() {
        let gecko = Arc::new(FakeGecko {
            stall: Some(Duration::from_secs(86_400)),
            ..FakeGecko::default()
        });
        let handle = scheduler(gecko.clone()).spawn();
        let mut rx = handle.subscribe();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().phase, SchedulerPhase::Fetching);

        handle.shutdown().await;
        assert_eq!(gecko.calls.load(Ordering::SeqCst), 1);
    }
}
