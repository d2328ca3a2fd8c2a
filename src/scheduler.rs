use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::activity::{aggregate_by_market, log_market_activity};
use crate::api::{ApiError, PositionSource};
use crate::engine::detect_changes;
use crate::executor::{TradeExecutor, TradeOutcome};
use crate::ratelimit::RateLimiter;
use crate::reporter::EventSink;
use crate::state::WalletState;
use crate::types::{CopyEvent, InferredTrade, PositionSnapshot};

/// Maximum copy trades executed concurrently for one wallet's cycle.
pub const MAX_CONCURRENT_EXECUTIONS: usize = 8;

/// Outcome of one wallet's cycle.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CycleReport {
    pub detected: usize,
    pub placed: usize,
}

/// Fetch → detect → report → dispatch → update, for one wallet at a time.
pub struct CopyPipeline {
    source: Arc<dyn PositionSource>,
    limiter: Arc<RateLimiter>,
    executor: Arc<TradeExecutor>,
    sink: Arc<dyn EventSink>,
}

impl CopyPipeline {
    pub fn new(
        source: Arc<dyn PositionSource>,
        limiter: Arc<RateLimiter>,
        executor: Arc<TradeExecutor>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            source,
            limiter,
            executor,
            sink,
        }
    }

    async fn fetch_snapshot(&self, wallet: &str) -> Result<PositionSnapshot, ApiError> {
        self.limiter.acquire().await;
        let positions = self.source.fetch_positions(wallet).await?;
        Ok(PositionSnapshot::from_positions(positions))
    }

    async fn fetch_for(&self, wallet: &mut WalletState) -> Result<PositionSnapshot, ApiError> {
        let fetched = self.fetch_snapshot(&wallet.address).await;
        if fetched.is_err() {
            wallet.failed_fetches += 1;
        }
        fetched
    }

    /// Record the wallet's current positions as its baseline without trading.
    /// Returns the number of positions seeded.
    pub async fn seed(&self, wallet: &mut WalletState) -> Result<usize, ApiError> {
        let fetched = self.fetch_for(wallet).await?;
        let count = fetched.len();
        info!("Initialized {} with {count} position(s)", wallet.short_id());
        wallet.replace_baseline(fetched);
        Ok(count)
    }

    /// Run one cycle for `wallet`.
    ///
    /// On a fetch error the wallet's baseline is left untouched, so the next
    /// successful fetch is diffed against the last good snapshot. A wallet that
    /// was never seeded is diffed against an empty snapshot. Otherwise the
    /// baseline always advances, whether or not the copy orders went through.
    pub async fn poll_wallet(&self, wallet: &mut WalletState) -> Result<CycleReport, ApiError> {
        let fetched = self.fetch_for(wallet).await?;

        let empty = PositionSnapshot::default();
        let trades = detect_changes(wallet.baseline().unwrap_or(&empty), &fetched);

        let mut report = CycleReport {
            detected: trades.len(),
            ..Default::default()
        };

        if !trades.is_empty() {
            self.report_detected(wallet, &trades);
            for (trade, outcome) in self.dispatch(&trades).await {
                if outcome.order().is_some() {
                    report.placed += 1;
                }
                let order = outcome.order().cloned();
                self.sink.emit(CopyEvent::own(&wallet.address, trade, order));
            }
        }

        wallet.replace_baseline(fetched);
        Ok(report)
    }

    fn report_detected(&self, wallet: &mut WalletState, trades: &[InferredTrade]) {
        for trade in trades {
            let price = trade
                .price
                .map(|p| format!("{p:.4}"))
                .unwrap_or_else(|| "market".to_string());
            info!(
                "Detected {} for {}: {:.4} shares of \"{}\" ({}) @ {price}",
                trade.trade_type,
                wallet.short_id(),
                trade.size,
                trade.title,
                trade.outcome_label,
            );
            self.sink.emit(CopyEvent::tracked(&wallet.address, trade.clone()));
        }

        let by_market = aggregate_by_market(trades);
        log_market_activity(&by_market, wallet.short_id());
        wallet.activity.update(&by_market);
    }

    /// Execute every trade concurrently (bounded) and pair each result with
    /// the trade it belongs to. Results come back in completion order.
    pub async fn dispatch(&self, trades: &[InferredTrade]) -> Vec<(InferredTrade, TradeOutcome)> {
        let concurrency = trades.len().clamp(1, MAX_CONCURRENT_EXECUTIONS);
        stream::iter(trades.iter().cloned())
            .map(|trade| {
                let executor = Arc::clone(&self.executor);
                async move {
                    let task_trade = trade.clone();
                    let handle = tokio::spawn(async move { executor.execute(&task_trade).await });
                    let outcome = match handle.await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            error!(
                                "Copy trade for {} ({}) aborted: {e}",
                                trade.slug, trade.asset_id
                            );
                            TradeOutcome::Aborted(e.to_string())
                        }
                    };
                    (trade, outcome)
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await
    }
}

/// Drives the pipeline over every tracked wallet until shutdown.
pub struct Scheduler {
    wallets: Vec<WalletState>,
    pipeline: CopyPipeline,
    poll_interval: Duration,
}

impl Scheduler {
    pub fn new(addresses: Vec<String>, pipeline: CopyPipeline, poll_interval: Duration) -> Self {
        Self {
            wallets: addresses.into_iter().map(WalletState::new).collect(),
            pipeline,
            poll_interval,
        }
    }

    pub fn wallets(&self) -> &[WalletState] {
        &self.wallets
    }

    /// Seed every wallet's baseline before the loop starts. A wallet that fails
    /// here has its first successful fetch diffed against an empty snapshot.
    pub async fn initialize(&mut self) {
        info!("Initializing state for {} wallet(s)...", self.wallets.len());
        for wallet in &mut self.wallets {
            if let Err(e) = self.pipeline.seed(wallet).await {
                warn!(
                    "[{}] Initial fetch failed, starting from an empty snapshot: {e}",
                    wallet.short_id()
                );
            }
        }
    }

    /// One pass over all wallets, in order. Returns `false` if shutdown was
    /// requested before the pass completed.
    pub async fn run_cycle(&mut self, shutdown: &watch::Receiver<bool>) -> bool {
        for wallet in &mut self.wallets {
            if *shutdown.borrow() {
                return false;
            }
            match self.pipeline.poll_wallet(wallet).await {
                Ok(report) if report.detected > 0 => info!(
                    "[{}] {} change(s) detected, {} copy order(s) placed",
                    wallet.short_id(),
                    report.detected,
                    report.placed
                ),
                Ok(_) => {}
                Err(e) => warn!(
                    "[{}] Failed to fetch positions, keeping previous snapshot: {e}",
                    wallet.short_id()
                ),
            }
        }
        true
    }

    /// Poll until `shutdown` flips to `true`, then log per-wallet totals.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Copy trader loop started ({} wallet(s), interval {:?})",
            self.wallets.len(),
            self.poll_interval
        );
        loop {
            if !self.run_cycle(&shutdown).await {
                break;
            }
            if wait_or_shutdown(&mut shutdown, self.poll_interval).await {
                break;
            }
        }
        info!("Copy trader stopped");
        for wallet in &self.wallets {
            wallet.activity.log_totals(wallet.short_id());
        }
    }
}

/// Sleep for `interval`, returning early with `true` if shutdown is signalled.
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, interval: Duration) -> bool {
    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return *shutdown.borrow(),
            changed = shutdown.changed() => match changed {
                Ok(()) if *shutdown.borrow() => return true,
                Ok(()) => {}
                Err(_) => {
                    // Sender gone: no signal can arrive any more.
                    (&mut sleep).await;
                    return *shutdown.borrow();
                }
            },
        }
    }
}
