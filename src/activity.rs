use std::collections::BTreeMap;

use tracing::info;

use crate::types::{InferredTrade, TradeType};

/// Net activity of a tracked wallet in one market.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketActivity {
    pub title: String,
    pub bought: f64,
    pub sold: f64,
    /// Notional of buys whose price is known.
    pub buy_cost: f64,
    /// Proceeds of sells whose price is known.
    pub sell_proceeds: f64,
    pub trades: u64,
}

impl MarketActivity {
    pub fn net_size(&self) -> f64 {
        self.bought - self.sold
    }

    fn record(&mut self, trade: &InferredTrade) {
        if self.title.is_empty() {
            self.title = trade.title.clone();
        }
        let notional = trade.price.map(|p| p * trade.size).unwrap_or(0.0);
        match trade.trade_type {
            TradeType::Buy => {
                self.bought += trade.size;
                self.buy_cost += notional;
            }
            TradeType::Sell => {
                self.sold += trade.size;
                self.sell_proceeds += notional;
            }
        }
        self.trades += 1;
    }

    fn merge(&mut self, other: &MarketActivity) {
        if self.title.is_empty() {
            self.title = other.title.clone();
        }
        self.bought += other.bought;
        self.sold += other.sold;
        self.buy_cost += other.buy_cost;
        self.sell_proceeds += other.sell_proceeds;
        self.trades += other.trades;
    }
}

/// Key a trade is aggregated under: its slug, else condition id, else asset id.
fn market_key(trade: &InferredTrade) -> &str {
    [&trade.slug, &trade.condition_id, &trade.asset_id]
        .into_iter()
        .find(|k| !k.is_empty())
        .map(String::as_str)
        .unwrap_or_default()
}

/// Summarize one cycle's trades per market.
pub fn aggregate_by_market(trades: &[InferredTrade]) -> BTreeMap<String, MarketActivity> {
    let mut by_market: BTreeMap<String, MarketActivity> = BTreeMap::new();
    for trade in trades {
        by_market
            .entry(market_key(trade).to_string())
            .or_default()
            .record(trade);
    }
    by_market
}

/// Log one line per market with what the wallet bought and sold.
pub fn log_market_activity(by_market: &BTreeMap<String, MarketActivity>, wallet_prefix: &str) {
    for (market, activity) in by_market {
        info!(
            "[{wallet_prefix}] {market} \"{}\": bought {:.2}, sold {:.2}, net {:+.2} ({} trade(s))",
            activity.title,
            activity.bought,
            activity.sold,
            activity.net_size(),
            activity.trades,
        );
    }
}

/// Running per-market totals for one wallet since startup.
#[derive(Debug, Default)]
pub struct MarketActivityTracker {
    totals: BTreeMap<String, MarketActivity>,
}

impl MarketActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, by_market: &BTreeMap<String, MarketActivity>) {
        for (market, activity) in by_market {
            self.totals.entry(market.clone()).or_default().merge(activity);
        }
    }

    pub fn totals(&self) -> &BTreeMap<String, MarketActivity> {
        &self.totals
    }

    pub fn log_totals(&self, wallet_prefix: &str) {
        if self.totals.is_empty() {
            info!("[{wallet_prefix}] No activity observed");
            return;
        }
        info!("[{wallet_prefix}] Activity totals across {} market(s):", self.totals.len());
        log_market_activity(&self.totals, wallet_prefix);
    }
}
