use crate::activity::MarketActivityTracker;
use crate::short_wallet;
use crate::types::PositionSnapshot;

/// Everything the poll loop remembers about one tracked wallet.
pub struct WalletState {
    pub address: String,
    /// Last successfully fetched snapshot; `None` until the first success.
    baseline: Option<PositionSnapshot>,
    pub activity: MarketActivityTracker,
    pub failed_fetches: u64,
}

impl WalletState {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            baseline: None,
            activity: MarketActivityTracker::new(),
            failed_fetches: 0,
        }
    }

    /// Short address prefix for log lines.
    pub fn short_id(&self) -> &str {
        short_wallet(&self.address)
    }

    pub fn baseline(&self) -> Option<&PositionSnapshot> {
        self.baseline.as_ref()
    }

    /// Make `snapshot` the wallet's current state, discarding the old one.
    pub fn replace_baseline(&mut self, snapshot: PositionSnapshot) {
        self.baseline = Some(snapshot);
    }
}
