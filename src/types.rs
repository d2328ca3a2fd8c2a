use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// One open position as reported by the data API `/positions` endpoint.
///
/// Every field is optional on the wire: missing or `null` numbers decode as
/// `0.0` and missing strings as empty, so a sparse payload never fails the fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(rename = "asset", default, deserialize_with = "null_as_default")]
    pub asset_id: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub size: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub avg_price: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub realized_pnl: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(rename = "outcome", default, deserialize_with = "null_as_default")]
    pub outcome_label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub condition_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
}

/// All open positions of one wallet at one fetch instant, keyed by asset id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionSnapshot {
    positions: HashMap<String, Position>,
}

impl PositionSnapshot {
    /// Build a snapshot from a fetched position list.
    ///
    /// Entries without an asset id are dropped; a repeated asset id keeps the
    /// last occurrence.
    pub fn from_positions(positions: impl IntoIterator<Item = Position>) -> Self {
        let positions = positions
            .into_iter()
            .filter(|p| !p.asset_id.is_empty())
            .map(|p| (p.asset_id.clone(), p))
            .collect();
        Self { positions }
    }

    pub fn get(&self, asset_id: &str) -> Option<&Position> {
        self.positions.get(asset_id)
    }

    pub fn asset_ids(&self) -> impl Iterator<Item = &str> {
        self.positions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Direction of an inferred trade (and of the copy order placed for it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    Buy,
    Sell,
}

impl TradeType {
    pub fn label(self) -> &'static str {
        match self {
            TradeType::Buy => "BUY",
            TradeType::Sell => "SELL",
        }
    }
}

impl fmt::Display for TradeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A trade reconstructed from the difference between two snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredTrade {
    pub asset_id: String,
    pub trade_type: TradeType,
    /// Always strictly positive.
    pub size: f64,
    /// Implied execution price; `None` when a position was fully closed and
    /// the exit price cannot be recovered.
    pub price: Option<f64>,
    pub title: String,
    pub outcome_label: String,
    pub condition_id: String,
    pub slug: String,
}

/// The scaled order we submit for one inferred trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaledOrderRequest {
    pub market_id: String,
    /// Outcome token id, identical to the inferred trade's asset id.
    pub outcome_id: String,
    pub side: TradeType,
    /// Our own order size in shares (already scaled and rounded).
    pub amount: f64,
    pub fee_bps: u32,
}

/// Handle returned by the execution client for an accepted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub status: String,
}

/// Who produced the trade carried by a [`CopyEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOrigin {
    /// A trade inferred for a tracked wallet.
    Tracked,
    /// Our copy of a tracked trade, with its submission result.
    Own,
}

/// Notification handed to the event sink.
#[derive(Debug, Clone, Serialize)]
pub struct CopyEvent {
    pub timestamp: String,
    pub origin: EventOrigin,
    pub wallet: String,
    pub trade: InferredTrade,
    /// Only set for [`EventOrigin::Own`] events whose order was accepted.
    pub result: Option<Order>,
}

impl CopyEvent {
    pub fn tracked(wallet: &str, trade: InferredTrade) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            origin: EventOrigin::Tracked,
            wallet: wallet.to_string(),
            trade,
            result: None,
        }
    }

    pub fn own(wallet: &str, trade: InferredTrade, result: Option<Order>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            origin: EventOrigin::Own,
            wallet: wallet.to_string(),
            trade,
            result,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

/// Accept JSON numbers, numeric strings and `null`; anything unparseable is 0.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NumberOrText>::deserialize(deserializer)? {
        Some(NumberOrText::Number(n)) => n,
        Some(NumberOrText::Text(s)) => s.trim().parse().unwrap_or(0.0),
        None => 0.0,
    })
}
