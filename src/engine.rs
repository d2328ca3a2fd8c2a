use std::collections::BTreeSet;

use crate::types::{InferredTrade, Position, PositionSnapshot, TradeType};

/// Size changes smaller than this are treated as float noise between polls.
pub const POSITION_SIZE_EPSILON: f64 = 1e-9;

fn trade_from(
    position: &Position,
    trade_type: TradeType,
    size: f64,
    price: Option<f64>,
) -> InferredTrade {
    InferredTrade {
        asset_id: position.asset_id.clone(),
        trade_type,
        size,
        price,
        title: position.title.clone(),
        outcome_label: position.outcome_label.clone(),
        condition_id: position.condition_id.clone(),
        slug: position.slug.clone(),
    }
}

/// Infer the trade behind a size change of a position held in both snapshots.
///
/// Buys are priced from the change in total cost basis; partial sells from
/// the change in realized P&L, since `realized_pnl` grows by
/// `sold * (exit_price - avg_price)` while the average price of the remaining
/// shares stays put.
fn infer_resize(previous: &Position, current: &Position) -> Option<InferredTrade> {
    let delta = current.size - previous.size;
    if delta.abs() < POSITION_SIZE_EPSILON {
        return None;
    }

    if delta > 0.0 {
        let cost_current = current.size * current.avg_price;
        let cost_previous = previous.size * previous.avg_price;
        let price = (cost_current - cost_previous) / delta;
        Some(trade_from(current, TradeType::Buy, delta, Some(price)))
    } else {
        let sold = -delta;
        let price = previous.avg_price + (current.realized_pnl - previous.realized_pnl) / sold;
        Some(trade_from(current, TradeType::Sell, sold, Some(price)))
    }
}

/// Compare two snapshots of one wallet and return the trades that explain the difference.
///
/// - asset only in `current` → BUY of the full size at its average price
/// - asset only in `previous` → SELL of the full size, price unknown
/// - asset in both with a size change → BUY or SELL of the difference
///
/// Trades come out ordered by asset id.
pub fn detect_changes(
    previous: &PositionSnapshot,
    current: &PositionSnapshot,
) -> Vec<InferredTrade> {
    let asset_ids: BTreeSet<&str> = previous.asset_ids().chain(current.asset_ids()).collect();

    asset_ids
        .into_iter()
        .filter_map(|asset_id| match (previous.get(asset_id), current.get(asset_id)) {
            (None, Some(opened)) if opened.size >= POSITION_SIZE_EPSILON => Some(trade_from(
                opened,
                TradeType::Buy,
                opened.size,
                Some(opened.avg_price),
            )),
            (Some(closed), None) if closed.size >= POSITION_SIZE_EPSILON => {
                Some(trade_from(closed, TradeType::Sell, closed.size, None))
            }
            (Some(prev), Some(cur)) => infer_resize(prev, cur),
            _ => None,
        })
        .collect()
}
