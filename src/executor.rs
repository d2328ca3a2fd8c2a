use async_trait::async_trait;
use polymarket_client_sdk::clob::types::{OrderType, Side as ClobSide};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::auth::ClobContext;
use crate::resolver::MarketIdResolver;
use crate::types::{InferredTrade, Order, ScaledOrderRequest, TradeType};

/// Fee attached to every copy order, in basis points.
pub const DEFAULT_ORDER_FEE_BPS: u32 = 1000;

/// Limit price that crosses any ask, making a buy behave like a market order.
const MARKETABLE_BUY_PRICE: Decimal = Decimal::from_parts(99, 0, 0, false, 2);

/// Limit price that crosses any bid, making a sell behave like a market order.
const MARKETABLE_SELL_PRICE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Fill-and-kill: whatever does not match immediately is cancelled, so a copy
/// order never rests on the book at its crossing price.
const COPY_ORDER_TYPE: OrderType = OrderType::FAK;

/// Why an order submission was refused.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error("not enough balance: {0}")]
    InsufficientFunds(String),

    #[error("trading restricted in this region: {0}")]
    RegionRestricted(String),

    #[error("order rejected: {0}")]
    Rejected(String),
}

impl SubmitError {
    /// Classify a raw exchange error message.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("not enough balance") || lower.contains("insufficient") {
            SubmitError::InsufficientFunds(message)
        } else if lower.contains("trading restricted") || lower.contains("available regions") {
            SubmitError::RegionRestricted(message)
        } else {
            SubmitError::Rejected(message)
        }
    }
}

/// Order-submission backend.
///
/// Takes `&mut self`: clients are not assumed safe for concurrent submissions,
/// so [`OrderGateway`] hands out exclusive access one order at a time.
#[async_trait]
pub trait ExecutionClient: Send {
    async fn create_order(&mut self, request: &ScaledOrderRequest) -> Result<Order, SubmitError>;
}

/// Live CLOB backend placing marketable limit orders.
pub struct ClobExecutionClient {
    ctx: ClobContext,
}

impl ClobExecutionClient {
    pub fn new(ctx: ClobContext) -> Self {
        Self { ctx }
    }
}

/// Convert f64 shares to Decimal rounded to 2 decimal places.
fn f64_to_shares(val: f64) -> Result<Decimal, SubmitError> {
    let shares = Decimal::from_f64(val)
        .ok_or_else(|| SubmitError::Rejected(format!("cannot convert shares {val} to Decimal")))?
        .round_dp(2);
    if shares <= Decimal::ZERO {
        return Err(SubmitError::Rejected(format!("shares rounded to zero from {val}")));
    }
    Ok(shares)
}

/// Map our `TradeType` to the CLOB SDK `Side` and its crossing price.
fn to_clob_side(side: TradeType) -> (ClobSide, Decimal) {
    match side {
        TradeType::Buy => (ClobSide::Buy, MARKETABLE_BUY_PRICE),
        TradeType::Sell => (ClobSide::Sell, MARKETABLE_SELL_PRICE),
    }
}

#[async_trait]
impl ExecutionClient for ClobExecutionClient {
    async fn create_order(&mut self, request: &ScaledOrderRequest) -> Result<Order, SubmitError> {
        let shares = f64_to_shares(request.amount)?;
        let (side, price) = to_clob_side(request.side);
        debug!(
            "Building {} order on market {}: {shares} shares @ {price} (fee {} bps)",
            request.side, request.market_id, request.fee_bps
        );

        let signable = self
            .ctx
            .client
            .limit_order()
            .token_id(&request.outcome_id)
            .price(price)
            .size(shares)
            .side(side)
            .order_type(COPY_ORDER_TYPE)
            .build()
            .await
            .map_err(|e| SubmitError::classify(format!("build order: {e}")))?;

        let signed = self
            .ctx
            .client
            .sign(&self.ctx.signer, signable)
            .await
            .map_err(|e| SubmitError::classify(format!("sign order: {e}")))?;

        let resp = self
            .ctx
            .client
            .post_order(signed)
            .await
            .map_err(|e| SubmitError::classify(format!("post order: {e}")))?;

        if !resp.success {
            let msg = resp
                .error_msg
                .unwrap_or_else(|| format!("status: {}", resp.status));
            return Err(SubmitError::classify(msg));
        }

        Ok(Order {
            id: resp.order_id,
            status: resp.status.to_string(),
        })
    }
}

/// Owns the execution client and serializes every submission through it.
///
/// A gateway without a client is in dry-run mode.
pub struct OrderGateway {
    client: Option<Mutex<Box<dyn ExecutionClient>>>,
}

impl OrderGateway {
    pub fn live(client: Box<dyn ExecutionClient>) -> Self {
        Self {
            client: Some(Mutex::new(client)),
        }
    }

    pub fn dry_run() -> Self {
        Self { client: None }
    }

    pub fn trading_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Submit one order, holding the client lock for the whole call.
    pub async fn submit(&self, request: &ScaledOrderRequest) -> Result<Order, SubmitError> {
        let Some(client) = &self.client else {
            return Err(SubmitError::Rejected("trading disabled".into()));
        };
        let mut client = client.lock().await;
        client.create_order(request).await
    }
}

/// What happened to one inferred trade.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeOutcome {
    Placed(Order),
    /// Trading disabled; the order that would have been sent.
    DryRun(ScaledOrderRequest),
    /// Scaled size rounded down to nothing.
    TooSmall(f64),
    MarketNotFound,
    /// The market lookup itself failed.
    ResolveFailed(String),
    Failed(SubmitError),
    /// The execution task died before producing a result.
    Aborted(String),
}

impl TradeOutcome {
    pub fn order(&self) -> Option<&Order> {
        match self {
            TradeOutcome::Placed(order) => Some(order),
            _ => None,
        }
    }
}

/// Scale a tracked trade size by `copy_percentage` (in percent), rounded to cents.
pub fn scale_size(size: f64, copy_percentage: f64) -> f64 {
    (size * copy_percentage / 100.0 * 100.0).round() / 100.0
}

/// Turns inferred trades into scaled copy orders.
pub struct TradeExecutor {
    resolver: MarketIdResolver,
    gateway: OrderGateway,
    copy_percentage: f64,
    fee_bps: u32,
}

impl TradeExecutor {
    pub fn new(resolver: MarketIdResolver, gateway: OrderGateway, copy_percentage: f64) -> Self {
        Self {
            resolver,
            gateway,
            copy_percentage,
            fee_bps: DEFAULT_ORDER_FEE_BPS,
        }
    }

    pub fn trading_enabled(&self) -> bool {
        self.gateway.trading_enabled()
    }

    /// Copy a single inferred trade. Never retries: a failed copy is only
    /// attempted again if a later snapshot diff produces a new trade.
    pub async fn execute(&self, trade: &InferredTrade) -> TradeOutcome {
        let our_size = scale_size(trade.size, self.copy_percentage);
        if our_size <= 0.0 {
            debug!(
                "Skipping {} {}: scaled size {our_size} is too small",
                trade.trade_type, trade.slug
            );
            return TradeOutcome::TooSmall(our_size);
        }

        let market_id = match self.resolver.resolve(&trade.slug).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                warn!("Market not found for slug: {:?} (asset {})", trade.slug, trade.asset_id);
                return TradeOutcome::MarketNotFound;
            }
            Err(e) => {
                warn!("Failed to resolve market for slug {}: {e}", trade.slug);
                return TradeOutcome::ResolveFailed(e.to_string());
            }
        };

        let request = ScaledOrderRequest {
            market_id,
            outcome_id: trade.asset_id.clone(),
            side: trade.trade_type,
            amount: our_size,
            fee_bps: self.fee_bps,
        };

        info!(
            "Copying {} for {}: {our_size} shares of \"{}\" ({})",
            trade.trade_type, trade.slug, trade.title, trade.outcome_label
        );

        if !self.gateway.trading_enabled() {
            info!("Trading disabled (dry run), not submitting {} {}", request.side, trade.slug);
            return TradeOutcome::DryRun(request);
        }

        match self.gateway.submit(&request).await {
            Ok(order) => {
                info!("Order placed for {}: id={} status={}", trade.slug, order.id, order.status);
                TradeOutcome::Placed(order)
            }
            Err(e) => {
                match &e {
                    SubmitError::InsufficientFunds(_) => error!(
                        "Order failed for {}: not enough balance, \
                         reduce size or fund the account ({e})",
                        trade.slug
                    ),
                    SubmitError::RegionRestricted(_) => error!(
                        "Order failed for {}: trading restricted in your region ({e})",
                        trade.slug
                    ),
                    SubmitError::Rejected(_) => {
                        error!("Order failed for {} (asset {}): {e}", trade.slug, trade.asset_id)
                    }
                }
                TradeOutcome::Failed(e)
            }
        }
    }
}
