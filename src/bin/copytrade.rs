use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use polymarket_mirror::api::{self, DataApi, GammaApi};
use polymarket_mirror::auth;
use polymarket_mirror::config::{
    AppConfig, CONFIG_PATH, Credentials, PRIVATE_KEY_VAR, PROXY_ADDRESS_VAR,
};
use polymarket_mirror::executor::{ClobExecutionClient, OrderGateway, TradeExecutor};
use polymarket_mirror::ratelimit::{RATE_LIMIT_PERIOD, RateLimiter};
use polymarket_mirror::reporter::{EventSink, JsonLineSink, NoopSink};
use polymarket_mirror::resolver::MarketIdResolver;
use polymarket_mirror::scheduler::{CopyPipeline, Scheduler};

#[derive(Parser)]
#[command(name = "copytrade", about = "Mirror Polymarket wallets' position changes")]
struct Args {
    /// Config file (TOML, or JSON when the extension is .json)
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Never submit orders, even if trading_enabled is set
    #[arg(long)]
    dry_run: bool,

    /// Print every tracked/own trade event as a JSON line on stdout
    #[arg(long)]
    json_events: bool,
}

/// Build the order gateway: live only when enabled, credentialed and authenticated.
async fn build_gateway(config: &AppConfig, dry_run: bool) -> OrderGateway {
    if dry_run || !config.trading_enabled {
        info!("Trading disabled, running in dry-run mode");
        return OrderGateway::dry_run();
    }

    let credentials = Credentials::from_env();
    if !credentials.is_complete() {
        warn!("{PRIVATE_KEY_VAR} or {PROXY_ADDRESS_VAR} not set, falling back to dry-run mode");
        return OrderGateway::dry_run();
    }

    info!("Authenticating with CLOB API...");
    match auth::authenticate(&credentials).await {
        Ok(ctx) => {
            info!("Authenticated: EOA {} Safe {}", ctx.eoa, ctx.safe);
            OrderGateway::live(Box::new(ClobExecutionClient::new(ctx)))
        }
        Err(e) => {
            error!("CLOB authentication failed, falling back to dry-run mode: {e:#}");
            OrderGateway::dry_run()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = AppConfig::load(&args.config)?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", args.config.display()))?;
    info!("Loaded config from {}", args.config.display());

    let gateway = build_gateway(&config, args.dry_run).await;
    let mode = if gateway.trading_enabled() { "live" } else { "dry-run" };
    info!(
        "Starting copytrade ({mode}): {} wallet(s), copy {}%, {} calls/10s, poll {:?}",
        config.wallets_to_track.len(),
        config.copy_percentage,
        config.rate_limit,
        config.poll_interval(),
    );

    let http = api::http_client().context("failed to build HTTP client")?;
    let resolver = MarketIdResolver::new(Box::new(GammaApi::new(http.clone())));
    let executor = TradeExecutor::new(resolver, gateway, config.copy_percentage);
    let sink: Arc<dyn EventSink> = if args.json_events {
        Arc::new(JsonLineSink::stdout())
    } else {
        Arc::new(NoopSink)
    };

    let pipeline = CopyPipeline::new(
        Arc::new(DataApi::new(http)),
        Arc::new(RateLimiter::new(config.rate_limit, RATE_LIMIT_PERIOD)),
        Arc::new(executor),
        sink,
    );
    let mut scheduler = Scheduler::new(
        config.wallets_to_track.clone(),
        pipeline,
        config.poll_interval(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
            return;
        }
        info!("Shutdown requested, finishing current wallet...");
        shutdown_tx.send(true).ok();
    });

    scheduler.initialize().await;
    scheduler.run(shutdown_rx).await;
    Ok(())
}
