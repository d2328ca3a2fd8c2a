//! check-account: verify the credentials used for live copy trading.
//!
//! Reads `POLYMARKET_PRIVATE_KEY` and `POLYMARKET_PROXY_ADDRESS` from the
//! environment (or `.env`). If the key is missing it is read interactively with
//! hidden input. Authenticates with the CLOB API and prints the EOA, the Safe
//! wallet, whether it matches the proxy address, and the USDC balance.

use anyhow::{Context, Result, bail};
use polymarket_client_sdk::clob::types::request::BalanceAllowanceRequest;
use polymarket_client_sdk::types::Address;
use rust_decimal::prelude::ToPrimitive;

use polymarket_mirror::auth;
use polymarket_mirror::config::{Credentials, PRIVATE_KEY_VAR, PROXY_ADDRESS_VAR};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    println!("=== Polymarket Mirror Account Check ===\n");

    let mut credentials = Credentials::from_env();
    if credentials.private_key.trim().is_empty() {
        let prompt = format!("{PRIVATE_KEY_VAR} not set, enter private key (hex): ");
        let key = rpassword::prompt_password(prompt).context("failed to read private key")?;
        if key.trim().is_empty() {
            bail!("private key cannot be empty");
        }
        credentials.private_key = key.trim().to_string();
    }

    println!("Authenticating with CLOB API...");
    let ctx = auth::authenticate(&credentials)
        .await
        .context("check your private key")?;
    println!("  EOA address:  {}", ctx.eoa);
    println!("  Safe address: {}", ctx.safe);

    match credentials.proxy_address.trim().parse::<Address>() {
        Ok(proxy) if proxy == ctx.safe => println!("  {PROXY_ADDRESS_VAR} matches the Safe"),
        Ok(proxy) => {
            println!("  WARNING: {PROXY_ADDRESS_VAR} is {proxy}, which is not the derived Safe")
        }
        Err(_) if credentials.proxy_address.trim().is_empty() => {
            println!("  WARNING: {PROXY_ADDRESS_VAR} not set, live trading stays in dry-run mode")
        }
        Err(e) => println!("  WARNING: {PROXY_ADDRESS_VAR} is not a valid address: {e}"),
    }
    println!();

    println!("Checking USDC balance...");
    let bal = ctx
        .client
        .balance_allowance(BalanceAllowanceRequest::default())
        .await
        .context("failed to fetch balance")?;

    // Raw USDC units (6 decimals)
    let balance_usd = bal.balance.to_f64().unwrap_or(0.0) / 1_000_000.0;
    println!("  USDC balance: ${balance_usd:.2}");
    if balance_usd < 1.0 {
        println!("  WARNING: Balance is very low, deposit USDC to your Safe wallet before trading");
    }

    Ok(())
}
