use std::str::FromStr;

use anyhow::{Context, Result};
use polymarket_client_sdk::auth::state::Authenticated;
use polymarket_client_sdk::auth::{LocalSigner, Normal, Signer};
use polymarket_client_sdk::clob::types::SignatureType;
use polymarket_client_sdk::clob::{Client, Config};
use polymarket_client_sdk::types::Address;
use polymarket_client_sdk::{POLYGON, derive_safe_wallet};
use tracing::warn;

use crate::CLOB_API_BASE;
use crate::config::Credentials;

/// Concrete signer type produced by `LocalSigner::from_str`.
pub type PrivateKeySigner = LocalSigner<k256::ecdsa::SigningKey>;

/// Authenticated CLOB context for live order execution.
pub struct ClobContext {
    pub client: Client<Authenticated<Normal>>,
    pub signer: PrivateKeySigner,
    pub eoa: Address,
    pub safe: Address,
}

/// Parse a hex private key into a Polygon signer.
pub fn signer_from_key(private_key: &str) -> Result<PrivateKeySigner> {
    Ok(PrivateKeySigner::from_str(private_key.trim())
        .context("invalid private key")?
        .with_chain_id(Some(POLYGON)))
}

/// Authenticate with the CLOB API as the Safe wallet owned by `credentials`.
///
/// The Safe derived from the key is compared against the configured proxy
/// address; a mismatch is reported but does not abort, since orders are always
/// signed for the derived Safe.
pub async fn authenticate(credentials: &Credentials) -> Result<ClobContext> {
    let signer = signer_from_key(&credentials.private_key)?;

    let eoa = signer.address();
    let safe = derive_safe_wallet(eoa, POLYGON).context("failed to derive Safe address")?;

    match credentials.proxy_address.trim().parse::<Address>() {
        Ok(proxy) if proxy != safe => warn!(
            "Configured proxy address {proxy} differs from derived Safe {safe}; \
             orders are signed for the Safe"
        ),
        Ok(_) => {}
        Err(e) => warn!("Invalid proxy address {}: {e}", credentials.proxy_address),
    }

    let config = Config::builder().use_server_time(true).build();
    let client = Client::new(CLOB_API_BASE, config)?
        .authentication_builder(&signer)
        .signature_type(SignatureType::GnosisSafe)
        .authenticate()
        .await
        .context("CLOB authentication failed")?;

    Ok(ClobContext {
        client,
        signer,
        eoa,
        safe,
    })
}
