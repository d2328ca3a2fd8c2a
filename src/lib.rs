pub mod activity;
pub mod api;
pub mod auth;
pub mod config;
pub mod engine;
pub mod executor;
pub mod ratelimit;
pub mod reporter;
pub mod resolver;
pub mod scheduler;
pub mod state;
pub mod types;

/// Polymarket data API base URL (public, no auth required)
pub const DATA_API_BASE: &str = "https://data-api.polymarket.com";

/// Gamma market-metadata API base URL (public, no auth required)
pub const GAMMA_API_BASE: &str = "https://gamma-api.polymarket.com";

/// CLOB REST API base URL (Central Limit Order Book)
pub const CLOB_API_BASE: &str = "https://clob.polymarket.com";

/// Short wallet prefix used in log lines, e.g. `0x1234abcd`.
pub fn short_wallet(address: &str) -> &str {
    address.get(..10).unwrap_or(address)
}
