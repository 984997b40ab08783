use std::str::FromStr;

use alloy_primitives::Address;
use thiserror::Error;

use common::Token;

use crate::fetcher::FetcherConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("HTTP_SECRET must be set when authentication is enabled")]
    MissingSecret,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    /// Bind address for the control plane (port comes from the CLI).
    pub host: String,

    /// Shared secret for HMAC request signing. May be empty only when the
    /// process runs with authentication disabled.
    pub auth_secret: String,

    /// On-chain address of the reserve contract; withdrawals land here.
    pub reserve_address: Address,

    /// Token set frozen into the registry at startup.
    pub tokens: Vec<Token>,

    /// Ticker periods for the fetcher.
    pub fetcher: FetcherConfig,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env_or("DATABASE_URL", "sqlite://reserve.db?mode=rwc");
        let host = env_or("HTTP_HOST", "0.0.0.0");
        let auth_secret = env_or("HTTP_SECRET", "");

        let reserve_raw = env_or(
            "RESERVE_ADDRESS",
            "0x63825c174ab367968ec60f061753d3bbd36a0d8f",
        );
        let reserve_address =
            Address::from_str(&reserve_raw).map_err(|e| ConfigError::Invalid {
                name: "RESERVE_ADDRESS",
                reason: e.to_string(),
            })?;

        Ok(Self {
            database_url,
            host,
            auth_secret,
            reserve_address,
            tokens: default_tokens(),
            fetcher: FetcherConfig::default(),
        })
    }
}

/// The built-in token set. A deployment overriding this ships its own
/// address file; ids and decimals must match the on-chain contracts.
fn default_tokens() -> Vec<Token> {
    fn addr(hex: &str) -> Address {
        Address::from_str(hex).unwrap_or(Address::ZERO)
    }
    vec![
        Token::new("ETH", addr("0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee"), 18),
        Token::new("KNC", addr("0xdd974d5c2e2928dea5f71b9825b8b646686bd200"), 18),
        Token::new("OMG", addr("0xd26114cd6ee289accf82350c8d8487fedb8a0c07"), 18),
        Token::new("EOS", addr("0x86fa049857e0209aa7d9e616f7eb3b3b78ecfdb0"), 18),
        Token::new("SNT", addr("0x744d70fdbe2ba4cf95131626614a1763df805b9e"), 18),
    ]
}
