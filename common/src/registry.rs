//! Process-wide token registry.
//!
//! Frozen exactly once at startup, before the fetcher and the HTTP layer
//! start; every later read goes through without synchronization.

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::types::{Token, TokenPair};

static TOKENS: OnceCell<HashMap<String, Token>> = OnceCell::new();

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("Token {0} is not supported")]
    UnknownToken(String),
    #[error("token registry is already initialized")]
    AlreadyInitialized,
}

/// Freeze the token set. Later calls fail rather than silently replacing the
/// registry other components may already have read from.
pub fn init_tokens(tokens: Vec<Token>) -> Result<(), RegistryError> {
    let map = tokens.into_iter().map(|t| (t.id.clone(), t)).collect();
    TOKENS
        .set(map)
        .map_err(|_| RegistryError::AlreadyInitialized)
}

pub fn get_token(id: &str) -> Result<Token, RegistryError> {
    TOKENS
        .get()
        .and_then(|m| m.get(id))
        .cloned()
        .ok_or_else(|| RegistryError::UnknownToken(id.to_string()))
}

pub fn supported_tokens() -> Vec<Token> {
    TOKENS
        .get()
        .map(|m| m.values().cloned().collect())
        .unwrap_or_default()
}

/// A pair is supported iff both legs are registered tokens.
pub fn new_token_pair(base: &str, quote: &str) -> Result<TokenPair, RegistryError> {
    Ok(TokenPair {
        base: get_token(base)?,
        quote: get_token(quote)?,
    })
}
