//! Request gate: merged query+body form, nonce window, required-parameter
//! check, and HMAC-SHA512 verification over the canonical encoding.

use std::collections::BTreeMap;

use axum::body::to_bytes;
use axum::extract::{FromRequest, Request};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use common::auth::{canonical_form, HmacSigner};
use common::now_ms;

use super::envelope::fail;

/// Nonce must be within this many milliseconds of server time.
const NONCE_WINDOW_MS: i64 = 10_000;

/// Sentinel for "serve the latest snapshot".
pub const MAX_TIMEPOINT: u64 = u64::MAX;

const BODY_LIMIT: usize = 1 << 20;

#[derive(Debug, Error, PartialEq)]
pub enum AuthError {
    #[error("Your nonce is invalid")]
    InvalidNonce,

    #[error("Required param ({0}) is missing. Param name is case sensitive")]
    MissingParam(String),

    #[error("Invalid signed token")]
    InvalidSignature,
}

/// The parsed request form: query and body parameters merged, keys sorted,
/// plus the client's `signed` header.
pub struct RequestForm {
    pub params: BTreeMap<String, String>,
    pub signed: String,
}

impl RequestForm {
    pub fn get(&self, key: &str) -> &str {
        self.params.get(key).map(String::as_str).unwrap_or("")
    }

    /// The canonical message the client signed: URL-encoded form with keys
    /// in sorted order.
    pub fn canonical_message(&self) -> String {
        canonical_form(self.params.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    /// The `timestamp` query parameter, interpreted the way every
    /// snapshot-serving endpoint does: absent means now (or the latest
    /// sentinel), unparsable means latest.
    pub fn timepoint(&self, use_default: bool) -> u64 {
        let raw = self.get("timestamp");
        if raw.is_empty() {
            if use_default {
                MAX_TIMEPOINT
            } else {
                now_ms()
            }
        } else {
            raw.parse().unwrap_or(MAX_TIMEPOINT)
        }
    }
}

impl<S: Send + Sync> FromRequest<S> for RequestForm {
    type Rejection = Response;

    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = req.into_parts();

        let signed = parts
            .headers
            .get("signed")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let mut params = BTreeMap::new();
        if let Some(query) = parts.uri.query() {
            for (key, value) in form_urlencoded::parse(query.as_bytes()) {
                params.insert(key.into_owned(), value.into_owned());
            }
        }

        let bytes = to_bytes(body, BODY_LIMIT)
            .await
            .map_err(|_| fail("Malformed request package").into_response())?;
        for (key, value) in form_urlencoded::parse(&bytes) {
            params.insert(key.into_owned(), value.into_owned());
        }

        Ok(Self { params, signed })
    }
}

fn nonce_in_time(nonce: &str) -> bool {
    let Ok(nonce) = nonce.parse::<i64>() else {
        return false;
    };
    let difference = nonce - now_ms() as i64;
    (-NONCE_WINDOW_MS..=NONCE_WINDOW_MS).contains(&difference)
}

/// The authentication discipline, in order: nonce window, required params,
/// signature over the canonical form. With auth disabled everything passes,
/// matching the `--no-auth` development mode.
pub fn authenticate(
    signer: Option<&HmacSigner>,
    form: &RequestForm,
    required: &[&str],
) -> Result<(), AuthError> {
    let Some(signer) = signer else {
        return Ok(());
    };

    if !nonce_in_time(form.get("nonce")) {
        return Err(AuthError::InvalidNonce);
    }

    for param in required {
        if form.get(param).is_empty() {
            return Err(AuthError::MissingParam(param.to_string()));
        }
    }

    if signer.verify(&form.canonical_message(), &form.signed) {
        Ok(())
    } else {
        Err(AuthError::InvalidSignature)
    }
}
