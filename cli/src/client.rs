//! Signed HTTP client for the reserve control plane.
//!
//! Signs requests the same way the strategy does: nonce in the query, keys
//! sorted, HMAC-SHA512 hex digest in the `signed` header.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use serde_json::Value;

use adapters::HTTP_TIMEOUT;
use common::auth::{canonical_form, HmacSigner};
use common::{now_ms, ActivityRecord, RateResponse};

pub struct CoreClient {
    http: reqwest::Client,
    base_url: String,
    signer: Option<HmacSigner>,
}

impl CoreClient {
    pub fn new(base_url: impl Into<String>, secret: Option<String>) -> Result<Self> {
        let http = adapters::http_client(HTTP_TIMEOUT).context("building http client")?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            signer: secret.map(HmacSigner::new),
        })
    }

    async fn get(&self, path: &str, sign: bool) -> Result<Value> {
        let mut params: BTreeMap<String, String> = BTreeMap::new();
        let mut request = self.http.get(format!("{}{}", self.base_url, path));

        if sign {
            let Some(signer) = &self.signer else {
                bail!("{path} requires authentication; pass --secret or set HTTP_SECRET");
            };
            params.insert("nonce".to_string(), now_ms().to_string());
            let message = canonical_form(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            request = request
                .query(&params)
                .header("signed", signer.sign(&message));
        }

        let reply: Value = request
            .send()
            .await
            .with_context(|| format!("requesting {path}"))?
            .json()
            .await
            .with_context(|| format!("decoding {path} reply"))?;

        if reply["success"] != Value::Bool(true) {
            bail!(
                "{path} failed: {}",
                reply["reason"].as_str().unwrap_or("unknown reason")
            );
        }
        Ok(reply)
    }

    pub async fn activities(&self) -> Result<Vec<ActivityRecord>> {
        let reply = self.get("/activities", true).await?;
        serde_json::from_value(reply["data"].clone()).context("decoding activity records")
    }

    pub async fn pending_activities(&self) -> Result<Vec<ActivityRecord>> {
        let reply = self.get("/immediate-pending-activities", true).await?;
        serde_json::from_value(reply["data"].clone()).context("decoding pending activities")
    }

    pub async fn rates(&self) -> Result<BTreeMap<String, RateResponse>> {
        let reply = self.get("/getrates", false).await?;
        serde_json::from_value(reply["data"].clone()).context("decoding rate snapshot")
    }
}
