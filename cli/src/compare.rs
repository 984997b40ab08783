//! Cross-check journaled `set_rates` activities against the rates the
//! reserve is actually serving: the effective rate reconstructed from
//! base+compact must match what the strategy submitted.

use std::collections::BTreeMap;

use common::{ActivityAction, ActivityRecord, RateResponse};

/// Rates on the wire are scaled to twei.
const TWEI_ADJUST: f64 = 1e18;

/// Differences above 0.1% are worth flagging.
const DRIFT_TOLERANCE: f64 = 0.001;

#[derive(Debug, PartialEq)]
pub struct RateDrift {
    pub token: String,
    pub block: u64,
    pub side: &'static str,
    /// Relative difference between served and submitted.
    pub difference: f64,
}

fn effective(base: f64, compact: i8) -> f64 {
    base * (1.0 + f64::from(compact) / 1000.0) * TWEI_ADJUST
}

fn drift(served: f64, submitted: f64) -> f64 {
    (submitted - served) / served
}

/// Token ids out of the params bag; `tokens` is an array of token objects.
fn param_token_ids(activity: &ActivityRecord) -> Vec<String> {
    activity
        .params
        .get("tokens")
        .and_then(|v| v.as_array())
        .map(|tokens| {
            tokens
                .iter()
                .filter_map(|t| t.get("id").and_then(|id| id.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn param_floats(activity: &ActivityRecord, key: &str) -> Vec<f64> {
    activity
        .params
        .get(key)
        .and_then(|v| v.as_array())
        .map(|values| {
            values
                .iter()
                .filter_map(|v| match v {
                    serde_json::Value::String(s) => s.parse().ok(),
                    other => other.as_f64(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Every submitted rate whose served counterpart drifted beyond tolerance.
pub fn compare_set_rates(
    activities: &[ActivityRecord],
    rates: &BTreeMap<String, RateResponse>,
) -> Vec<RateDrift> {
    let mut drifts = Vec::new();
    for activity in activities {
        if activity.action != ActivityAction::SetRates {
            continue;
        }
        let block = activity
            .params
            .get("block")
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let tokens = param_token_ids(activity);
        let buys = param_floats(activity, "buys");
        let sells = param_floats(activity, "sells");

        for (idx, token) in tokens.iter().enumerate() {
            let Some(rate) = rates.get(token) else {
                continue;
            };
            if let (Some(buy), Some(sell)) = (buys.get(idx), sells.get(idx)) {
                let buy_drift = drift(effective(rate.base_buy, rate.compact_buy), *buy);
                if buy_drift.abs() > DRIFT_TOLERANCE {
                    drifts.push(RateDrift {
                        token: token.clone(),
                        block,
                        side: "buy",
                        difference: buy_drift,
                    });
                }
                let sell_drift = drift(effective(rate.base_sell, rate.compact_sell), *sell);
                if sell_drift.abs() > DRIFT_TOLERANCE {
                    drifts.push(RateDrift {
                        token: token.clone(),
                        block,
                        side: "sell",
                        difference: sell_drift,
                    });
                }
            }
        }
    }
    drifts
}
