use std::sync::Arc;

use alloy_primitives::U256;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};
use tracing::debug;

use adapters::registry::{get_exchange, supported_exchanges};
use common::registry::{get_token, new_token_pair};
use common::{now_ms, ActivityId, Token, TradeSide};

use crate::metric::parse_metric_payload;

use super::auth::{authenticate, RequestForm};
use super::envelope::{fail, ok};
use super::AppState;

type HandlerResult = Result<Json<Value>, Json<Value>>;

/// `0x`-prefixed hex big integer, as deposit/withdraw amounts and rate lists
/// arrive on the wire.
fn parse_big_amount(raw: &str) -> Result<U256, String> {
    let digits = raw
        .strip_prefix("0x")
        .ok_or_else(|| format!("{raw} is not a 0x-prefixed hex integer"))?;
    U256::from_str_radix(digits, 16).map_err(|e| format!("{raw} is not a valid hex integer: {e}"))
}

/// Dash-separated token-id list, resolved against the registry.
fn parse_token_list(raw: &str) -> Result<Vec<Token>, Json<Value>> {
    raw.split('-')
        .map(|id| get_token(id).map_err(fail))
        .collect()
}

pub async fn all_prices(State(state): State<Arc<AppState>>, form: RequestForm) -> HandlerResult {
    let data = state
        .data
        .get_all_prices(form.timepoint(true))
        .map_err(fail)?;
    Ok(ok(json!({
        "version": data.version,
        "timestamp": data.timestamp,
        "data": data.data.data,
        "block": data.data.block,
    })))
}

pub async fn one_price(
    State(state): State<Arc<AppState>>,
    Path((base, quote)): Path<(String, String)>,
    form: RequestForm,
) -> HandlerResult {
    let pair = new_token_pair(&base, &quote)
        .map_err(|_| fail("Token pair is not supported"))?;
    let data = state
        .data
        .get_one_price(&pair.pair_id(), form.timepoint(true))
        .map_err(fail)?;
    Ok(ok(json!({
        "version": data.version,
        "timestamp": data.timestamp,
        "exchanges": data.data,
    })))
}

pub async fn get_rates(State(state): State<Arc<AppState>>, form: RequestForm) -> HandlerResult {
    let data = state
        .data
        .get_all_rates(form.timepoint(true))
        .map_err(fail)?;
    Ok(ok(json!({
        "version": data.version,
        "timestamp": data.timestamp,
        "data": data.data,
    })))
}

pub async fn auth_data(State(state): State<Arc<AppState>>, form: RequestForm) -> HandlerResult {
    authenticate(state.signer.as_ref(), &form, &[]).map_err(fail)?;
    let data = state
        .data
        .get_auth_data(form.timepoint(true))
        .map_err(fail)?;
    Ok(ok(json!({
        "version": data.version,
        "timestamp": data.timestamp,
        "data": data,
    })))
}

pub async fn activities(State(state): State<Arc<AppState>>, form: RequestForm) -> HandlerResult {
    authenticate(state.signer.as_ref(), &form, &[]).map_err(fail)?;
    let data = state.data.get_records().await.map_err(fail)?;
    Ok(ok(json!({ "data": data })))
}

pub async fn pending_activities(
    State(state): State<Arc<AppState>>,
    form: RequestForm,
) -> HandlerResult {
    authenticate(state.signer.as_ref(), &form, &[]).map_err(fail)?;
    let data = state.data.get_pending_activities().await.map_err(fail)?;
    Ok(ok(json!({ "data": data })))
}

pub async fn get_metrics(State(state): State<Arc<AppState>>, form: RequestForm) -> HandlerResult {
    let timestamp = now_ms();
    authenticate(state.signer.as_ref(), &form, &["tokens", "from", "to"]).map_err(fail)?;
    let tokens = parse_token_list(form.get("tokens"))?;
    let from = form.get("from").parse::<u64>().map_err(fail)?;
    let to = form.get("to").parse::<u64>().map_err(fail)?;
    let data = state
        .metric
        .get_metric(&tokens, from, to)
        .await
        .map_err(fail)?;
    Ok(ok(json!({
        "timestamp": timestamp,
        "returnTime": now_ms(),
        "data": data,
    })))
}

pub async fn store_metrics(State(state): State<Arc<AppState>>, form: RequestForm) -> HandlerResult {
    authenticate(state.signer.as_ref(), &form, &["timestamp", "data"]).map_err(fail)?;
    let timestamp = form.get("timestamp").parse::<u64>().map_err(fail)?;
    let entry = parse_metric_payload(timestamp, form.get("data")).map_err(fail)?;
    state
        .metric
        .store_metric(entry, now_ms())
        .await
        .map_err(fail)?;
    Ok(ok(json!({})))
}

pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(exchange_id): Path<String>,
    form: RequestForm,
) -> HandlerResult {
    authenticate(state.signer.as_ref(), &form, &["order_id"]).map_err(fail)?;
    let exchange = get_exchange(&exchange_id).map_err(fail)?;
    let order_id = form.get("order_id").parse::<ActivityId>().map_err(fail)?;
    state
        .core
        .cancel_order(&order_id, exchange)
        .await
        .map_err(fail)?;
    Ok(ok(json!({})))
}

pub async fn deposit(
    State(state): State<Arc<AppState>>,
    Path(exchange_id): Path<String>,
    form: RequestForm,
) -> HandlerResult {
    authenticate(state.signer.as_ref(), &form, &["token", "amount"]).map_err(fail)?;
    let exchange = get_exchange(&exchange_id).map_err(fail)?;
    let token = get_token(form.get("token")).map_err(fail)?;
    let amount = parse_big_amount(form.get("amount")).map_err(fail)?;
    let id = state
        .core
        .deposit(exchange, token, amount, form.timepoint(false))
        .await
        .map_err(fail)?;
    Ok(ok(json!({ "id": id })))
}

pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    Path(exchange_id): Path<String>,
    form: RequestForm,
) -> HandlerResult {
    authenticate(state.signer.as_ref(), &form, &["token", "amount"]).map_err(fail)?;
    let exchange = get_exchange(&exchange_id).map_err(fail)?;
    let token = get_token(form.get("token")).map_err(fail)?;
    let amount = parse_big_amount(form.get("amount")).map_err(fail)?;
    let id = state
        .core
        .withdraw(exchange, token, amount, form.timepoint(false))
        .await
        .map_err(fail)?;
    Ok(ok(json!({ "id": id })))
}

pub async fn trade(
    State(state): State<Arc<AppState>>,
    Path(exchange_id): Path<String>,
    form: RequestForm,
) -> HandlerResult {
    authenticate(
        state.signer.as_ref(),
        &form,
        &["base", "quote", "amount", "rate", "type"],
    )
    .map_err(fail)?;
    let exchange = get_exchange(&exchange_id).map_err(fail)?;
    let base = get_token(form.get("base")).map_err(fail)?;
    let quote = get_token(form.get("quote")).map_err(fail)?;
    let amount = form.get("amount").parse::<f64>().map_err(fail)?;
    let rate = form.get("rate").parse::<f64>().map_err(fail)?;
    debug!(target: "http", rate, raw = form.get("rate"), "trade rate parsed");
    let side = form.get("type").parse::<TradeSide>().map_err(fail)?;
    let outcome = state
        .core
        .trade(
            exchange,
            side,
            base,
            quote,
            rate,
            amount,
            form.timepoint(false),
        )
        .await
        .map_err(fail)?;
    Ok(ok(json!({
        "id": outcome.id,
        "done": outcome.done,
        "remaining": outcome.remaining,
        "finished": outcome.finished,
    })))
}

pub async fn set_rates(State(state): State<Arc<AppState>>, form: RequestForm) -> HandlerResult {
    authenticate(
        state.signer.as_ref(),
        &form,
        &["tokens", "buys", "sells", "block"],
    )
    .map_err(fail)?;
    let tokens = parse_token_list(form.get("tokens"))?;
    let buys = form
        .get("buys")
        .split('-')
        .map(parse_big_amount)
        .collect::<Result<Vec<_>, _>>()
        .map_err(fail)?;
    let sells = form
        .get("sells")
        .split('-')
        .map(parse_big_amount)
        .collect::<Result<Vec<_>, _>>()
        .map_err(fail)?;
    let block = form.get("block").parse::<u64>().map_err(fail)?;
    let id = state
        .core
        .set_rates(tokens, buys, sells, block)
        .await
        .map_err(fail)?;
    Ok(ok(json!({ "id": id })))
}

pub async fn exchange_info(Path(exchange_id): Path<String>) -> HandlerResult {
    let exchange = get_exchange(&exchange_id).map_err(fail)?;
    Ok(ok(json!({ "data": exchange.info().all() })))
}

pub async fn pair_info(
    Path((exchange_id, base, quote)): Path<(String, String, String)>,
) -> HandlerResult {
    let exchange = get_exchange(&exchange_id).map_err(fail)?;
    let pair = new_token_pair(&base, &quote).map_err(fail)?;
    let info = exchange.info().get(&pair.pair_id()).map_err(fail)?;
    Ok(ok(json!({ "data": info })))
}

pub async fn exchange_fees(Path(exchange_id): Path<String>) -> HandlerResult {
    let exchange = get_exchange(&exchange_id).map_err(fail)?;
    Ok(ok(json!({ "data": exchange.fees() })))
}

pub async fn all_fees() -> HandlerResult {
    let mut data = serde_json::Map::new();
    for exchange in supported_exchanges() {
        data.insert(
            exchange.id().as_str().to_string(),
            serde_json::to_value(exchange.fees()).map_err(fail)?,
        );
    }
    Ok(ok(json!({ "data": data })))
}
