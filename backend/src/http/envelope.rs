//! Every endpoint answers HTTP 200 with a `{success, reason?, ...}` JSON
//! envelope; domain errors live in the envelope, not the status code, so
//! clients parse uniformly.

use std::fmt::Display;

use axum::Json;
use serde_json::{json, Value};

pub fn ok(mut fields: Value) -> Json<Value> {
    if let Some(object) = fields.as_object_mut() {
        object.insert("success".to_string(), Value::Bool(true));
    }
    Json(fields)
}

pub fn fail(reason: impl Display) -> Json<Value> {
    Json(json!({
        "success": false,
        "reason": reason.to_string(),
    }))
}
