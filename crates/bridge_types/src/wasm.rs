//! WASM bindings for the bridge wire model
//!
//! These functions are exposed to JavaScript when compiled to WASM so a
//! browser-hosted UI script shares the exact diff, patch and naming rules the
//! host uses.

use serde_json::Value;
use wasm_bindgen::prelude::*;

use crate::{CollectionAction, collection, decode_batch, naming};

/// Compute collection actions turning `old` into `new`
#[wasm_bindgen]
pub fn diff_collection(old: JsValue, new: JsValue) -> Result<JsValue, JsValue> {
    let old: Vec<Value> = serde_wasm_bindgen::from_value(old)
        .map_err(|e| JsValue::from_str(&format!("Deserialization error: {}", e)))?;
    let new: Vec<Value> = serde_wasm_bindgen::from_value(new)
        .map_err(|e| JsValue::from_str(&format!("Deserialization error: {}", e)))?;

    to_js(&collection::diff(&old, &new))
}

/// Apply collection actions to `items` and return the patched array
#[wasm_bindgen]
pub fn apply_collection(items: JsValue, actions: JsValue) -> Result<JsValue, JsValue> {
    let mut items: Vec<Value> = serde_wasm_bindgen::from_value(items)
        .map_err(|e| JsValue::from_str(&format!("Deserialization error: {}", e)))?;
    let actions: Vec<CollectionAction> = serde_wasm_bindgen::from_value(actions)
        .map_err(|e| JsValue::from_str(&format!("Deserialization error: {}", e)))?;

    collection::apply_values(&mut items, &actions)
        .map_err(|e| JsValue::from_str(&format!("Patch error: {}", e)))?;

    to_js(&items)
}

/// Parse a change batch from a JSON string
#[wasm_bindgen]
pub fn parse_change_batch(json: &str) -> Result<JsValue, JsValue> {
    let batch = decode_batch(json).map_err(|e| JsValue::from_str(&format!("Parse error: {}", e)))?;
    to_js(&batch)
}

#[wasm_bindgen]
pub fn to_camel_case(name: &str) -> String {
    naming::to_camel(name)
}

#[wasm_bindgen]
pub fn to_pascal_case(name: &str) -> String {
    naming::to_pascal(name)
}

/// Get version information
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}
