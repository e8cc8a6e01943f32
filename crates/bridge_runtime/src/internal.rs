//! Framework-internal methods.
//!
//! These are callable only through `call_internal_method` and never appear in
//! a controller description. They do not touch the controller instance.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use bridge_types::{CallResult, MethodKind};
use serde_json::{Map, Value};
use tracing::debug;

use crate::method::{BoxedArg, InvokeError, Method, ParameterType};

/// Round-trip call the UI sends right after binding to a controller
pub const WARM_UP: &str = "WarmUp";

/// The fixed internal method table shared by every controller type
pub fn internal_methods() -> BTreeMap<String, Method> {
    let mut table = BTreeMap::new();
    table.insert(WARM_UP.to_string(), warm_up());
    table
}

fn warm_up() -> Method {
    Method::new(
        WARM_UP,
        vec![ParameterType::of::<String>()],
        MethodKind::Function,
        Arc::new(|_instance: &mut dyn Any, _args: Vec<BoxedArg>| -> Result<CallResult, InvokeError> {
            debug!("Warm-up call received");
            Ok(CallResult::Value(Value::Object(Map::new())))
        }),
    )
}
