// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Argument normalization for tool dispatch.
//!
//! Models emit tool arguments as strings ("42", "true") while tool schemas
//! expect typed values. Normalization walks the argument tree and coerces
//! every string leaf that looks like a boolean or a number, leaving
//! everything else untouched.

use serde_json::{Map, Value};

/// Recursively coerce string leaves into typed values.
///
/// Coercion rules, applied to every string leaf:
/// - case-insensitive `"true"` / `"false"` become booleans
/// - strings containing a decimal point that parse as a number become floats
/// - strings that parse as integers become integers
/// - anything else passes through unchanged
///
/// Arrays and objects are coerced element-wise; structure and key order are
/// preserved. Non-string leaves pass through untouched.
pub fn normalize_arguments(value: Value) -> Value {
    match value {
        Value::String(s) => coerce_string(s),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize_arguments).collect()),
        Value::Object(map) => Value::Object(normalize_map(map)),
        other => other,
    }
}

/// Coerce every value of an argument mapping. Keys keep their order.
pub fn normalize_map(args: Map<String, Value>) -> Map<String, Value> {
    args.into_iter()
        .map(|(key, value)| (key, normalize_arguments(value)))
        .collect()
}

fn coerce_string(s: String) -> Value {
    if s.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if s.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    // A decimal point selects float parsing; an unparseable dotted string
    // stays a string rather than falling back to integer parsing.
    if s.contains('.') {
        if let Some(number) = s.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return Value::Number(number);
        }
        return Value::String(s);
    }
    if let Ok(int) = s.parse::<i64>() {
        return Value::Number(int.into());
    }
    Value::String(s)
}
