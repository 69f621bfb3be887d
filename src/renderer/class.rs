//! Class normalization.
//!
//! `class` accepts three shapes, freely nested:
//! - a string: used as-is
//! - a map of flags: keys whose value is truthy
//! - a list: each item normalized, joined with spaces

use crate::reactivity::{RawData, RawObject, Value};

/// Flatten a `class` value into a space-separated string.
pub fn normalize_class(value: &Value) -> String {
    let mut out = Vec::new();
    collect(value, &mut out);
    out.join(" ")
}

fn collect(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Str(s) => {
            let s = s.trim();
            if !s.is_empty() {
                out.push(s.to_string());
            }
        }
        Value::Object(raw) => collect_object(raw, out),
        Value::Reactive(r) => collect_object(r.raw(), out),
        _ => {}
    }
}

fn collect_object(raw: &RawObject, out: &mut Vec<String>) {
    match &*raw.data() {
        RawData::List(items) => {
            for item in items {
                collect(item, out);
            }
        }
        RawData::Map { entries, .. } => {
            for (name, flag) in entries {
                if flag.is_truthy() {
                    out.push(name.to_string());
                }
            }
        }
    }
}
