//! Best-effort reduction of extractor payloads to JSON-representable values.
//!
//! yt-dlp style extractors hand back deeply nested, partially typed
//! structures. Before a payload is archived we walk it once and drop every
//! node that JSON cannot hold, keeping the rest intact. A single bad field
//! must never cost us the whole document.

use serde::ser::{SerializeMap, SerializeSeq, Serializer};
use serde::Serialize;
use serde_json::Value;

/// A metadata payload as handed over by an extractor, before any cleaning.
///
/// Mirrors what a dynamically typed upstream can produce: JSON scalars and
/// containers, plus two shapes JSON has no spelling for (fixed-size
/// sequences and opaque foreign objects). Object entries keep their source
/// order so "field present" semantics survive the round trip.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<RawValue>),
    /// Fixed-size sequence. Sanitizes like a list but keeps its kind.
    Tuple(Vec<RawValue>),
    Object(Vec<(String, RawValue)>),
    /// A scalar with no JSON representation. Carries the upstream type name
    /// purely for diagnostics.
    Opaque(String),
}

impl RawValue {
    /// Lifts an already-parsed JSON document into the raw representation.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => RawValue::Null,
            Value::Bool(b) => RawValue::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    RawValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    // Out of i64 range; keep the magnitude as a float.
                    RawValue::Float(u as f64)
                } else {
                    RawValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => RawValue::Text(s),
            Value::Array(items) => {
                RawValue::List(items.into_iter().map(RawValue::from_json).collect())
            }
            Value::Object(map) => RawValue::Object(
                map.into_iter()
                    .map(|(key, value)| (key, RawValue::from_json(value)))
                    .collect(),
            ),
        }
    }

}

/// Renders the (sanitized) value as JSON. Tuples become arrays; any
/// unrepresentable node still present becomes `null`, so callers are expected
/// to [`sanitize`] first.
impl Serialize for RawValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RawValue::Null | RawValue::Opaque(_) => serializer.serialize_unit(),
            RawValue::Bool(b) => serializer.serialize_bool(*b),
            RawValue::Int(i) => serializer.serialize_i64(*i),
            RawValue::Float(f) if f.is_finite() => serializer.serialize_f64(*f),
            RawValue::Float(_) => serializer.serialize_unit(),
            RawValue::Text(s) => serializer.serialize_str(s),
            RawValue::List(items) | RawValue::Tuple(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            RawValue::Object(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Recursively strips everything JSON cannot represent.
///
/// Returns `None` when the value itself must be dropped. Inside an object a
/// dropped value removes its key, while an explicit null is kept as null;
/// the two must stay distinguishable downstream. Inside sequences dropped
/// elements are simply omitted, since positions are not addressable by name.
pub fn sanitize(value: &RawValue) -> Option<RawValue> {
    match value {
        RawValue::Null | RawValue::Bool(_) | RawValue::Int(_) | RawValue::Text(_) => {
            Some(value.clone())
        }
        RawValue::Float(f) if f.is_finite() => Some(RawValue::Float(*f)),
        RawValue::Float(_) => {
            log::warn!("dropping non-finite float");
            None
        }
        RawValue::List(items) => Some(RawValue::List(sanitize_elements(items))),
        RawValue::Tuple(items) => Some(RawValue::Tuple(sanitize_elements(items))),
        RawValue::Object(entries) => {
            let mut clean = Vec::with_capacity(entries.len());
            for (key, value) in entries {
                match sanitize(value) {
                    Some(kept) => clean.push((key.clone(), kept)),
                    None => log::warn!("dropping unrepresentable field {key:?}"),
                }
            }
            Some(RawValue::Object(clean))
        }
        RawValue::Opaque(type_name) => {
            log::warn!("dropping opaque value of type {type_name}");
            None
        }
    }
}

fn sanitize_elements(items: &[RawValue]) -> Vec<RawValue> {
    items.iter().filter_map(sanitize).collect()
}
