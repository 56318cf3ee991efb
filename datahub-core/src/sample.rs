//! The Data Sample value (spec.md §3.1, §4.2).
//!
//! A `DataSample` is immutable and reference-counted: the same sample is
//! held simultaneously by a resource's current-value slot, zero or more
//! buffer entries, and any in-flight handler invocation (spec.md §9). No
//! interior mutability is exposed — once built, a sample never changes.

use std::fmt;
use std::sync::Arc;

/// The five sample kinds a resource or push can carry (spec.md §3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Trigger,
    Boolean,
    Numeric,
    String,
    Json,
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataKind::Trigger => "trigger",
            DataKind::Boolean => "boolean",
            DataKind::Numeric => "numeric",
            DataKind::String => "string",
            DataKind::Json => "json",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Payload {
    Trigger,
    Boolean(bool),
    Numeric(f64),
    String(String),
    /// Verbatim JSON text, validated at construction (§4.2: "assumed
    /// well-formed... implementers must at minimum reject embedded NULs").
    Json(String),
}

/// Immutable (timestamp, kind, value) triple. Cheap to clone — clones
/// share the same `Arc<Inner>`.
#[derive(Debug, Clone)]
pub struct DataSample(Arc<Inner>);

#[derive(Debug)]
struct Inner {
    timestamp: f64,
    payload: Payload,
}

/// Rejected because a `Json` sample contained an embedded NUL byte
/// (spec.md §9 open question: JSON validation is best-effort, NUL
/// rejection is the one mandatory check).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedNul;

impl fmt::Display for EmbeddedNul {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("json sample contains an embedded NUL byte")
    }
}

impl std::error::Error for EmbeddedNul {}

impl DataSample {
    pub fn trigger(timestamp: f64) -> Self {
        Self(Arc::new(Inner {
            timestamp,
            payload: Payload::Trigger,
        }))
    }

    pub fn boolean(timestamp: f64, value: bool) -> Self {
        Self(Arc::new(Inner {
            timestamp,
            payload: Payload::Boolean(value),
        }))
    }

    pub fn numeric(timestamp: f64, value: f64) -> Self {
        Self(Arc::new(Inner {
            timestamp,
            payload: Payload::Numeric(value),
        }))
    }

    pub fn string(timestamp: f64, value: impl Into<String>) -> Self {
        Self(Arc::new(Inner {
            timestamp,
            payload: Payload::String(value.into()),
        }))
    }

    /// Construct a `Json`-kind sample. Rejects embedded NULs; otherwise
    /// the text is carried verbatim (spec.md §4.2).
    pub fn json(timestamp: f64, value: impl Into<String>) -> Result<Self, EmbeddedNul> {
        let value = value.into();
        if value.contains('\0') {
            return Err(EmbeddedNul);
        }
        Ok(Self(Arc::new(Inner {
            timestamp,
            payload: Payload::Json(value),
        })))
    }

    pub fn kind(&self) -> DataKind {
        match &self.0.payload {
            Payload::Trigger => DataKind::Trigger,
            Payload::Boolean(_) => DataKind::Boolean,
            Payload::Numeric(_) => DataKind::Numeric,
            Payload::String(_) => DataKind::String,
            Payload::Json(_) => DataKind::Json,
        }
    }

    pub fn timestamp(&self) -> f64 {
        self.0.timestamp
    }

    /// `true` when this sample was constructed with `timestamp == 0.0`
    /// and therefore still needs wall-clock substitution at the push
    /// pipeline's entry point (spec.md §4.2, §4.3 step 1).
    pub fn needs_timestamp_stamp(&self) -> bool {
        self.0.timestamp == 0.0
    }

    /// Return a copy of this sample with its timestamp replaced. Used by
    /// the push pipeline's timestamp-normalisation step; samples are
    /// otherwise immutable.
    pub fn with_timestamp(&self, timestamp: f64) -> Self {
        Self(Arc::new(Inner {
            timestamp,
            payload: self.0.payload.clone(),
        }))
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match &self.0.payload {
            Payload::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_numeric(&self) -> Option<f64> {
        match &self.0.payload {
            Payload::Numeric(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&str> {
        match &self.0.payload {
            Payload::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&str> {
        match &self.0.payload {
            Payload::Json(v) => Some(v),
            _ => None,
        }
    }

    /// JSON projection of this sample (spec.md §4.2): `null` for
    /// Trigger, `true`/`false` for Boolean, shortest round-trip double
    /// for Numeric, a JSON string literal for String, and the `Json`
    /// payload emitted verbatim.
    pub fn to_json_value(&self) -> String {
        match &self.0.payload {
            Payload::Trigger => "null".to_string(),
            Payload::Boolean(v) => v.to_string(),
            Payload::Numeric(v) => {
                if v.is_nan() {
                    "null".to_string()
                } else {
                    serde_json::to_string(v).unwrap_or_else(|_| "null".to_string())
                }
            }
            Payload::String(v) => serde_json::to_string(v).unwrap_or_else(|_| "\"\"".to_string()),
            Payload::Json(v) => v.clone(),
        }
    }

    /// This sample's entry in a buffer dump: `{"t":<num>,"v":<json>}`,
    /// or `{"t":<num>}` for Trigger samples (spec.md §4.2, §6.2).
    pub fn to_buffer_entry_json(&self) -> String {
        match &self.0.payload {
            Payload::Trigger => format!("{{\"t\":{}}}", format_timestamp(self.0.timestamp)),
            _ => format!(
                "{{\"t\":{},\"v\":{}}}",
                format_timestamp(self.0.timestamp),
                self.to_json_value()
            ),
        }
    }
}

fn format_timestamp(t: f64) -> String {
    if t.is_finite() {
        serde_json::to_string(&t).unwrap_or_else(|_| "0".to_string())
    } else {
        "null".to_string()
    }
}
