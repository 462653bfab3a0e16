//! Structural checks for one element of the poller payload.
//!
//! Runs before any I/O. Every violation is reported with the path of the
//! offending value, rooted at `MemorystoreConfig/<index>`.

use serde_json::{Map, Value};

use memscale_core::{ClusterRequest, ScalingProfile, Units};

const ROOT: &str = "MemorystoreConfig";

#[derive(Debug, Clone, Copy)]
enum Kind {
    String,
    Integer { min: u64 },
    Number { min: f64, max: f64 },
    OneOf(&'static [&'static str]),
}

struct Field {
    name: &'static str,
    required: bool,
    kind: Kind,
}

const UNITS: &[&str] = &[Units::Shards.as_str()];

const PROFILES: &[&str] = &[
    ScalingProfile::Cpu.as_str(),
    ScalingProfile::Memory.as_str(),
    ScalingProfile::CpuAndMemory.as_str(),
];

const FIELDS: &[Field] = &[
    Field { name: "projectId", required: true, kind: Kind::String },
    Field { name: "regionId", required: true, kind: Kind::String },
    Field { name: "clusterId", required: true, kind: Kind::String },
    Field { name: "scalerPubSubTopic", required: true, kind: Kind::String },
    Field { name: "units", required: false, kind: Kind::OneOf(UNITS) },
    Field { name: "minSize", required: false, kind: Kind::Integer { min: 1 } },
    Field { name: "maxSize", required: false, kind: Kind::Integer { min: 1 } },
    Field { name: "stepSize", required: false, kind: Kind::Integer { min: 1 } },
    Field {
        name: "minFreeMemoryPercent",
        required: false,
        kind: Kind::Number { min: 0.0, max: 100.0 },
    },
    Field { name: "scalingProfile", required: false, kind: Kind::OneOf(PROFILES) },
];

/// Message for a top-level value that is not an array.
pub fn not_an_array() -> String {
    format!("{ROOT} must be array")
}

/// Check one payload element and decode it.
///
/// Returns every violation found, not just the first.
pub fn validate_request(index: usize, value: &Value) -> Result<ClusterRequest, Vec<String>> {
    let base = format!("{ROOT}/{index}");

    let Some(object) = value.as_object() else {
        return Err(vec![format!("{base} must be object")]);
    };

    let mut errors = Vec::new();
    check_required(&base, object, &mut errors);
    check_additional(&base, object, &mut errors);

    for field in FIELDS {
        if let Some(v) = object.get(field.name)
            && let Some(message) = check_kind(field.kind, v)
        {
            errors.push(format!("{base}/{} {message}", field.name));
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    // Integral floats passed the check; hand serde plain integers.
    let mut normalized = object.clone();
    for field in FIELDS.iter().filter(|f| matches!(f.kind, Kind::Integer { .. })) {
        if let Some(v) = normalized.get_mut(field.name)
            && let Some(n) = as_integer(v)
            && let Ok(n) = u64::try_from(n)
        {
            *v = Value::from(n);
        }
    }

    serde_json::from_value(Value::Object(normalized)).map_err(|e| vec![format!("{base} {e}")])
}

/// JSON Schema integers include numbers like `5.0` with no fractional part.
fn as_integer(value: &Value) -> Option<i128> {
    if let Some(n) = value.as_i64() {
        return Some(n.into());
    }
    if let Some(n) = value.as_u64() {
        return Some(n.into());
    }
    value
        .as_f64()
        .filter(|f| f.is_finite() && f.fract() == 0.0)
        .map(|f| f as i128)
}

fn check_required(base: &str, object: &Map<String, Value>, errors: &mut Vec<String>) {
    for field in FIELDS.iter().filter(|f| f.required) {
        if !object.contains_key(field.name) {
            errors.push(format!("{base} must have required property '{}'", field.name));
        }
    }
}

fn check_additional(base: &str, object: &Map<String, Value>, errors: &mut Vec<String>) {
    if object.keys().any(|k| !FIELDS.iter().any(|f| f.name == k)) {
        errors.push(format!("{base} must NOT have additional properties"));
    }
}

fn check_kind(kind: Kind, value: &Value) -> Option<String> {
    match kind {
        Kind::String => (!value.is_string()).then(|| "must be string".to_string()),
        Kind::OneOf(allowed) => match value.as_str() {
            Some(s) if allowed.contains(&s) => None,
            _ => Some("must be equal to one of the allowed values".to_string()),
        },
        Kind::Integer { min } => match as_integer(value) {
            Some(n) if n < i128::from(min) => Some(format!("must be >= {min}")),
            Some(n) if n > i128::from(u32::MAX) => Some(format!("must be <= {}", u32::MAX)),
            Some(_) => None,
            None => Some("must be integer".to_string()),
        },
        Kind::Number { min, max } => match value.as_f64() {
            Some(n) if n < min => Some(format!("must be >= {min}")),
            Some(n) if n > max => Some(format!("must be <= {max}")),
            Some(_) => None,
            None => Some("must be number".to_string()),
        },
    }
}
