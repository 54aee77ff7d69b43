use qstore_common::data::Value;
use std::time::Duration;

/// Largest divergence two replica TTL countdowns may show while still being
/// treated as the same expiration.
pub const ACCEPTABLE_DURATION_DIFF: Duration = Duration::from_secs(2);

pub fn bytes(x: &Value, y: &Value) -> bool {
    match (x, y) {
        (Value::Bytes(a), Value::Bytes(b)) => a == b,
        _ => false,
    }
}

pub fn duration(x: &Value, y: &Value) -> bool {
    match (x, y) {
        (Value::Ttl(None), Value::Ttl(None)) => true,
        (Value::Ttl(Some(a)), Value::Ttl(Some(b))) => {
            let diff = if a > b { *a - *b } else { *b - *a };
            diff < ACCEPTABLE_DURATION_DIFF
        }
        _ => false,
    }
}

pub fn boolean(x: &Value, y: &Value) -> bool {
    match (x, y) {
        (Value::Flag(a), Value::Flag(b)) => a == b,
        _ => false,
    }
}
