use anyhow::Result;
use bytes::Bytes;
use serde_json::Number;

/// Converts raw bytes into a `String`, failing on invalid UTF-8.
pub fn string_from_bytes(bytes: Bytes) -> Result<String> {
    Ok(String::from_utf8(bytes.to_vec())?)
}

/// Adds two JSON numbers.
///
/// Integers stay integers as long as the sum fits in `i64` or `u64`,
/// otherwise the sum is computed in `f64`. Returns `None` when the sum
/// is not a finite number.
pub fn checked_add(a: &Number, b: &Number) -> Option<Number> {
    if let (Some(x), Some(y)) = (as_i128(a), as_i128(b)) {
        // Both operands fit in 64 bits, so this cannot overflow.
        let sum = x + y;
        if let Ok(sum) = i64::try_from(sum) {
            return Some(sum.into());
        }
        if let Ok(sum) = u64::try_from(sum) {
            return Some(sum.into());
        }
    }
    Number::from_f64(a.as_f64()? + b.as_f64()?)
}

fn as_i128(n: &Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}
