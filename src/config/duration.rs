//! Human-friendly duration strings.
//!
//! Accepts `"250"`, `"250ms"`, `"10s"`, `"5m"`, `"1h"` and `"1d"`. A bare number
//! is milliseconds, and so is any unit not in that list: `"10sec"` is ten
//! milliseconds.

use std::time::Duration;

/// Parse a duration string, returning `None` when it has no leading digits.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let digits_end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    if digits_end == 0 {
        return None;
    }

    let amount: u64 = value[..digits_end].parse().ok()?;
    let unit = &value[digits_end..];

    let millis = match unit {
        "s" => amount.saturating_mul(1000),
        "m" => amount.saturating_mul(60 * 1000),
        "h" => amount.saturating_mul(60 * 60 * 1000),
        "d" => amount.saturating_mul(24 * 60 * 60 * 1000),
        _ => amount,
    };

    Some(Duration::from_millis(millis))
}
