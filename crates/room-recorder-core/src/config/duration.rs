//! Duration strings in configuration files (`500ms`, `5s`, `1m30s`).

use serde::{Deserialize, Deserializer};
use std::time::Duration;

#[cfg(test)]
#[path = "duration_tests.rs"]
mod tests;

/// Parse a duration made of one or more `<number><unit>` segments.
///
/// Supported units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. Numbers
/// may carry a fractional part. The bare string `0` is accepted as zero.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let text = input.trim();
    if text.is_empty() {
        return Err("duration cannot be empty".to_string());
    }
    if text == "0" {
        return Ok(Duration::ZERO);
    }

    let mut total_nanos: f64 = 0.0;
    let mut rest = text;

    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .ok_or_else(|| format!("missing unit in duration '{}'", text))?;
        if number_len == 0 {
            return Err(format!("expected a number in duration '{}'", text));
        }

        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid number in duration '{}'", text))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_len] {
            "ns" => 1.0,
            "us" | "µs" => 1_000.0,
            "ms" => 1_000_000.0,
            "s" => 1_000_000_000.0,
            "m" => 60.0 * 1_000_000_000.0,
            "h" => 3_600.0 * 1_000_000_000.0,
            unit => return Err(format!("unknown unit '{}' in duration '{}'", unit, text)),
        };
        rest = &rest[unit_len..];

        total_nanos += value * nanos_per_unit;
    }

    Ok(Duration::from_nanos(total_nanos.round() as u64))
}

/// Serde adapter for optional duration strings
pub(crate) fn deserialize_optional<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => parse_duration(&value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
