//! Human-readable duration parsing for configuration values.
//!
//! Supports:
//! - Plain seconds: `90`
//! - Single unit: `30s`, `15m`, `6h`, `1d`, `250ms`
//! - Compound: `1h30m`, `2d12h`

use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Error type for duration parsing failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationParseError {
    pub input: String,
    pub message: String,
}

impl std::fmt::Display for DurationParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse duration '{}': {}", self.input, self.message)
    }
}

impl std::error::Error for DurationParseError {}

/// Parses a duration string.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use winglot::util::parse_duration;
///
/// assert_eq!(parse_duration("6h").unwrap(), Duration::from_secs(21600));
/// assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
/// ```
pub fn parse_duration(input: &str) -> Result<Duration, DurationParseError> {
    let input = input.trim();
    let err = |message: &str| DurationParseError {
        input: input.to_string(),
        message: message.to_string(),
    };

    if input.is_empty() {
        return Err(err("empty duration"));
    }

    if input.chars().all(|c| c.is_ascii_digit()) {
        return input
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| err(&e.to_string()));
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return Err(err("expected a number before the unit"));
        }
        let number: u64 = rest[..digits].parse().map_err(|_| err("number too large"))?;
        rest = &rest[digits..];

        let unit_len = rest.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let part = match unit {
            "ms" => Duration::from_millis(number),
            "s" => Duration::from_secs(number),
            "m" => Duration::from_secs(number.saturating_mul(60)),
            "h" => Duration::from_secs(number.saturating_mul(3600)),
            "d" => Duration::from_secs(number.saturating_mul(86400)),
            "" => return Err(err("missing unit (use ms, s, m, h or d)")),
            _ => return Err(err("unknown unit (use ms, s, m, h or d)")),
        };
        total = total.saturating_add(part);
    }
    Ok(total)
}

/// Formats a duration with the largest units that divide it, e.g. `6h`, `1h30m`, `250ms`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();
    if secs == 0 {
        return format!("{}ms", millis);
    }

    let mut out = String::new();
    let mut remaining = secs;
    for (unit, size) in [("d", 86400), ("h", 3600), ("m", 60), ("s", 1)] {
        if remaining >= size {
            out.push_str(&format!("{}{}", remaining / size, unit));
            remaining %= size;
        }
    }
    if millis > 0 {
        out.push_str(&format!("{}ms", millis));
    }
    out
}

/// Serde adapter for duration fields written as strings (`"6h"`) or plain seconds.
pub fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}
