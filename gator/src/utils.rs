/// Interval utilities for the aggregation loop
pub mod time {
    use crate::types::{AggregatorError, Result};
    use std::time::Duration;

    const UNITS: &[(&str, f64)] = &[
        ("ns", 1.0),
        ("us", 1e3),
        ("µs", 1e3),
        ("μs", 1e3),
        ("ms", 1e6),
        ("s", 1e9),
        ("m", 60e9),
        ("h", 3600e9),
    ];

    /// Parses duration strings such as `30s`, `1m`, `1h30m`, `1.5h` or
    /// `250ms`. A unit is required on every number; negative values are
    /// rejected.
    pub fn parse_duration(input: &str) -> Result<Duration> {
        let invalid = || AggregatorError::InvalidInterval(input.to_string());

        let mut rest = input.trim();
        if let Some(stripped) = rest.strip_prefix('+') {
            rest = stripped;
        }
        if rest.is_empty() || rest.starts_with('-') {
            return Err(invalid());
        }
        if rest == "0" {
            return Ok(Duration::ZERO);
        }

        let mut total_nanos = 0f64;
        while !rest.is_empty() {
            let number_len = rest
                .find(|c: char| !(c.is_ascii_digit() || c == '.'))
                .ok_or_else(invalid)?;
            let number = &rest[..number_len];
            if number.is_empty() || number == "." {
                return Err(invalid());
            }
            let value: f64 = number.parse().map_err(|_| invalid())?;
            rest = &rest[number_len..];

            let unit_len = rest
                .find(|c: char| c.is_ascii_digit() || c == '.')
                .unwrap_or(rest.len());
            let unit = &rest[..unit_len];
            let (_, scale) = UNITS
                .iter()
                .find(|(name, _)| *name == unit)
                .ok_or_else(invalid)?;
            rest = &rest[unit_len..];

            total_nanos += value * scale;
        }

        if !total_nanos.is_finite() || total_nanos > u64::MAX as f64 {
            return Err(invalid());
        }
        Ok(Duration::from_nanos(total_nanos.round() as u64))
    }

    /// Parses an aggregation interval, which must be positive.
    pub fn parse_interval(input: &str) -> Result<Duration> {
        let interval = parse_duration(input)?;
        if interval.is_zero() {
            return Err(AggregatorError::InvalidInterval(input.to_string()));
        }
        Ok(interval)
    }

    /// Format duration in human-readable form, e.g. `1h30m0s`.
    pub fn format_duration(duration: Duration) -> String {
        let total_ms = duration.as_millis();
        if total_ms < 1000 {
            return format!("{}ms", total_ms);
        }

        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h{}m{}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m{}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

}
