// SPDX-FileCopyrightText: 2025 Greenbone AG
//
// SPDX-License-Identifier: GPL-2.0-or-later WITH x11vnc-openssl-exception

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Deserialize a duration from a string like "10s", "500ms", "30m", etc.
pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse(&s).map_err(serde::de::Error::custom)
}

/// Serialize a duration into a string like "10s", "500ms", "30m", etc.
pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let s = format_duration(duration);
    serializer.serialize_str(&s)
}

/// Parses duration from String
pub fn parse(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let value: String = s.chars().take_while(|c| c.is_numeric()).collect();
    let value: u64 = value
        .parse()
        .map_err(|_| format!("Invalid number in duration: {s}"))?;
    let unit_part: String = s.chars().skip_while(|c| c.is_numeric()).collect();

    #[allow(clippy::type_complexity)]
    let supported_units: &[(&'static str, Box<dyn Fn(u64) -> Duration>)] = &[
        ("ns", Box::new(Duration::from_nanos)),
        ("us", Box::new(Duration::from_micros)),
        ("ms", Box::new(Duration::from_millis)),
        ("s", Box::new(Duration::from_secs)),
        ("m", Box::new(|v| Duration::from_secs(v * 60))),
        ("h", Box::new(|v| Duration::from_secs(v * 60 * 60))),
    ];
    for (u, f) in supported_units {
        if u == &unit_part.as_str() {
            return Ok(f(value));
        }
    }
    let supported_units = supported_units
        .iter()
        .map(|(k, _)| *k)
        .collect::<Vec<_>>()
        .join(", ");
    Err(format!(
        "Unknown duration unit '{unit_part}' only '{supported_units}' are supported",
    ))
}

/// Formats a duration with the largest unit that keeps it exact
pub fn format_duration(duration: &Duration) -> String {
    if duration.as_nanos() % 1_000_000 == 0 {
        let ms = duration.as_millis();
        match ms {
            ms if ms % 3_600_000 == 0 && ms > 0 => format!("{}h", ms / 3_600_000),
            ms if ms % 60_000 == 0 && ms > 0 => format!("{}m", ms / 60_000),
            ms if ms % 1000 == 0 => format!("{}s", ms / 1000),
            ms => format!("{ms}ms"),
        }
    } else {
        format!("{}ns", duration.as_nanos())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_units() {
        assert_eq!(parse("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse(" 10s "), Ok(Duration::from_secs(10)));
        assert_eq!(parse("30m"), Ok(Duration::from_secs(30 * 60)));
        assert_eq!(parse("2h"), Ok(Duration::from_secs(2 * 60 * 60)));
        assert!(parse("10 days").is_err());
        assert!(parse("fast").is_err());
    }

    #[test]
    fn formats_largest_unit() {
        assert_eq!(format_duration(&Duration::from_secs(1800)), "30m");
        assert_eq!(format_duration(&Duration::from_secs(90)), "90s");
        assert_eq!(format_duration(&Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_duration(&Duration::from_secs(0)), "0s");
    }
}
