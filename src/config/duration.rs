//! Duration parsing for configuration fields.
//!
//! Supports human-readable durations like "1 hour", "7 days", "24h", as well
//! as plain integer seconds. Used for the emergency cooldown and time-lock
//! base durations.

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Parse a human-readable duration to seconds.
///
/// Supports:
/// - "off" or "0" → 0 seconds
/// - Human-readable formats via humantime crate (e.g., "1 hour", "7 days", "1h", "7d")
///
/// # Examples
/// ```
/// use coffer::config::duration::parse_duration_to_secs;
///
/// assert_eq!(parse_duration_to_secs("off").unwrap(), 0);
/// assert_eq!(parse_duration_to_secs("1 hour").unwrap(), 3600);
/// assert_eq!(parse_duration_to_secs("7d").unwrap(), 604800);
/// ```
pub fn parse_duration_to_secs(input: &str) -> Result<u64, String> {
    let input = input.trim();
    if input == "off" || input == "0" {
        return Ok(0);
    }

    humantime::parse_duration(input)
        .map(|d| d.as_secs())
        .map_err(|e| format!("Invalid duration '{}': {}", input, e))
}

/// Render seconds the way `parse_duration_to_secs` reads them back.
pub fn format_secs(secs: u64) -> String {
    if secs == 0 {
        return "off".to_string();
    }
    humantime::format_duration(Duration::from_secs(secs)).to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDuration {
    Secs(u64),
    Text(String),
}

/// Accept either integer seconds or a humantime string.
pub fn deserialize_secs<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match RawDuration::deserialize(deserializer)? {
        RawDuration::Secs(secs) => Ok(secs),
        RawDuration::Text(text) => parse_duration_to_secs(&text).map_err(serde::de::Error::custom),
    }
}

pub fn serialize_secs<S>(secs: &u64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_secs(*secs))
}
