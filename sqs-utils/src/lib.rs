//! Utilities shared by the sqs crates
//!
//! ## Core Features:
//! - **Durations**: `"1m30s"` style strings in configuration, see [`parse_duration`]
//! - **Timestamps**: millisecond resolution
//! - **Node Addressing**: normalizing a node address into a base URL with [`make_url`]
//!
//! ```
//! use sqs_utils::{make_url, parse_duration};
//!
//! assert_eq!(parse_duration("1m30s").map(|d| d.as_secs()), Ok(90));
//!
//! assert_eq!(make_url("127.0.0.1:5446"), "http://127.0.0.1:5446");
//! ```

#![deny(unsafe_code)]

use std::net::SocketAddr;
use std::time::Duration;

use serde::{
    de::{Deserialize, Deserializer},
    ser::Serializer,
};

/// Timestamp representation in milliseconds since Unix epoch
pub type TimestampMillis = i64;

/// Deserialize a [`Duration`] written as `"500ms"`, `"15s"`, `"1m30s"` and so on
#[inline]
pub fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    parse_duration(&String::deserialize(deserializer)?).map_err(serde::de::Error::custom)
}

/// Serialize a [`Duration`] as milliseconds, e.g. `"1500ms"`
#[inline]
pub fn serialize_duration<S>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&format!("{}ms", d.as_millis()))
}

/// Parses a sequence of `<integer><unit>` parts, units are `ms`, `s`, `m`, `h` and `d`.
/// A bare `0` is accepted.
///
/// ```
/// use std::time::Duration;
///
/// assert_eq!(sqs_utils::parse_duration("1h30m15s"), Ok(Duration::from_secs(5415)));
/// assert_eq!(sqs_utils::parse_duration("500ms"), Ok(Duration::from_millis(500)));
/// assert!(sqs_utils::parse_duration("15").is_err());
/// ```
pub fn parse_duration(text: &str) -> std::result::Result<Duration, String> {
    let text = text.trim();
    if text == "0" {
        return Ok(Duration::ZERO);
    }
    if text.is_empty() {
        return Err("empty duration".into());
    }

    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(format!("duration '{text}': expected a number at '{rest}'"));
        }
        let value: u64 = rest[..digits].parse().map_err(|e| format!("duration '{text}': {e}"))?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let secs = |scale: u64| value.checked_mul(scale).map(Duration::from_secs);
        let part = match &rest[..unit_len] {
            "ms" => Some(Duration::from_millis(value)),
            "s" => Some(Duration::from_secs(value)),
            "m" => secs(60),
            "h" => secs(3600),
            "d" => secs(86400),
            "" => return Err(format!("duration '{text}': missing unit")),
            unit => return Err(format!("duration '{text}': unknown unit '{unit}'")),
        };
        total = part
            .and_then(|part| total.checked_add(part))
            .ok_or_else(|| format!("duration '{text}': out of range"))?;
        rest = &rest[unit_len..];
    }
    Ok(total)
}

/// Deserialize SocketAddr with error handling
#[inline]
pub fn deserialize_addr<'de, D>(deserializer: D) -> std::result::Result<SocketAddr, D::Error>
where
    D: Deserializer<'de>,
{
    let addr = String::deserialize(deserializer)?.parse::<SocketAddr>().map_err(serde::de::Error::custom)?;
    Ok(addr)
}

/// Turn a node address into a base URL, adding the `http://` scheme when none is given.
/// A trailing slash is removed so routes can be appended with `format!("{}/route", ..)`.
#[inline]
pub fn make_url(addr: &str) -> String {
    let addr = addr.trim().trim_end_matches('/');
    if addr.starts_with("http://") || addr.starts_with("https://") {
        addr.to_owned()
    } else {
        format!("http://{addr}")
    }
}

/// Get current timestamp in milliseconds
#[inline]
pub fn timestamp_millis() -> TimestampMillis {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|t| t.as_millis() as i64)
        .unwrap_or_else(|_| chrono::Local::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_units() {
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration(" 2s "), Ok(Duration::from_secs(2)));
        assert_eq!(parse_duration("1m5s"), Ok(Duration::from_secs(65)));
        assert_eq!(parse_duration("1d"), Ok(Duration::from_secs(86400)));
        assert_eq!(parse_duration("1s500ms"), Ok(Duration::from_millis(1500)));
        assert!(parse_duration("junk").is_err());
        assert!(parse_duration("5w").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn oversized_durations_are_rejected() {
        assert!(parse_duration("18446744073709551615d").is_err());
        assert!(parse_duration("300000000000000000h").is_err());
        assert!(parse_duration("18446744073709551615s1s").is_err());
        assert!(parse_duration("99999999999999999999s").is_err());
        assert_eq!(parse_duration("18446744073709551615s"), Ok(Duration::from_secs(u64::MAX)));
    }

    #[test]
    fn durations_round_trip_through_serde() {
        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct T {
            #[serde(deserialize_with = "deserialize_duration", serialize_with = "serialize_duration")]
            d: Duration,
        }
        let t: T = serde_json::from_str(r#"{"d": "2m"}"#).unwrap();
        assert_eq!(t.d, Duration::from_secs(120));
        assert_eq!(serde_json::to_string(&t).unwrap(), r#"{"d":"120000ms"}"#);
        assert!(serde_json::from_str::<T>(r#"{"d": "2 minutes"}"#).is_err());
    }

    #[test]
    fn node_urls() {
        assert_eq!(make_url("127.0.0.1:5446"), "http://127.0.0.1:5446");
        assert_eq!(make_url("http://node-1:5446/"), "http://node-1:5446");
        assert_eq!(make_url(" https://sqs.example.com "), "https://sqs.example.com");
    }

    #[test]
    fn timestamps_move_forward() {
        let a = timestamp_millis();
        let b = timestamp_millis();
        assert!(a > 0 && b >= a);
    }
}
