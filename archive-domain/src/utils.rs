use anyhow::{anyhow, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

pub fn current_millis() -> i64 {
    Utc::now().timestamp_millis()
}

pub fn millis_to_rfc3339(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(at) => at.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => ms.to_string(),
    }
}

pub fn parse_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|err| anyhow!(err))
}

/// Midnight UTC of `date` in unix milliseconds.
pub fn date_to_millis(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|at| at.and_utc().timestamp_millis())
        .unwrap_or_default()
}

pub fn parse_rfc3339_millis(value: &str) -> Result<i64> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|at| at.with_timezone(&Utc).timestamp_millis())
        .map_err(|err| anyhow!("invalid RFC 3339 time {:?}: {}", value, err))
}

/// Accepts `12`, `"12"` or null (as 0). The node serializes some u64 fields as strings.
pub fn u64_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0),
        Value::Number(number) => number
            .as_u64()
            .ok_or_else(|| de::Error::custom(format!("expected unsigned integer, got {}", number))),
        Value::String(text) => text
            .trim()
            .parse::<u64>()
            .map_err(|err| de::Error::custom(format!("invalid integer {:?}: {}", text, err))),
        other => Err(de::Error::custom(format!("expected integer, got {}", other))),
    }
}

pub fn i64_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(0),
        Value::Number(number) => number
            .as_i64()
            .ok_or_else(|| de::Error::custom(format!("expected integer, got {}", number))),
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map_err(|err| de::Error::custom(format!("invalid integer {:?}: {}", text, err))),
        other => Err(de::Error::custom(format!("expected integer, got {}", other))),
    }
}

pub fn optional_u64_from_number_or_string<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::Number(number) => number
            .as_u64()
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("expected unsigned integer, got {}", number))),
        Value::String(text) if text.trim().is_empty() => Ok(None),
        Value::String(text) => text
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|err| de::Error::custom(format!("invalid integer {:?}: {}", text, err))),
        other => Err(de::Error::custom(format!("expected integer, got {}", other))),
    }
}

/// Decimal text of an integer of any width, e.g. coin amounts above `u64::MAX`.
pub fn decimal_from_number_or_string<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::Number(number) => Ok(number.to_string()),
        Value::String(text) => {
            let trimmed = text.trim();
            let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(de::Error::custom(format!("invalid decimal amount {:?}", text)));
            }
            Ok(trimmed.to_string())
        }
        other => Err(de::Error::custom(format!("expected decimal amount, got {}", other))),
    }
}

/// Keeps any JSON value as its compact JSON text.
pub fn json_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(String::new()),
        Value::String(text) => Ok(text),
        other => Ok(other.to_string()),
    }
}
